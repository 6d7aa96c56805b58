// SPDX-License-Identifier: Apache-2.0

use crate::{
    clock, ApplyApi, CycleTimer, CycleView, DriverDispatch, DriverSignal,
    EucanetdContext, GlobalNetworkInfo, NetworkDriver, ScrubResult,
};

/// Consecutive failed cycles after which an error is raised in the log
pub const FAILURE_STREAK_ALERT: u32 = 60;
/// Nominal seconds between two telemetry reports
pub const TELEMETRY_WINDOW_SECS: u64 = 300;
const FAILURE_RETRY_SECS: u64 = 1;

/// Rolling telemetry of the control loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleCounters {
    pub total_checks: u64,
    pub applies: u64,
    pub failed_applies: u64,
    /// Sum of polling intervals since the last report
    pub epoch_secs: u64,
    /// Failed cycles since the last successful apply
    pub failure_streak: u32,
}

impl CycleCounters {
    fn record_failure(&mut self) {
        self.failure_streak = self.failure_streak.saturating_add(1);
        if self.failure_streak == FAILURE_STREAK_ALERT {
            log::error!(
                "could not complete network update after \
                 {FAILURE_STREAK_ALERT} retries: check above log errors for \
                 details"
            );
        } else {
            log::warn!(
                "retry ({}): could not complete network update: retrying",
                self.failure_streak
            );
        }
    }

    fn report_if_due(&mut self) {
        if self.epoch_secs >= TELEMETRY_WINDOW_SECS {
            log::info!(
                "eucanetd report: tot_checks={} tot_update_attempts={} \
                 success_update_attempts={} fail_update_attempts={} \
                 duty_cycle_minutes={:.2}",
                self.total_checks,
                self.applies + self.failed_applies,
                self.applies,
                self.failed_applies,
                self.epoch_secs as f64 / 60.0
            );
            self.total_checks = 0;
            self.applies = 0;
            self.failed_applies = 0;
            self.epoch_secs = 0;
        }
    }
}

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Desired state was (re)parsed and accepted for apply
    pub update: bool,
    pub apply_failed: bool,
    /// `None` when no apply was attempted
    pub scrub: Option<ScrubResult>,
    pub version_recorded: bool,
    pub flushed: bool,
    pub maintained: bool,
    pub sleep_secs: u64,
}

/// The reconciler: fetch, parse, scrub, apply, record, sleep.
#[derive(Debug)]
pub struct ControlLoop<D: NetworkDriver> {
    ctx: EucanetdContext,
    dispatch: DriverDispatch<D>,
    counters: CycleCounters,
    first_cycle: bool,
    last_failed: bool,
    running: bool,
    cleaned_up: bool,
}

fn cycle_view(ctx: &EucanetdContext) -> CycleView<'_> {
    let (gni, last_applied) = ctx.buffers.current_and_applied();
    CycleView {
        config: &ctx.config,
        peer: ctx.peer,
        gni,
        last_applied,
        lni: ctx.lni.as_ref(),
    }
}

impl<D: NetworkDriver> ControlLoop<D> {
    pub fn new(ctx: EucanetdContext, dispatch: DriverDispatch<D>) -> Self {
        Self {
            ctx,
            dispatch,
            counters: CycleCounters::default(),
            first_cycle: true,
            last_failed: false,
            running: true,
            cleaned_up: false,
        }
    }

    pub fn context(&self) -> &EucanetdContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EucanetdContext {
        &mut self.ctx
    }

    pub fn dispatch(&self) -> &DriverDispatch<D> {
        &self.dispatch
    }

    pub fn dispatch_mut(&mut self) -> &mut DriverDispatch<D> {
        &mut self.dispatch
    }

    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run cycles until terminated or a flush completed, then clean up the
    /// driver.
    pub async fn run(&mut self) {
        while self.running && !self.ctx.signals.term() {
            self.run_cycle().await;
        }
        if self.ctx.signals.term() {
            log::info!("shutting down eucanetd due to SIGTERM");
        }
        log::info!("eucanetd going down");
        self.cleanup().await;
        log::info!("=== eucanetd down ===");
    }

    /// Invoke the driver cleanup, at most once per loop.
    pub async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        log::info!(
            "Cleaning up '{}' network driver on termination",
            self.dispatch.name()
        );
        let gni = self.ctx.buffers.applied();
        if let Err(e) = self
            .dispatch
            .cleanup(&self.ctx.config, gni, self.ctx.config.flush_mode)
            .await
        {
            log::error!(
                "Failed to cleanup '{}' network driver: {e}",
                self.dispatch.name()
            );
        }
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut timer = CycleTimer::start();
        let mut report = CycleReport::default();

        let mut update = self.fetch_stage();
        if update {
            update = self.parse_stage().await;
        }
        let mut apply_failed = self.upgrade_stage().await;

        if !self.ctx.config.flush_mode.is_none() {
            self.flush_stage().await;
            report.flushed = true;
            update = false;
        }

        if update {
            let (scrub, failed) = self.apply_stage(&mut timer).await;
            report.scrub = Some(scrub);
            apply_failed |= failed;
            report.version_recorded =
                self.record_stage(scrub, apply_failed);
        }
        report.update = update;
        report.apply_failed = apply_failed;

        self.counters_stage(apply_failed).await;

        if !update && !apply_failed && self.running {
            report.maintained = self.maintain_stage().await;
        }

        report.sleep_secs = self.swap_stage(update, apply_failed, &timer);
        if report.sleep_secs > 0 {
            clock::sleep_secs(report.sleep_secs).await;
        }
        self.counters.epoch_secs = self
            .counters
            .epoch_secs
            .saturating_add(self.ctx.config.polling_frequency());
        report
    }

    /// Refresh inputs and decide whether the desired state must be
    /// re-evaluated.
    fn fetch_stage(&mut self) -> bool {
        if let Err(e) = self.ctx.fetch_latest_local_config() {
            log::warn!("failed to fetch local configuration: {e}");
        }
        let changed = match self.ctx.fetch_latest_network() {
            Ok(c) => c,
            Err(e) => {
                log::warn!(
                    "fetch for latest network information was \
                     unsuccessful: {e}"
                );
                false
            }
        };
        let mut update = changed;
        if self.first_cycle {
            update = true;
            self.first_cycle = false;
        }
        if self.ctx.signals.take_reload() {
            log::info!("reload requested, forcing a full re-scrub");
            self.ctx.config.last_applied_version.clear();
            self.ctx.config.flush_mode = Default::default();
            update = true;
        }
        if self.last_failed {
            log::debug!(
                "last update of network state failed, forcing a retry"
            );
            update = true;
        }
        update
    }

    /// Parse the fetched document, returns whether it should be applied.
    async fn parse_stage(&mut self) -> bool {
        if let Err(e) = self.ctx.read_latest_network().await {
            log::warn!("Failed to populate GNI, skipping update: {e}");
            return false;
        }
        // Holds on forced retries too, a recorded version is never re-applied
        if self.ctx.is_already_applied() {
            log::debug!(
                "desired state version {} already applied",
                self.ctx.config.last_applied_version
            );
            return false;
        }
        true
    }

    /// Returns true when an outstanding upgrade failed.
    async fn upgrade_stage(&mut self) -> bool {
        if !self.dispatch.upgrade_pending() {
            return false;
        }
        match self.dispatch.upgrade(cycle_view(&self.ctx)).await {
            Ok(_) => false,
            Err(e) => {
                log::warn!("could not complete network upgrade: {e}");
                true
            }
        }
    }

    async fn flush_stage(&mut self) {
        let flush_mode = self.ctx.config.flush_mode;
        match flush_mode.check_mode(self.ctx.config.network_mode) {
            Ok(()) => {
                let timer = CycleTimer::start();
                let arg = self.ctx.config.flush_mode_arg.clone();
                if let Err(e) = self
                    .dispatch
                    .flush(cycle_view(&self.ctx), flush_mode, arg.as_deref())
                    .await
                {
                    log::error!(
                        "flushing of euca networking artifacts failed: {e}"
                    );
                }
                log::info!(
                    "eucanetd flush executed in {} ms",
                    timer.elapsed_ms()
                );
            }
            Err(e) => log::error!("{e}"),
        }
        self.running = false;
        self.ctx.config.flush_mode = Default::default();
    }

    /// Scrub then run the requested apply APIs in order. Returns the scrub
    /// result and whether anything failed.
    async fn apply_stage(
        &mut self,
        timer: &mut CycleTimer,
    ) -> (ScrubResult, bool) {
        log::info!("new networking state: updating system");
        timer.lap_ms();
        if let Err(e) = self.ctx.populate_lni().await {
            log::error!("Failed to populate our local network view: {e}");
            return (ScrubResult::NONE, true);
        }

        let scrub = match self.dispatch.scrub(cycle_view(&self.ctx)).await {
            Ok(s) => s,
            Err(e) => {
                log::error!("system scrub failed: {e}");
                ScrubResult::ERROR
            }
        };
        log::info!(
            "eucanetd system scrub ({scrub}) executed in {:.2} ms",
            timer.lap_ms()
        );

        let mut failed = false;
        if scrub.is_error() {
            log::error!(
                "could not complete VM network update: check above log \
                 errors for details"
            );
            failed = true;
        } else {
            for api in scrub.requested_apis() {
                match self.dispatch.implement(api, cycle_view(&self.ctx)).await
                {
                    Ok(()) => log::info!(
                        "eucanetd implement {api} executed in {:.2} ms",
                        timer.lap_ms()
                    ),
                    Err(e) => {
                        log::error!("could not complete {api} update: {e}");
                        failed = true;
                        // Later APIs depend on what network installs
                        if api == ApplyApi::Network {
                            break;
                        }
                    }
                }
            }
        }
        self.ctx.reset_lni();
        (scrub, failed)
    }

    /// Persist the applied version, returns whether it was recorded.
    fn record_stage(&mut self, scrub: ScrubResult, apply_failed: bool) -> bool {
        if apply_failed {
            self.counters.failed_applies += 1;
            if !scrub.is_partial_converge() {
                return false;
            }
            log::info!("overlay converged partially, recording version");
        } else {
            self.counters.applies += 1;
        }
        match self.ctx.write_version_file() {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "failed to populate GNI version file: check permissions \
                     and disk capacity: {e}"
                );
                false
            }
        }
    }

    async fn counters_stage(&mut self, apply_failed: bool) {
        self.counters.total_checks += 1;
        if apply_failed {
            self.counters.record_failure();
        }
        for signal in [DriverSignal::Usr1, DriverSignal::Usr2] {
            if self.ctx.signals.take(signal) {
                log::info!("forwarding {signal} to {}", self.dispatch.name());
                if let Err(e) = self
                    .dispatch
                    .handle_signal(&self.ctx.config, signal)
                    .await
                {
                    log::warn!("driver failed to handle {signal}: {e}");
                }
            }
        }
        self.counters.report_if_due();
    }

    async fn maintain_stage(&mut self) -> bool {
        let gni: &GlobalNetworkInfo = self
            .ctx
            .buffers
            .applied()
            .unwrap_or_else(|| self.ctx.buffers.current());
        match self.dispatch.maintain(&self.ctx.config, gni).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Failed to execute maintenance for {}: {e}",
                    self.dispatch.name()
                );
                false
            }
        }
    }

    /// Rotate the buffers, returns seconds to sleep before the next cycle.
    fn swap_stage(
        &mut self,
        update: bool,
        apply_failed: bool,
        timer: &CycleTimer,
    ) -> u64 {
        let sleep_secs = if apply_failed {
            self.ctx.buffers.invalidate_applied();
            log::warn!(
                "main loop complete ({} ms): failures detected sleeping \
                 {FAILURE_RETRY_SECS} seconds before next poll",
                timer.elapsed_ms()
            );
            FAILURE_RETRY_SECS
        } else {
            if update {
                self.counters.failure_streak = 0;
                self.ctx.buffers.publish_applied();
                log::info!(
                    "main loop complete ({} ms), applied GNI {}",
                    timer.elapsed_ms(),
                    self.ctx.config.last_applied_version
                );
            } else {
                log::trace!(
                    "main loop complete ({} ms): sleeping {} seconds before \
                     next poll",
                    timer.elapsed_ms(),
                    self.ctx.config.polling_frequency()
                );
            }
            self.ctx.config.polling_frequency()
        };
        self.last_failed = apply_failed;
        if self.running && !self.ctx.signals.term() {
            sleep_secs
        } else {
            0
        }
    }
}
