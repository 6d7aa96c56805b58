// SPDX-License-Identifier: Apache-2.0

use crate::driver::no_support;
use crate::{
    ApplyApi, CycleView, DriverCapabilities, DriverSignal, EucanetdConfig,
    EucanetdError, FlushMode, GlobalNetworkInfo, NetworkDriver, PeerRole,
    ScrubResult,
};

/// Forwards lifecycle operations to the selected back-end honoring its
/// capabilities.
#[derive(Debug)]
pub struct DriverDispatch<D: NetworkDriver> {
    driver: D,
    caps: DriverCapabilities,
    upgrade_pending: bool,
}

impl<D: NetworkDriver> DriverDispatch<D> {
    pub fn new(driver: D) -> Self {
        let caps = driver.capabilities();
        Self {
            driver,
            caps,
            upgrade_pending: caps.upgrade,
        }
    }

    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn capabilities(&self) -> DriverCapabilities {
        self.caps
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn upgrade_pending(&self) -> bool {
        self.upgrade_pending
    }

    pub async fn init(
        &mut self,
        config: &EucanetdConfig,
        peer: PeerRole,
    ) -> Result<(), EucanetdError> {
        if !self.caps.init {
            log::debug!("Driver {} has no init, skipping", self.name());
            return Ok(());
        }
        self.driver.init(config, peer).await
    }

    /// Runs the outstanding upgrade, returns whether one was attempted.
    /// Once it succeeds it is never invoked again.
    pub async fn upgrade(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<bool, EucanetdError> {
        if !self.upgrade_pending {
            return Ok(false);
        }
        self.driver.upgrade(view).await?;
        log::info!("Driver {} upgrade completed", self.driver.name());
        self.upgrade_pending = false;
        Ok(true)
    }

    pub async fn flush(
        &mut self,
        view: CycleView<'_>,
        mode: FlushMode,
        arg: Option<&str>,
    ) -> Result<(), EucanetdError> {
        if !self.caps.flush {
            return Err(no_support(self.driver.name(), "flush"));
        }
        self.driver.flush(view, mode, arg).await
    }

    /// Without scrub support every apply API runs
    pub async fn scrub(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<ScrubResult, EucanetdError> {
        if !self.caps.scrub {
            return Ok(ScrubResult::ALL);
        }
        self.driver.scrub(view).await
    }

    pub async fn implement(
        &mut self,
        api: ApplyApi,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        if !self.caps.supports_apply(api) {
            return Err(no_support(
                self.driver.name(),
                &format!("implement {api}"),
            ));
        }
        match api {
            ApplyApi::Network => self.driver.implement_network(view).await,
            ApplyApi::SecurityGroups => {
                self.driver.implement_security_groups(view).await
            }
            ApplyApi::Addressing => {
                self.driver.implement_addressing(view).await
            }
        }
    }

    pub async fn maintain(
        &mut self,
        config: &EucanetdConfig,
        gni: &GlobalNetworkInfo,
    ) -> Result<(), EucanetdError> {
        if !self.caps.maintain {
            return Ok(());
        }
        self.driver.maintain(config, gni).await
    }

    pub async fn handle_signal(
        &mut self,
        config: &EucanetdConfig,
        signal: DriverSignal,
    ) -> Result<(), EucanetdError> {
        if !self.caps.handle_signal {
            log::debug!(
                "Driver {} ignores signal {signal}",
                self.driver.name()
            );
            return Ok(());
        }
        self.driver.handle_signal(config, signal).await
    }

    pub async fn cleanup(
        &mut self,
        config: &EucanetdConfig,
        gni: Option<&GlobalNetworkInfo>,
        flush_mode: FlushMode,
    ) -> Result<(), EucanetdError> {
        if !self.caps.cleanup {
            return Ok(());
        }
        self.driver.cleanup(config, gni, flush_mode).await
    }
}
