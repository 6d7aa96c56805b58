// SPDX-License-Identifier: Apache-2.0

use crate::{
    clock, detect_peer, DriverDispatch, ErrorKind, EucanetdConfig,
    EucanetdContext, EucanetdError, LocalNetworkInfo, NetworkDriver,
    NetworkMode, PeerRole,
};

const INVALID_MODE_LOG_INTERVAL: u32 = 30;
const WAIT_LOG_INTERVAL: u32 = 100;
const RETRY_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreflightStage {
    LoadDesiredState,
    DetectPeer,
    InitDriver,
    InitLocalView,
    Complete,
}

impl std::fmt::Display for PreflightStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::LoadDesiredState => "load-desired-state",
                Self::DetectPeer => "detect-peer",
                Self::InitDriver => "init-driver",
                Self::InitLocalView => "init-local-view",
                Self::Complete => "complete",
            }
        )
    }
}

#[derive(Debug)]
pub enum PreflightOutcome<D: NetworkDriver> {
    Ready(DriverDispatch<D>),
    /// Terminate signal received before the main loop
    Terminated,
}

/// Retries until the inputs are coherent, then selects and initializes the
/// driver through `select_driver`.
pub async fn run_preflight<D, F>(
    ctx: &mut EucanetdContext,
    select_driver: F,
) -> Result<PreflightOutcome<D>, EucanetdError>
where
    D: NetworkDriver,
    F: FnOnce(NetworkMode, &EucanetdConfig) -> Result<D, EucanetdError>,
{
    let mut stage = PreflightStage::LoadDesiredState;
    let mut attempts: u32 = 0;
    let mut select_driver = Some(select_driver);
    let mut dispatch: Option<DriverDispatch<D>> = None;

    ctx.cap_log_level();
    loop {
        if ctx.signals.term() {
            log::info!("eucanetd terminated during pre-flight ({stage})");
            return Ok(PreflightOutcome::Terminated);
        }
        let result = match stage {
            PreflightStage::LoadDesiredState => load_desired_state(ctx).await,
            PreflightStage::DetectPeer => check_peer(ctx).await,
            PreflightStage::InitDriver => {
                match init_driver(ctx, &mut select_driver).await {
                    Ok(d) => {
                        dispatch = Some(d);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            PreflightStage::InitLocalView => init_local_view(ctx).await,
            PreflightStage::Complete => {
                ctx.apply_log_params();
                return match dispatch.take() {
                    Some(d) => {
                        log::info!(
                            "eucanetd pre-flight completed: mode {}, peer {}, \
                             driver {}",
                            ctx.config.network_mode,
                            ctx.peer,
                            d.name()
                        );
                        Ok(PreflightOutcome::Ready(d))
                    }
                    None => Err(EucanetdError::new(
                        ErrorKind::Bug,
                        "Pre-flight completed without a driver".to_string(),
                    )),
                };
            }
        };
        match result {
            Ok(()) => {
                stage = next_stage(stage, ctx.config.network_mode);
                attempts = 0;
            }
            Err(e) => {
                if is_fatal(stage, &e) || !ctx.config.flush_mode.is_none() {
                    log::error!("eucanetd pre-flight failed at {stage}: {e}");
                    return Err(e);
                }
                log_retry(stage, attempts, &e);
                attempts = attempts.wrapping_add(1);
                // The peer may only be listed by a later desired state
                if stage == PreflightStage::DetectPeer {
                    stage = PreflightStage::LoadDesiredState;
                }
                clock::sleep_secs(RETRY_INTERVAL_SECS).await;
            }
        }
    }
}

fn next_stage(stage: PreflightStage, mode: NetworkMode) -> PreflightStage {
    match stage {
        PreflightStage::LoadDesiredState => PreflightStage::DetectPeer,
        PreflightStage::DetectPeer => PreflightStage::InitDriver,
        PreflightStage::InitDriver => {
            if mode.is_overlay() {
                PreflightStage::Complete
            } else {
                PreflightStage::InitLocalView
            }
        }
        PreflightStage::InitLocalView | PreflightStage::Complete => {
            PreflightStage::Complete
        }
    }
}

fn is_fatal(stage: PreflightStage, error: &EucanetdError) -> bool {
    match stage {
        PreflightStage::InitDriver | PreflightStage::InitLocalView => true,
        // Desired state might get a valid mode later on
        PreflightStage::LoadDesiredState
            if error.kind() == ErrorKind::InvalidNetworkMode =>
        {
            false
        }
        _ => error.kind().is_fatal(),
    }
}

fn log_retry(stage: PreflightStage, attempts: u32, error: &EucanetdError) {
    let interval = match error.kind() {
        ErrorKind::InvalidNetworkMode => INVALID_MODE_LOG_INTERVAL,
        _ => WAIT_LOG_INTERVAL,
    };
    if attempts % interval == 0 {
        match stage {
            PreflightStage::LoadDesiredState => log::warn!(
                "eucanetd waiting for valid desired state and configuration: \
                 {error}"
            ),
            _ => log::warn!("eucanetd waiting to detect its peer: {error}"),
        }
    }
}

async fn load_desired_state(
    ctx: &mut EucanetdContext,
) -> Result<(), EucanetdError> {
    ctx.read_config().await?;
    if !ctx.config.flush_mode.is_none() {
        ctx.config.flush_mode.check_mode(ctx.config.network_mode)?;
    }
    Ok(())
}

async fn check_peer(ctx: &mut EucanetdContext) -> Result<(), EucanetdError> {
    let local_ips = ctx.probe().local_ips().await?;
    let gni = ctx.buffers.current();
    if ctx.config.network_mode.is_overlay() {
        if gni.is_enabled_clc(&local_ips) {
            return Err(EucanetdError::new(
                ErrorKind::TransientInput,
                format!(
                    "{} mode eucanetd should not run on the enabled cloud \
                     controller",
                    ctx.config.network_mode
                ),
            ));
        }
        ctx.peer = PeerRole::OutOfBand;
    } else {
        let peer = detect_peer(gni, &local_ips);
        if !peer.is_cluster_member() {
            return Err(EucanetdError::new(
                ErrorKind::TransientInput,
                format!(
                    "{} mode eucanetd requires a CC or NC peer, found {peer}",
                    ctx.config.network_mode
                ),
            ));
        }
        ctx.peer = peer;
    }
    log::debug!("eucanetd peer is {}", ctx.peer);
    Ok(())
}

async fn init_driver<D, F>(
    ctx: &mut EucanetdContext,
    select_driver: &mut Option<F>,
) -> Result<DriverDispatch<D>, EucanetdError>
where
    D: NetworkDriver,
    F: FnOnce(NetworkMode, &EucanetdConfig) -> Result<D, EucanetdError>,
{
    let select = select_driver.take().ok_or_else(|| {
        EucanetdError::new(
            ErrorKind::Bug,
            "Driver selection invoked twice".to_string(),
        )
    })?;
    let mut dispatch =
        DriverDispatch::new(select(ctx.config.network_mode, &ctx.config)?);
    log::info!(
        "Initializing driver {} for {} mode",
        dispatch.name(),
        ctx.config.network_mode
    );
    dispatch.init(&ctx.config, ctx.peer).await.map_err(|e| {
        EucanetdError::new(
            ErrorKind::DriverFailure,
            format!("failed to initialize {} driver: {e}", dispatch.name()),
        )
    })?;
    Ok(dispatch)
}

async fn init_local_view(
    ctx: &mut EucanetdContext,
) -> Result<(), EucanetdError> {
    let mut lni = LocalNetworkInfo::default();
    lni.populate(ctx.probe()).await.map_err(|e| {
        EucanetdError::new(
            ErrorKind::DriverFailure,
            format!("failed to initialize local network view: {e}"),
        )
    })?;
    lni.reset();
    ctx.lni = Some(lni);
    Ok(())
}
