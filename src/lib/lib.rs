// SPDX-License-Identifier: Apache-2.0

mod artifact;
mod buffers;
mod clock;
mod config;
mod context;
mod control_loop;
mod dispatch;
mod driver;
mod error;
mod fetch;
mod gni;
mod lni;
mod lock;
mod logging;
mod mode;
mod peer;
mod preflight;
mod signal;


pub use self::artifact::ArtifactStore;
pub use self::buffers::GniBuffers;
pub use self::clock::{now, sleep_secs, CycleTimer};
pub use self::config::{
    resolve_vm_gateway, ConfigValues, EucanetdConfig, EucanetdPaths,
    MidoOptions, OnlineOptions, RestartOptions, RouterIp,
    DEFAULT_POLLING_FREQUENCY, EUCALYPTUS_ENV_VAR_NAME,
    EUCALYPTUS_USER_ENV_VAR_NAME,
};
pub use self::context::EucanetdContext;
pub use self::control_loop::{
    ControlLoop, CycleCounters, CycleReport, FAILURE_STREAK_ALERT,
    TELEMETRY_WINDOW_SECS,
};
pub use self::dispatch::DriverDispatch;
pub use self::driver::{
    ApplyApi, CycleView, DriverCapabilities, NetworkDriver, ScrubResult,
};
pub use self::error::{ErrorKind, EucanetdError};
pub use self::fetch::{write_file, AtomicFile, ConfigFileWatcher};
pub use self::gni::{
    gni_from_file, gni_from_str, GlobalNetworkInfo, GniCluster, GniInstance,
    GniMido, GniNode, GniSecurityGroup, GniSubnet, GniVpc, GniVpcSubnet,
};
pub use self::lni::{
    HostNetworkProbe, LocalInterface, LocalIpv4Addr, LocalNetworkInfo,
    NisporProbe,
};
pub use self::lock::{SingletonLock, EUCANETD_LOCK_PORT};
pub use self::logging::{
    init_logger, EucanetdLogLevel, LogController, LogParams, RotatingLogFile,
};
pub use self::mode::{FlushMode, NetworkMode};
pub use self::peer::{detect_peer, PeerRole};
pub use self::preflight::{run_preflight, PreflightOutcome, PreflightStage};
pub use self::signal::{DriverSignal, SignalFlags};
