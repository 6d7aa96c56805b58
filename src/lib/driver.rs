// SPDX-License-Identifier: Apache-2.0

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
    DriverSignal, ErrorKind, EucanetdConfig, EucanetdError, FlushMode,
    GlobalNetworkInfo, LocalNetworkInfo, PeerRole,
};

/// Bitset returned by scrub naming the apply APIs to invoke this cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct ScrubResult(u32);

impl ScrubResult {
    pub const NONE: Self = Self(0);
    pub const NETWORK: Self = Self(0x01);
    pub const SECURITY_GROUPS: Self = Self(0x02);
    pub const ADDRESSING: Self = Self(0x04);
    pub const ALL: Self = Self(0x07);
    pub const ERROR: Self = Self(0x08);
    /// Combined with `ERROR`: apply failed but converged enough for its
    /// version to be recorded.
    pub const PARTIAL_CONVERGE: Self = Self(0x10);
    pub const OVERLAY_PARTIAL: Self = Self(0x18);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_error(&self) -> bool {
        self.contains(Self::ERROR)
    }

    pub fn is_partial_converge(&self) -> bool {
        *self == Self::OVERLAY_PARTIAL
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Requested apply APIs in their mandatory order
    pub fn requested_apis(&self) -> Vec<ApplyApi> {
        if self.is_error() {
            return Vec::new();
        }
        ApplyApi::ORDER
            .iter()
            .copied()
            .filter(|api| self.contains(api.scrub_bit()))
            .collect()
    }
}

impl std::ops::BitOr for ScrubResult {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Display for ScrubResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_error() {
            return write!(f, "error(0x{:x})", self.0);
        }
        let apis: Vec<&str> =
            self.requested_apis().iter().map(|a| a.as_str()).collect();
        if apis.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", apis.join(","))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyApi {
    Network,
    SecurityGroups,
    Addressing,
}

impl ApplyApi {
    /// Later APIs may reference what earlier ones install.
    pub const ORDER: [Self; 3] =
        [Self::Network, Self::SecurityGroups, Self::Addressing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::SecurityGroups => "security-groups",
            Self::Addressing => "addressing",
        }
    }

    pub fn scrub_bit(&self) -> ScrubResult {
        match self {
            Self::Network => ScrubResult::NETWORK,
            Self::SecurityGroups => ScrubResult::SECURITY_GROUPS,
            Self::Addressing => ScrubResult::ADDRESSING,
        }
    }
}

impl std::fmt::Display for ApplyApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operations a back-end actually implements.
///
/// The dispatcher only calls operations flagged here, absent ones follow
/// fixed rules: no scrub means run all apply APIs, a requested but absent
/// apply API is an error, everything else is a successful no-op.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[non_exhaustive]
pub struct DriverCapabilities {
    pub init: bool,
    pub upgrade: bool,
    pub flush: bool,
    pub scrub: bool,
    pub implement_network: bool,
    pub implement_security_groups: bool,
    pub implement_addressing: bool,
    pub maintain: bool,
    pub handle_signal: bool,
    pub cleanup: bool,
}

impl DriverCapabilities {
    pub fn all() -> Self {
        Self {
            init: true,
            upgrade: true,
            flush: true,
            scrub: true,
            implement_network: true,
            implement_security_groups: true,
            implement_addressing: true,
            maintain: true,
            handle_signal: true,
            cleanup: true,
        }
    }

    pub fn supports_apply(&self, api: ApplyApi) -> bool {
        match api {
            ApplyApi::Network => self.implement_network,
            ApplyApi::SecurityGroups => self.implement_security_groups,
            ApplyApi::Addressing => self.implement_addressing,
        }
    }
}

/// What a driver sees of the current cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleView<'a> {
    pub config: &'a EucanetdConfig,
    pub peer: PeerRole,
    pub gni: &'a GlobalNetworkInfo,
    /// `None` before the first successful apply or after a failed cycle
    pub last_applied: Option<&'a GlobalNetworkInfo>,
    /// `None` in overlay mode
    pub lni: Option<&'a LocalNetworkInfo>,
}

/// Back-end turning desired state into host networking artifacts.
///
/// Every operation may block and may fail. Only the operations flagged in
/// [NetworkDriver::capabilities] are ever invoked, the provided defaults
/// stand in for the optional ones a back-end does not implement.
pub trait NetworkDriver: Send {
    fn name(&self) -> &str;

    fn capabilities(&self) -> DriverCapabilities;

    fn init(
        &mut self,
        _config: &EucanetdConfig,
        _peer: PeerRole,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send {
        async { Ok(()) }
    }

    /// Invoked each cycle until it succeeds once
    fn upgrade(
        &mut self,
        _view: CycleView<'_>,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send {
        let e = no_support(self.name(), "upgrade");
        async { Err(e) }
    }

    fn flush(
        &mut self,
        _view: CycleView<'_>,
        _mode: FlushMode,
        _arg: Option<&str>,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send {
        let e = no_support(self.name(), "flush");
        async { Err(e) }
    }

    fn scrub(
        &mut self,
        view: CycleView<'_>,
    ) -> impl Future<Output = Result<ScrubResult, EucanetdError>> + Send;

    fn implement_network(
        &mut self,
        view: CycleView<'_>,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send;

    fn implement_security_groups(
        &mut self,
        view: CycleView<'_>,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send;

    fn implement_addressing(
        &mut self,
        view: CycleView<'_>,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send;

    /// Invoked on idle cycles
    fn maintain(
        &mut self,
        _config: &EucanetdConfig,
        _gni: &GlobalNetworkInfo,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send {
        async { Ok(()) }
    }

    fn handle_signal(
        &mut self,
        _config: &EucanetdConfig,
        _signal: DriverSignal,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send {
        async { Ok(()) }
    }

    fn cleanup(
        &mut self,
        _config: &EucanetdConfig,
        _gni: Option<&GlobalNetworkInfo>,
        _flush_mode: FlushMode,
    ) -> impl Future<Output = Result<(), EucanetdError>> + Send {
        async { Ok(()) }
    }
}

pub(crate) fn no_support(driver: &str, operation: &str) -> EucanetdError {
    EucanetdError::new(
        ErrorKind::NoSupport,
        format!("Driver {driver} does not implement {operation}"),
    )
}
