// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Please report this as bug to upstream
    Bug,
    /// Invalid argument
    InvalidArgument,
    /// Network mode is unknown or not supported by any driver
    InvalidNetworkMode,
    /// Desired state or local configuration could not be fetched or parsed
    TransientInput,
    /// Network mode in desired state differs from the configured one
    ConfigInconsistency,
    /// Driver failed to implement the desired state
    ApplyFailure,
    /// Driver scrub reported an error
    ScrubError,
    /// Not supported
    NoSupport,
    /// Driver initialization or flush failure
    DriverFailure,
    /// Permission deny
    PermissionDeny,
    /// Another eucanetd instance holds the singleton lock
    AlreadyRunning,
    /// Daemon failure
    DaemonFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::InvalidArgument => "invalid-argument",
            Self::InvalidNetworkMode => "invalid-network-mode",
            Self::TransientInput => "transient-input",
            Self::ConfigInconsistency => "config-inconsistency",
            Self::ApplyFailure => "apply-failure",
            Self::ScrubError => "scrub-error",
            Self::NoSupport => "no-support",
            Self::DriverFailure => "driver-failure",
            Self::PermissionDeny => "permission-deny",
            Self::AlreadyRunning => "already-running",
            Self::DaemonFailure => "daemon-failure",
        }
    }

    /// Errors which should terminate the process with exit code 1.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidNetworkMode
                | Self::DriverFailure
                | Self::AlreadyRunning
                | Self::DaemonFailure
                | Self::PermissionDeny
                | Self::Bug
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Try not implement From for EucanetdError here unless you are sure this
// error should always convert to certain type of ErrorKind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EucanetdError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl std::fmt::Display for EucanetdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl EucanetdError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl std::error::Error for EucanetdError {}

impl From<serde_json::Error> for EucanetdError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Bug, format!("serde_json::Error: {e}"))
    }
}

impl From<std::io::Error> for EucanetdError {
    fn from(e: std::io::Error) -> Self {
        let kind = if e.kind() == std::io::ErrorKind::PermissionDenied {
            ErrorKind::PermissionDeny
        } else {
            ErrorKind::Bug
        };
        Self::new(kind, format!("std::io::Error: {e}"))
    }
}

impl From<std::net::AddrParseError> for EucanetdError {
    fn from(e: std::net::AddrParseError) -> Self {
        Self::new(
            ErrorKind::InvalidArgument,
            format!("Invalid IP address: {e}"),
        )
    }
}

impl From<quick_xml::Error> for EucanetdError {
    fn from(e: quick_xml::Error) -> Self {
        Self::new(ErrorKind::TransientInput, format!("Invalid XML: {e}"))
    }
}

impl From<nispor::NisporError> for EucanetdError {
    fn from(e: nispor::NisporError) -> Self {
        Self::new(ErrorKind::TransientInput, format!("{}: {}", e.kind, e.msg))
    }
}
