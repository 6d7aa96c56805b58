// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, EucanetdError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum NetworkMode {
    #[serde(rename = "EDGE")]
    Edge,
    #[serde(rename = "MANAGED")]
    Managed,
    #[serde(rename = "MANAGED-NOVLAN")]
    ManagedNoVlan,
    #[serde(rename = "VPCMIDO")]
    VpcMido,
    #[default]
    #[serde(rename = "INVALID")]
    Invalid,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "EDGE",
            Self::Managed => "MANAGED",
            Self::ManagedNoVlan => "MANAGED-NOVLAN",
            Self::VpcMido => "VPCMIDO",
            Self::Invalid => "INVALID",
        }
    }

    /// Unknown strings map to [NetworkMode::Invalid] instead of failing, the
    /// daemon keeps waiting for a valid mode in that case.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "EDGE" => Self::Edge,
            "MANAGED" => Self::Managed,
            "MANAGED-NOVLAN" => Self::ManagedNoVlan,
            "VPCMIDO" => Self::VpcMido,
            _ => Self::Invalid,
        }
    }

    /// Overlay mode: the overlay controller owns the data plane, no local
    /// view is needed.
    pub fn is_overlay(&self) -> bool {
        *self == Self::VpcMido
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::Invalid
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FlushMode {
    #[default]
    None,
    /// `-F`: remove all artifacts
    All,
    /// `-f`: remove dynamic artifacts only
    Dynamic,
    /// `-C`: remove all but core overlay objects
    MidoDynamic,
    /// `-Z`: remove all overlay objects including core ones
    MidoAll,
    /// `-m`: detect duplicate overlay objects
    MidoCheckDups,
    /// `-M`: detect and remove duplicate overlay objects
    MidoDups,
    /// `-u`: detect unconnected overlay objects
    MidoCheckUnconnected,
    /// `-U`: detect and remove unconnected overlay objects
    MidoUnconnected,
    /// `-l`: list overlay VPC objects
    MidoListVpc,
    /// `-v ID`: check one overlay VPC object
    MidoCheckVpc,
    /// `-V ID`: remove one overlay VPC object
    MidoVpc,
    /// `-z ID`: overlay driver self test
    MidoTest,
}

impl FlushMode {
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    /// Read-only modes could run while another eucanetd is running.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::MidoListVpc
                | Self::MidoCheckDups
                | Self::MidoCheckUnconnected
                | Self::MidoCheckVpc
        )
    }

    pub fn is_overlay_only(&self) -> bool {
        !matches!(self, Self::None | Self::All | Self::Dynamic)
    }

    pub fn needs_argument(&self) -> bool {
        matches!(self, Self::MidoCheckVpc | Self::MidoVpc | Self::MidoTest)
    }

    /// `-f`/`-F` are forbidden in overlay mode, overlay specific modes are
    /// forbidden elsewhere.
    pub fn check_mode(&self, mode: NetworkMode) -> Result<(), EucanetdError> {
        if mode.is_overlay() && matches!(self, Self::All | Self::Dynamic) {
            Err(EucanetdError::new(
                ErrorKind::InvalidArgument,
                format!("options '-f' and '-F' cannot be used in {mode} mode"),
            ))
        } else if !mode.is_overlay() && self.is_overlay_only() {
            Err(EucanetdError::new(
                ErrorKind::InvalidArgument,
                format!("Invalid flush mode {self} selected for {mode} mode"),
            ))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Display for FlushMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::None => "none",
                Self::All => "all",
                Self::Dynamic => "dynamic",
                Self::MidoDynamic => "mido-dynamic",
                Self::MidoAll => "mido-all",
                Self::MidoCheckDups => "mido-check-dups",
                Self::MidoDups => "mido-dups",
                Self::MidoCheckUnconnected => "mido-check-unconnected",
                Self::MidoUnconnected => "mido-unconnected",
                Self::MidoListVpc => "mido-list-vpc",
                Self::MidoCheckVpc => "mido-check-vpc",
                Self::MidoVpc => "mido-vpc",
                Self::MidoTest => "mido-test",
            }
        )
    }
}
