// SPDX-License-Identifier: Apache-2.0

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::GlobalNetworkInfo;

/// Role of the cloud component running alongside this eucanetd.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PeerRole {
    #[default]
    Invalid,
    /// Cloud controller
    Controller,
    /// Cluster controller
    ClusterController,
    /// Node controller
    NodeController,
    /// Host not found in desired state
    NonClusterHost,
    OutOfBand,
}

impl PeerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Controller => "CLC",
            Self::ClusterController => "CC",
            Self::NodeController => "NC",
            Self::NonClusterHost => "NON-EUCA-HOST",
            Self::OutOfBand => "OUT-OF-BOUND",
        }
    }

    /// Non-overlay drivers only run next to a cluster or node controller.
    pub fn is_cluster_member(&self) -> bool {
        matches!(self, Self::ClusterController | Self::NodeController)
    }
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Node check goes first: a node controller co-located with its cluster
/// controller is still a node.
pub fn detect_peer(gni: &GlobalNetworkInfo, local_ips: &[IpAddr]) -> PeerRole {
    if gni.find_self_node(local_ips).is_some() {
        log::info!("eucanetd running on {} component", PeerRole::NodeController);
        PeerRole::NodeController
    } else if gni.find_self_cluster(local_ips).is_some() {
        log::info!(
            "eucanetd running on {} component",
            PeerRole::ClusterController
        );
        PeerRole::ClusterController
    } else {
        PeerRole::NonClusterHost
    }
}
