// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use eucanetd::{
    ArtifactStore, CycleView, ErrorKind, EucanetdConfig, EucanetdError,
    GlobalNetworkInfo, GniInstance, LocalNetworkInfo, NetworkMode, PeerRole,
    ScrubResult,
};
use serde::{Deserialize, Serialize};

pub(crate) const NETWORK_ARTIFACT: &str = "network";
pub(crate) const SECURITY_GROUPS_ARTIFACT: &str = "security-groups";
pub(crate) const ADDRESSING_ARTIFACT: &str = "addressing";

/// Artifacts rebuilt from scratch on each apply
pub(crate) const DYNAMIC_ARTIFACTS: [&str; 2] =
    [SECURITY_GROUPS_ARTIFACT, ADDRESSING_ARTIFACT];
pub(crate) const ALL_ARTIFACTS: [&str; 3] =
    [NETWORK_ARTIFACT, SECURITY_GROUPS_ARTIFACT, ADDRESSING_ARTIFACT];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetEntry {
    pub cluster: String,
    pub subnet: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanEntry {
    pub security_group: String,
    pub tag: u16,
    pub device: String,
}

/// L2/L3 layout of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDocument {
    pub mode: NetworkMode,
    pub version: String,
    pub peer: PeerRole,
    pub bridge: String,
    pub public_interface: String,
    pub private_interface: String,
    pub vm_gateway: Option<Ipv4Addr>,
    pub metadata_ip: Option<Ipv4Addr>,
    pub dns_domain: String,
    pub dns_servers: Vec<Ipv4Addr>,
    pub l2_isolation: bool,
    pub subnets: Vec<SubnetEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlans: Vec<VlanEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    pub owner_id: String,
    pub rules: Vec<String>,
    pub members: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupDocument {
    pub version: String,
    pub groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub instance: String,
    pub mac_address: String,
    pub private_ip: Option<Ipv4Addr>,
    pub public_ip: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressingDocument {
    pub version: String,
    pub metadata_use_vm_private: bool,
    pub addresses: Vec<AddressEntry>,
}

/// Store of `mode` below the installation root of `config`
pub(crate) fn artifact_store(
    config: &EucanetdConfig,
    mode: NetworkMode,
) -> ArtifactStore {
    ArtifactStore::new(&config.paths.artifact_dir(mode))
}

pub(crate) fn not_initialized(driver: &str) -> EucanetdError {
    EucanetdError::new(
        ErrorKind::Bug,
        format!("Driver {driver} used before init"),
    )
}

/// Instances this host is responsible for: a node only handles the ones
/// scheduled on it.
pub(crate) fn scoped_instances<'a>(
    gni: &'a GlobalNetworkInfo,
    peer: PeerRole,
    lni: Option<&LocalNetworkInfo>,
) -> Vec<&'a GniInstance> {
    match (peer, lni) {
        (PeerRole::NodeController, Some(lni)) => {
            gni.local_instances(&lni.local_ips())
        }
        _ => gni.instances.iter().collect(),
    }
}

pub(crate) fn network_document(
    view: CycleView<'_>,
    vlans: Vec<VlanEntry>,
) -> NetworkDocument {
    let config = view.config;
    NetworkDocument {
        mode: view.gni.mode,
        version: view.gni.version.clone(),
        peer: view.peer,
        bridge: config.restart.bridge_dev.clone(),
        public_interface: config.restart.pub_interface.clone(),
        private_interface: config.restart.priv_interface.clone(),
        vm_gateway: config.vm_gateway_ip,
        metadata_ip: config.online.metadata_ip.or(view.gni.enabled_clc_ip),
        dns_domain: view.gni.instance_dns_domain.clone(),
        dns_servers: view.gni.instance_dns_servers.clone(),
        l2_isolation: !config.online.disable_l2_isolation,
        subnets: view
            .gni
            .clusters
            .iter()
            .filter_map(|c| {
                c.private_subnet.as_ref().map(|s| SubnetEntry {
                    cluster: c.name.clone(),
                    subnet: s.subnet,
                    netmask: s.netmask,
                    gateway: s.gateway,
                })
            })
            .collect(),
        vlans,
    }
}

pub(crate) fn security_group_document(
    view: CycleView<'_>,
) -> SecurityGroupDocument {
    let instances = scoped_instances(view.gni, view.peer, view.lni);
    let mut groups: Vec<GroupEntry> = Vec::new();
    for group in view.gni.security_groups.iter() {
        let members: Vec<Ipv4Addr> = instances
            .iter()
            .filter(|i| i.security_groups.contains(&group.name))
            .filter_map(|i| i.private_ip)
            .collect();
        // A node only installs groups it has members of
        if view.peer == PeerRole::NodeController && members.is_empty() {
            continue;
        }
        groups.push(GroupEntry {
            name: group.name.clone(),
            owner_id: group.owner_id.clone(),
            rules: group.rules.clone(),
            members,
        });
    }
    SecurityGroupDocument {
        version: view.gni.version.clone(),
        groups,
    }
}

pub(crate) fn addressing_document(view: CycleView<'_>) -> AddressingDocument {
    AddressingDocument {
        version: view.gni.version.clone(),
        metadata_use_vm_private: view.config.online.metadata_use_vm_private,
        addresses: scoped_instances(view.gni, view.peer, view.lni)
            .into_iter()
            .map(|i| AddressEntry {
                instance: i.name.clone(),
                mac_address: i.mac_address.clone(),
                private_ip: i.private_ip,
                public_ip: i.public_ip,
            })
            .collect(),
    }
}

/// Request the apply APIs whose desired state section changed since the
/// last apply or whose artifact vanished.
pub(crate) async fn scrub_sections(
    store: &ArtifactStore,
    view: CycleView<'_>,
) -> ScrubResult {
    let last = match view.last_applied {
        Some(l) => l,
        None => {
            log::debug!("No applied state to compare with, running all APIs");
            return ScrubResult::ALL;
        }
    };
    let mut ret = ScrubResult::NONE;
    if view.gni.network_differs(last) || !store.exists(NETWORK_ARTIFACT).await
    {
        ret.insert(ScrubResult::NETWORK);
    }
    if view.gni.security_groups_differ(last)
        || !store.exists(SECURITY_GROUPS_ARTIFACT).await
    {
        ret.insert(ScrubResult::SECURITY_GROUPS);
    }
    if view.gni.addressing_differs(last)
        || !store.exists(ADDRESSING_ARTIFACT).await
    {
        ret.insert(ScrubResult::ADDRESSING);
    }
    ret
}

/// Configured interfaces missing from the local view
pub(crate) fn missing_interfaces(
    config: &EucanetdConfig,
    lni: Option<&LocalNetworkInfo>,
) -> Vec<String> {
    let lni = match lni {
        Some(l) => l,
        None => return Vec::new(),
    };
    [
        config.restart.bridge_dev.as_str(),
        config.restart.pub_interface.as_str(),
        config.restart.priv_interface.as_str(),
    ]
    .into_iter()
    .filter(|name| !name.is_empty() && lni.iface(name).is_none())
    .map(|name| name.to_string())
    .collect()
}

/// Returns how many artifacts were removed.
pub(crate) async fn remove_artifacts(
    store: &ArtifactStore,
    names: &[&str],
) -> Result<usize, EucanetdError> {
    let mut removed = 0;
    for name in names {
        if store.remove(name).await? {
            removed += 1;
        }
    }
    log::info!(
        "Removed {removed} artifact(s) from {}",
        store.dir().display()
    );
    Ok(removed)
}
