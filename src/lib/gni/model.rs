// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::NetworkMode;

/// Global Network Information: one version of the cluster wide network
/// intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GlobalNetworkInfo {
    pub version: String,
    pub applied_version: String,
    /// Mode string as found in the document
    pub mode_str: String,
    pub mode: NetworkMode,
    pub enabled_clc_ip: Option<Ipv4Addr>,
    pub instance_dns_domain: String,
    pub instance_dns_servers: Vec<Ipv4Addr>,
    pub public_ips: Vec<Ipv4Addr>,
    pub mido: GniMido,
    pub clusters: Vec<GniCluster>,
    pub instances: Vec<GniInstance>,
    pub security_groups: Vec<GniSecurityGroup>,
    pub vpcs: Vec<GniVpc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniMido {
    pub eucanetd_host: String,
    pub gateway_hosts: Vec<String>,
    pub public_network_cidr: String,
    pub public_gateway_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniSubnet {
    pub subnet: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl GniSubnet {
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & u32::from(self.netmask) == u32::from(self.subnet)
    }

    pub fn prefix_len(&self) -> u8 {
        u32::from(self.netmask).count_ones() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniNode {
    pub name: String,
    pub instance_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniCluster {
    pub name: String,
    pub enabled_cc_ip: Option<Ipv4Addr>,
    pub mac_prefix: String,
    pub private_ips: Vec<Ipv4Addr>,
    pub private_subnet: Option<GniSubnet>,
    pub nodes: Vec<GniNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniInstance {
    pub name: String,
    pub owner_id: String,
    pub mac_address: String,
    pub public_ip: Option<Ipv4Addr>,
    pub private_ip: Option<Ipv4Addr>,
    pub vpc: String,
    pub subnet: String,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniSecurityGroup {
    pub name: String,
    pub owner_id: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniVpcSubnet {
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GniVpc {
    pub name: String,
    pub owner_id: String,
    pub cidr: String,
    pub subnets: Vec<GniVpcSubnet>,
}

fn is_local(ip: Ipv4Addr, local_ips: &[IpAddr]) -> bool {
    local_ips.contains(&IpAddr::V4(ip))
}

fn is_local_str(ip: &str, local_ips: &[IpAddr]) -> bool {
    ip.parse::<IpAddr>()
        .map(|ip| local_ips.contains(&ip))
        .unwrap_or(false)
}

impl GlobalNetworkInfo {
    /// Find the node entry describing this host. Node names are the IP
    /// addresses the cloud registered them with.
    pub fn find_self_node(&self, local_ips: &[IpAddr]) -> Option<&GniNode> {
        self.clusters
            .iter()
            .flat_map(|c| c.nodes.iter())
            .find(|n| is_local_str(n.name.as_str(), local_ips))
    }

    /// Find the cluster this host belongs to, either as its cluster
    /// controller or as one of its nodes.
    pub fn find_self_cluster(
        &self,
        local_ips: &[IpAddr],
    ) -> Option<&GniCluster> {
        self.clusters.iter().find(|c| {
            c.enabled_cc_ip
                .map(|ip| is_local(ip, local_ips))
                .unwrap_or(false)
                || c.nodes
                    .iter()
                    .any(|n| is_local_str(n.name.as_str(), local_ips))
        })
    }

    pub fn is_enabled_clc(&self, local_ips: &[IpAddr]) -> bool {
        self.enabled_clc_ip
            .map(|ip| is_local(ip, local_ips))
            .unwrap_or(false)
    }

    pub fn instance(&self, name: &str) -> Option<&GniInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn security_group(&self, name: &str) -> Option<&GniSecurityGroup> {
        self.security_groups.iter().find(|s| s.name == name)
    }

    /// Instances scheduled on the node matching `local_ips`
    pub fn local_instances(&self, local_ips: &[IpAddr]) -> Vec<&GniInstance> {
        match self.find_self_node(local_ips) {
            Some(node) => node
                .instance_ids
                .iter()
                .filter_map(|id| self.instance(id.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether topology (clusters, subnets, DNS, VPCs, overlay gateways)
    /// differs between two versions.
    pub fn network_differs(&self, other: &Self) -> bool {
        self.mode != other.mode
            || self.clusters != other.clusters
            || self.instance_dns_domain != other.instance_dns_domain
            || self.instance_dns_servers != other.instance_dns_servers
            || self.vpcs != other.vpcs
            || self.mido != other.mido
            || self.enabled_clc_ip != other.enabled_clc_ip
    }

    /// Whether security groups or instance membership differ.
    pub fn security_groups_differ(&self, other: &Self) -> bool {
        self.security_groups != other.security_groups
            || self
                .instances
                .iter()
                .map(|i| (&i.name, &i.private_ip, &i.security_groups))
                .ne(other
                    .instances
                    .iter()
                    .map(|i| (&i.name, &i.private_ip, &i.security_groups)))
    }

    /// Whether public/private addressing of instances differs.
    pub fn addressing_differs(&self, other: &Self) -> bool {
        self.public_ips != other.public_ips
            || self
                .instances
                .iter()
                .map(|i| (&i.name, &i.public_ip, &i.private_ip, &i.mac_address))
                .ne(other.instances.iter().map(|i| {
                    (&i.name, &i.public_ip, &i.private_ip, &i.mac_address)
                }))
    }
}
