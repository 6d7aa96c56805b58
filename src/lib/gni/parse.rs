// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;
use std::path::Path;

use super::xml::XmlElement;
use crate::{
    ErrorKind, EucanetdError, GlobalNetworkInfo, GniCluster, GniInstance,
    GniMido, GniNode, GniSecurityGroup, GniSubnet, GniVpc, GniVpcSubnet,
    NetworkMode,
};

const GNI_ROOT: &str = "network-data";

pub fn gni_from_file(path: &Path) -> Result<GlobalNetworkInfo, EucanetdError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EucanetdError::new(
            ErrorKind::TransientInput,
            format!("Failed to read {}: {e}", path.display()),
        )
    })?;
    gni_from_str(&content)
}

pub fn gni_from_str(content: &str) -> Result<GlobalNetworkInfo, EucanetdError> {
    let root = XmlElement::parse(content)?;
    if root.name != GNI_ROOT {
        return Err(EucanetdError::new(
            ErrorKind::TransientInput,
            format!(
                "Expecting <{GNI_ROOT}> as root element, but got <{}>",
                root.name
            ),
        ));
    }

    let mut gni = GlobalNetworkInfo {
        version: root.attr("version").unwrap_or_default().to_string(),
        applied_version: root
            .attr("applied-version")
            .unwrap_or_default()
            .to_string(),
        ..Default::default()
    };

    if let Some(conf) = root.child("configuration") {
        parse_configuration(conf, &mut gni)?;
    }
    if let Some(instances) = root.child("instances") {
        for instance in instances.children_named("instance") {
            gni.instances.push(parse_instance(instance)?);
        }
    }
    if let Some(groups) = root.child("securityGroups") {
        for group in groups.children_named("securityGroup") {
            gni.security_groups.push(GniSecurityGroup {
                name: name_of(group)?,
                owner_id: group.child_text("ownerId"),
                rules: group.child("rules").map(|r| r.values()).unwrap_or_default(),
            });
        }
    }
    if let Some(vpcs) = root.child("vpcs") {
        for vpc in vpcs.children_named("vpc") {
            gni.vpcs.push(parse_vpc(vpc)?);
        }
    }
    Ok(gni)
}

fn name_of(element: &XmlElement) -> Result<String, EucanetdError> {
    match element.attr("name") {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(EucanetdError::new(
            ErrorKind::TransientInput,
            format!("<{}> element without name attribute", element.name),
        )),
    }
}

fn parse_ipv4(value: &str, what: &str) -> Result<Ipv4Addr, EucanetdError> {
    value.parse::<Ipv4Addr>().map_err(|e| {
        EucanetdError::new(
            ErrorKind::TransientInput,
            format!("Invalid IPv4 address '{value}' for {what}: {e}"),
        )
    })
}

fn parse_opt_ipv4(
    value: &str,
    what: &str,
) -> Result<Option<Ipv4Addr>, EucanetdError> {
    // The cloud uses 0.0.0.0 for unassigned addresses
    match value.trim() {
        "" | "0.0.0.0" => Ok(None),
        v => parse_ipv4(v, what).map(Some),
    }
}

fn property_ipv4_list(
    element: &XmlElement,
    name: &str,
) -> Result<Vec<Ipv4Addr>, EucanetdError> {
    let mut ret = Vec::new();
    if let Some(prop) = element.property(name) {
        for value in prop.values() {
            ret.push(parse_ipv4(value.as_str(), name)?);
        }
    }
    Ok(ret)
}

fn property_value(element: &XmlElement, name: &str) -> String {
    element
        .property(name)
        .and_then(|p| p.first_value())
        .unwrap_or_default()
}

fn parse_configuration(
    conf: &XmlElement,
    gni: &mut GlobalNetworkInfo,
) -> Result<(), EucanetdError> {
    gni.mode_str = property_value(conf, "mode");
    gni.mode = NetworkMode::parse(gni.mode_str.as_str());
    gni.enabled_clc_ip = parse_opt_ipv4(
        property_value(conf, "enabledCLCIp").as_str(),
        "enabledCLCIp",
    )?;
    gni.instance_dns_domain = property_value(conf, "instanceDNSDomain");
    gni.instance_dns_servers =
        property_ipv4_list(conf, "instanceDNSServers")?;
    gni.public_ips = property_ipv4_list(conf, "publicIps")?;

    if let Some(mido) = conf.property("mido") {
        gni.mido = GniMido {
            eucanetd_host: property_value(mido, "eucanetdHost"),
            gateway_hosts: mido
                .property("gatewayHosts")
                .map(|p| p.values())
                .unwrap_or_default(),
            public_network_cidr: property_value(mido, "publicNetworkCidr"),
            public_gateway_ip: property_value(mido, "publicGatewayIP"),
        };
    }

    if let Some(clusters) = conf.property("clusters") {
        for cluster in clusters.children_named("cluster") {
            gni.clusters.push(parse_cluster(cluster)?);
        }
    }
    Ok(())
}

fn parse_cluster(cluster: &XmlElement) -> Result<GniCluster, EucanetdError> {
    let name = name_of(cluster)?;
    let private_subnet = match cluster.child("subnet") {
        Some(subnet) => Some(GniSubnet {
            subnet: parse_ipv4(
                property_value(subnet, "subnet").as_str(),
                "subnet",
            )?,
            netmask: parse_ipv4(
                property_value(subnet, "netmask").as_str(),
                "netmask",
            )?,
            gateway: parse_ipv4(
                property_value(subnet, "gateway").as_str(),
                "gateway",
            )?,
        }),
        None => None,
    };
    let mut nodes = Vec::new();
    if let Some(prop) = cluster.property("nodes") {
        for node in prop.children_named("node") {
            nodes.push(GniNode {
                name: name_of(node)?,
                instance_ids: node
                    .child("instanceIds")
                    .map(|i| i.values())
                    .unwrap_or_default(),
            });
        }
    }
    Ok(GniCluster {
        enabled_cc_ip: parse_opt_ipv4(
            property_value(cluster, "enabledCCIp").as_str(),
            "enabledCCIp",
        )?,
        mac_prefix: property_value(cluster, "macPrefix"),
        private_ips: property_ipv4_list(cluster, "privateIps")?,
        private_subnet,
        nodes,
        name,
    })
}

fn parse_instance(instance: &XmlElement) -> Result<GniInstance, EucanetdError> {
    Ok(GniInstance {
        name: name_of(instance)?,
        owner_id: instance.child_text("ownerId"),
        mac_address: instance.child_text("macAddress"),
        public_ip: parse_opt_ipv4(
            instance.child_text("publicIp").as_str(),
            "publicIp",
        )?,
        private_ip: parse_opt_ipv4(
            instance.child_text("privateIp").as_str(),
            "privateIp",
        )?,
        vpc: instance.child_text("vpc"),
        subnet: instance.child_text("subnet"),
        security_groups: instance
            .child("securityGroups")
            .map(|s| s.values())
            .unwrap_or_default(),
    })
}

fn parse_vpc(vpc: &XmlElement) -> Result<GniVpc, EucanetdError> {
    let mut subnets = Vec::new();
    if let Some(s) = vpc.child("subnets") {
        for subnet in s.children_named("subnet") {
            subnets.push(GniVpcSubnet {
                name: name_of(subnet)?,
                cidr: subnet.child_text("cidr"),
            });
        }
    }
    Ok(GniVpc {
        name: name_of(vpc)?,
        owner_id: vpc.child_text("ownerId"),
        cidr: vpc.child_text("cidr"),
        subnets,
    })
}
