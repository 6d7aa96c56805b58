// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr};

use super::mock::{gni_xml, CC_IP, CLC_IP, NODE_IP};
use crate::{detect_peer, gni_from_str, ErrorKind, NetworkMode, PeerRole};

fn ips(ips: &[&str]) -> Vec<IpAddr> {
    ips.iter().map(|i| i.parse().unwrap()).collect()
}

#[test]
fn test_parse_gni_document() {
    let gni = gni_from_str(&gni_xml("1439314587", "EDGE")).unwrap();

    assert_eq!(gni.version, "1439314587");
    assert_eq!(gni.applied_version, "1439314587");
    assert_eq!(gni.mode, NetworkMode::Edge);
    assert_eq!(gni.enabled_clc_ip, Some(Ipv4Addr::new(10, 111, 5, 1)));
    assert_eq!(gni.instance_dns_domain, "eucalyptus.internal");
    assert_eq!(gni.public_ips.len(), 2);
    assert_eq!(gni.clusters.len(), 1);

    let cluster = &gni.clusters[0];
    assert_eq!(cluster.name, "c1");
    assert_eq!(cluster.mac_prefix, "d0:0d");
    assert_eq!(cluster.enabled_cc_ip, Some(Ipv4Addr::new(10, 111, 5, 10)));
    let subnet = cluster.private_subnet.as_ref().unwrap();
    assert_eq!(subnet.gateway, Ipv4Addr::new(172, 16, 0, 1));
    assert_eq!(subnet.prefix_len(), 16);
    assert_eq!(cluster.nodes[0].instance_ids, vec!["i-12345678"]);

    let instance = gni.instance("i-12345678").unwrap();
    assert_eq!(instance.public_ip, Some(Ipv4Addr::new(192, 0, 2, 10)));
    assert_eq!(instance.security_groups, vec!["sg-00000001"]);
    assert_eq!(gni.security_group("sg-00000001").unwrap().rules.len(), 1);
}

#[test]
fn test_parse_gni_unknown_mode() {
    let gni = gni_from_str(&gni_xml("1", "SYSTEM")).unwrap();
    assert_eq!(gni.mode, NetworkMode::Invalid);
    assert_eq!(gni.mode_str, "SYSTEM");
}

#[test]
fn test_parse_gni_unassigned_public_ip() {
    let xml = gni_xml("1", "EDGE").replace(
        "<publicIp>192.0.2.10</publicIp>",
        "<publicIp>0.0.0.0</publicIp>",
    );
    let gni = gni_from_str(&xml).unwrap();
    assert_eq!(gni.instances[0].public_ip, None);
}

#[test]
fn test_parse_gni_truncated() {
    let xml = gni_xml("1", "EDGE");
    let result = gni_from_str(&xml[..xml.len() / 2]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
}

#[test]
fn test_parse_gni_wrong_root() {
    let result = gni_from_str("<network-topology version=\"1\"/>");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
}

#[test]
fn test_parse_gni_invalid_address() {
    let xml = gni_xml("1", "EDGE").replace(
        "<privateIp>172.16.0.20</privateIp>",
        "<privateIp>172.16.0.300</privateIp>",
    );
    let result = gni_from_str(&xml);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
}

#[test]
fn test_self_location() {
    let gni = gni_from_str(&gni_xml("1", "EDGE")).unwrap();

    assert!(gni.find_self_node(&ips(&[NODE_IP])).is_some());
    assert!(gni.find_self_node(&ips(&[CC_IP])).is_none());
    assert!(gni.find_self_cluster(&ips(&[CC_IP])).is_some());
    assert!(gni.find_self_cluster(&ips(&["10.99.0.1"])).is_none());
    assert!(gni.is_enabled_clc(&ips(&["127.0.0.1", CLC_IP])));
    assert_eq!(gni.local_instances(&ips(&[NODE_IP])).len(), 1);
}

#[test]
fn test_detect_peer() {
    let gni = gni_from_str(&gni_xml("1", "EDGE")).unwrap();

    assert_eq!(detect_peer(&gni, &ips(&[NODE_IP])), PeerRole::NodeController);
    assert_eq!(
        detect_peer(&gni, &ips(&[CC_IP])),
        PeerRole::ClusterController
    );
    // Node wins when co-located with its cluster controller
    assert_eq!(
        detect_peer(&gni, &ips(&[CC_IP, NODE_IP])),
        PeerRole::NodeController
    );
    assert_eq!(
        detect_peer(&gni, &ips(&[CLC_IP])),
        PeerRole::NonClusterHost
    );
}

#[test]
fn test_section_diff() {
    let old = gni_from_str(&gni_xml("1", "EDGE")).unwrap();
    let mut new = old.clone();
    new.version = "2".to_string();
    assert!(!new.network_differs(&old));
    assert!(!new.security_groups_differ(&old));
    assert!(!new.addressing_differs(&old));

    new.instances[0].public_ip = Some(Ipv4Addr::new(192, 0, 2, 11));
    assert!(new.addressing_differs(&old));
    assert!(!new.security_groups_differ(&old));

    new.security_groups[0].rules.push("-P udp -p 53-53".to_string());
    assert!(new.security_groups_differ(&old));

    new.instance_dns_domain = "cloud.internal".to_string();
    assert!(new.network_differs(&old));
}
