// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use eucanetd::{NetworkMode, PeerRole, ScrubResult};

use super::fixture::{gni, node_lni, Fixture};
use crate::common::{
    addressing_document, artifact_store, missing_interfaces,
    network_document, remove_artifacts, scrub_sections,
    security_group_document, ALL_ARTIFACTS, NETWORK_ARTIFACT,
};

#[test]
fn test_node_only_renders_local_instances() {
    let fx = Fixture::new();
    let gni = gni("v1", "EDGE", false, &[]);
    let lni = node_lni();
    let view = fx.view(PeerRole::NodeController, &gni, None, Some(&lni));

    let addressing = addressing_document(view);
    assert_eq!(addressing.addresses.len(), 1);
    assert_eq!(addressing.addresses[0].instance, "i-00000001");
    assert_eq!(
        addressing.addresses[0].public_ip,
        Some(Ipv4Addr::new(192, 0, 2, 10))
    );

    let groups = security_group_document(view);
    assert_eq!(groups.groups.len(), 1);
    assert_eq!(groups.groups[0].name, "sg-00000001");
    assert_eq!(groups.groups[0].members, vec![Ipv4Addr::new(172, 16, 0, 20)]);
}

#[test]
fn test_cluster_controller_renders_all_instances() {
    let fx = Fixture::new();
    let gni = gni("v1", "EDGE", false, &[]);
    let view = fx.view(PeerRole::ClusterController, &gni, None, None);

    assert_eq!(addressing_document(view).addresses.len(), 2);
    assert_eq!(security_group_document(view).groups.len(), 2);
}

#[test]
fn test_network_document_layout() {
    let fx = Fixture::new();
    let gni = gni("v7", "EDGE", false, &[]);
    let doc =
        network_document(fx.view(PeerRole::NodeController, &gni, None, None), Vec::new());

    assert_eq!(doc.version, "v7");
    assert_eq!(doc.mode, NetworkMode::Edge);
    assert_eq!(doc.bridge, "br0");
    assert_eq!(doc.vm_gateway, Some(Ipv4Addr::new(172, 16, 0, 1)));
    assert_eq!(doc.metadata_ip, Some(Ipv4Addr::new(10, 111, 5, 1)));
    assert_eq!(doc.subnets.len(), 1);
    assert_eq!(doc.subnets[0].gateway, Ipv4Addr::new(172, 16, 0, 1));
    assert!(doc.l2_isolation);
}

#[test]
fn test_missing_interfaces() {
    let mut fx = Fixture::new();
    let lni = node_lni();
    assert!(missing_interfaces(&fx.config, Some(&lni)).is_empty());
    assert!(missing_interfaces(&fx.config, None).is_empty());

    fx.config.restart.bridge_dev = "br9".to_string();
    assert_eq!(
        missing_interfaces(&fx.config, Some(&lni)),
        vec!["br9".to_string()]
    );
}

#[tokio::test]
async fn test_scrub_sections() {
    let fx = Fixture::new();
    let store = artifact_store(&fx.config, NetworkMode::Edge);
    store.prepare().await.unwrap();
    assert!(store.dir().starts_with(fx.dir.path()));

    let v1 = gni("v1", "EDGE", false, &[]);
    let view = fx.view(PeerRole::NodeController, &v1, None, None);
    assert_eq!(scrub_sections(&store, view).await, ScrubResult::ALL);

    // Nothing rendered yet, every section is requested
    let view = fx.view(PeerRole::NodeController, &v1, Some(&v1), None);
    assert_eq!(scrub_sections(&store, view).await, ScrubResult::ALL);

    for name in ALL_ARTIFACTS {
        store.write(name, &name).await.unwrap();
    }
    assert_eq!(scrub_sections(&store, view).await, ScrubResult::NONE);

    let mut v2 = v1.clone();
    v2.version = "v2".to_string();
    v2.security_groups[0].rules.push("-P udp -p 53-53".to_string());
    let view = fx.view(PeerRole::NodeController, &v2, Some(&v1), None);
    assert_eq!(
        scrub_sections(&store, view).await,
        ScrubResult::SECURITY_GROUPS
    );

    store.remove(NETWORK_ARTIFACT).await.unwrap();
    assert_eq!(
        scrub_sections(&store, view).await,
        ScrubResult::NETWORK | ScrubResult::SECURITY_GROUPS
    );
}

#[tokio::test]
async fn test_remove_artifacts_counts_existing_only() {
    let fx = Fixture::new();
    let store = artifact_store(&fx.config, NetworkMode::Edge);
    store.prepare().await.unwrap();
    store.write(NETWORK_ARTIFACT, &1u32).await.unwrap();

    assert_eq!(remove_artifacts(&store, &ALL_ARTIFACTS).await.unwrap(), 1);
    assert!(store.list().await.unwrap().is_empty());
}
