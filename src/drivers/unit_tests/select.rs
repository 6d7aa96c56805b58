// SPDX-License-Identifier: Apache-2.0

use eucanetd::{ErrorKind, FlushMode, NetworkDriver, NetworkMode, PeerRole};

use super::fixture::{gni, Fixture};
use crate::{select_driver, EucanetdDriver};

#[test]
fn test_select_driver_by_mode() {
    let fx = Fixture::new();
    for (mode, name) in [
        (NetworkMode::Edge, "EDGE"),
        (NetworkMode::Managed, "MANAGED"),
        (NetworkMode::ManagedNoVlan, "MANAGED-NOVLAN"),
        (NetworkMode::VpcMido, "VPCMIDO"),
    ] {
        let driver = select_driver(mode, &fx.config).unwrap();
        assert_eq!(driver.name(), name);
    }

    let e = select_driver(NetworkMode::Invalid, &fx.config).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::InvalidNetworkMode);
}

#[test]
fn test_capabilities_per_driver() {
    let fx = Fixture::new();
    let edge = select_driver(NetworkMode::Edge, &fx.config).unwrap();
    assert!(!edge.capabilities().upgrade);
    assert!(edge.capabilities().flush);
    assert!(edge.capabilities().maintain);

    let managed = select_driver(NetworkMode::Managed, &fx.config).unwrap();
    assert!(!managed.capabilities().maintain);

    let mido = select_driver(NetworkMode::VpcMido, &fx.config).unwrap();
    assert!(matches!(mido, EucanetdDriver::MidoVpc(_)));
    assert!(mido.capabilities().upgrade);
    assert!(mido.capabilities().handle_signal);
}

#[tokio::test]
async fn test_delegated_default_upgrade_is_no_support() {
    let fx = Fixture::new();
    let mut driver = select_driver(NetworkMode::Edge, &fx.config).unwrap();
    driver
        .init(&fx.config, PeerRole::NodeController)
        .await
        .unwrap();
    let gni = gni("v1", "EDGE", false, &[]);
    let view = fx.view(PeerRole::NodeController, &gni, None, None);

    let e = driver.upgrade(view).await.unwrap_err();
    assert_eq!(e.kind(), ErrorKind::NoSupport);
    driver
        .cleanup(&fx.config, None, FlushMode::All)
        .await
        .unwrap();
}
