// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;
use std::path::Path;

use crate::{
    resolve_vm_gateway, ConfigValues, ErrorKind, EucanetdConfig,
    EucanetdLogLevel, GniCluster, GniMido, GniSubnet, LocalIpv4Addr,
    NetworkMode, OnlineOptions, RouterIp,
};

fn cluster() -> GniCluster {
    GniCluster {
        name: "c1".to_string(),
        private_subnet: Some(GniSubnet {
            subnet: Ipv4Addr::new(172, 16, 0, 0),
            netmask: Ipv4Addr::new(255, 255, 0, 0),
            gateway: Ipv4Addr::new(172, 16, 0, 1),
        }),
        ..Default::default()
    }
}

#[test]
fn test_bootstrap_defaults() {
    let config = EucanetdConfig::bootstrap_from(None, None).unwrap();
    assert_eq!(config.paths.root, Path::new("/"));
    assert_eq!(config.euca_user, "eucalyptus");
    assert_eq!(config.cmd_prefix, "/usr/lib/eucalyptus/euca_rootwrap");
    assert_eq!(
        config.paths.config_file(),
        Path::new("/etc/eucalyptus/eucalyptus.conf")
    );
    assert_eq!(
        config.paths.pid_file(),
        Path::new("/var/run/eucalyptus/eucanetd.pid")
    );
    assert_eq!(
        config.paths.version_file(),
        Path::new("/var/run/eucalyptus/global_network_info.version")
    );
    assert_eq!(
        config.paths.log_file(),
        Path::new("/var/log/eucalyptus/eucanetd.log")
    );
    assert_eq!(config.polling_frequency(), 5);
    assert_eq!(config.network_mode, NetworkMode::Invalid);
}

#[test]
fn test_bootstrap_from_environment_values() {
    let config = EucanetdConfig::bootstrap_from(
        Some("/opt/euca".to_string()),
        Some("euca".to_string()),
    )
    .unwrap();
    assert_eq!(config.euca_user, "euca");
    assert_eq!(config.cmd_prefix, "/opt/euca/usr/lib/eucalyptus/euca_rootwrap");
    assert_eq!(
        config.paths.gni_candidates()[1].0,
        Path::new("/opt/euca/var/run/eucalyptus/cc_global_network_info.xml")
    );
    assert_eq!(
        config.paths.gni_candidates()[2].1,
        Path::new(
            "/opt/euca/var/lib/eucalyptus/eucanetd_global_network_info.xml"
        )
    );
}

#[test]
fn test_bootstrap_relative_root() {
    let result = EucanetdConfig::bootstrap_from(Some("opt".to_string()), None);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_parse_config_file_format() {
    let values = ConfigValues::parse(
        "# comment\n\nVNET_MODE=\"EDGE\"\nexport VNET_BRIDGE='br0'\n\
         POLLING_FREQUENCY=7\nnot a line\nUNKNOWN=\"x\"\n",
    );
    assert_eq!(values.get("VNET_MODE"), "EDGE");
    assert_eq!(values.get("VNET_BRIDGE"), "br0");
    assert_eq!(values.get("POLLING_FREQUENCY"), "7");
    assert_eq!(values.get("UNKNOWN"), "x");
    assert_eq!(values.get("VNET_DHCPDAEMON"), "/usr/sbin/dhcpd");
    assert_eq!(values.get("NO_SUCH_KEY"), "");
}

#[test]
fn test_online_defaults_from_empty_file() {
    let opts = OnlineOptions::from_values(&ConfigValues::default());
    assert_eq!(opts.polling_frequency, 1);
    assert!(opts.nc_router);
    assert_eq!(opts.nc_router_ip, RouterIp::None);
    assert_eq!(opts.metadata_ip, None);
    assert_eq!(opts.log.level, EucanetdLogLevel::Info);
    assert_eq!(opts.log.roll_number, 10);
    assert_eq!(opts.log.max_size, 104857600);
}

#[test]
fn test_online_invalid_polling_frequency() {
    let opts = OnlineOptions::from_values(&ConfigValues::parse(
        "POLLING_FREQUENCY=\"0\"",
    ));
    assert_eq!(opts.polling_frequency, 1);
    let opts = OnlineOptions::from_values(&ConfigValues::parse(
        "POLLING_FREQUENCY=\"abc\"",
    ));
    assert_eq!(opts.polling_frequency, 1);
}

#[test]
fn test_online_loopback_metadata_ip_ignored() {
    let opts = OnlineOptions::from_values(&ConfigValues::parse(
        "METADATA_IP=\"127.0.0.1\"",
    ));
    assert_eq!(opts.metadata_ip, None);
    let opts = OnlineOptions::from_values(&ConfigValues::parse(
        "METADATA_IP=\"10.1.1.1\"",
    ));
    assert_eq!(opts.metadata_ip, Some(Ipv4Addr::new(10, 1, 1, 1)));
}

#[test]
fn test_online_router_ip() {
    let parse = |s: &str| {
        OnlineOptions::from_values(&ConfigValues::parse(s)).nc_router_ip
    };
    assert_eq!(parse("NC_ROUTER_IP=\"AUTO\""), RouterIp::Auto);
    assert_eq!(parse("NC_ROUTER_IP=\"127.0.0.1\""), RouterIp::Auto);
    assert_eq!(parse("NC_ROUTER_IP=\"not-an-ip\""), RouterIp::Auto);
    assert_eq!(
        parse("NC_ROUTER_IP=\"172.16.0.2\""),
        RouterIp::Ip(Ipv4Addr::new(172, 16, 0, 2))
    );
    assert_eq!(
        parse("NC_ROUTER=\"N\"\nNC_ROUTER_IP=\"172.16.0.2\""),
        RouterIp::None
    );
}

#[test]
fn test_online_log_options() {
    let opts = OnlineOptions::from_values(&ConfigValues::parse(
        "LOGLEVEL=\"EXTREME\"\nLOGROLLNUMBER=\"3\"\nLOGMAXSIZE=\"1024\"\n\
         LOGPREFIX=\"euca \"",
    ));
    assert_eq!(opts.log.level, EucanetdLogLevel::Trace);
    assert_eq!(opts.log.roll_number, 3);
    assert_eq!(opts.log.max_size, 1024);
    assert_eq!(opts.log.prefix, "euca ");
}

#[test]
fn test_restart_keys_only_on_demand() {
    let mut config = EucanetdConfig::bootstrap_from(None, None).unwrap();
    let values = ConfigValues::parse(
        "VNET_BRIDGE=\"br0\"\nVNET_PUBINTERFACE=\"em1\"\n\
         POLLING_FREQUENCY=\"9\"\nVNET_LOCALIP=\"10.0.0.2\"",
    );
    config.apply_values(&values, false);
    assert_eq!(config.restart.bridge_dev, "");
    assert_eq!(config.polling_frequency(), 9);

    config.apply_values(&values, true);
    assert_eq!(config.restart.bridge_dev, "br0");
    assert_eq!(config.restart.pub_interface, "em1");
    assert_eq!(config.restart.dhcp_user, "root");
    assert_eq!(config.restart.local_ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
    assert!(config.restart.disable_tunneling);
}

#[test]
fn test_mido_options_fall_back_to_desired_state() {
    let mut config = EucanetdConfig::bootstrap_from(None, None).unwrap();
    config.apply_values(
        &ConfigValues::parse("MIDOEUCANETDHOST=\"clc.local\""),
        true,
    );
    config.fill_mido_from_gni(&GniMido {
        eucanetd_host: "other".to_string(),
        gateway_hosts: vec!["gw1".to_string(), "gw2".to_string()],
        public_network_cidr: "192.0.2.0/24".to_string(),
        public_gateway_ip: "192.0.2.1".to_string(),
    });
    assert_eq!(config.restart.mido.eucanetd_host, "clc.local");
    assert_eq!(config.restart.mido.gateway_hosts, "gw1 gw2");
    assert_eq!(config.restart.mido.public_network, "192.0.2.0/24");
    assert_eq!(config.restart.mido.public_gateway_ip, "192.0.2.1");
}

#[test]
fn test_vm_gateway_defaults_to_subnet_gateway() {
    let opts = OnlineOptions::default();
    assert_eq!(
        resolve_vm_gateway(&opts, &cluster(), "br0", &[]).unwrap(),
        Ipv4Addr::new(172, 16, 0, 1)
    );
    let opts = OnlineOptions {
        nc_router: false,
        nc_router_ip: RouterIp::Auto,
        ..Default::default()
    };
    assert_eq!(
        resolve_vm_gateway(&opts, &cluster(), "br0", &[]).unwrap(),
        Ipv4Addr::new(172, 16, 0, 1)
    );
}

#[test]
fn test_vm_gateway_explicit_ip() {
    let opts = OnlineOptions {
        nc_router_ip: RouterIp::Ip(Ipv4Addr::new(172, 16, 0, 2)),
        ..Default::default()
    };
    assert_eq!(
        resolve_vm_gateway(&opts, &cluster(), "br0", &[]).unwrap(),
        Ipv4Addr::new(172, 16, 0, 2)
    );
}

#[test]
fn test_vm_gateway_auto_detects_bridge_address() {
    let opts = OnlineOptions {
        nc_router_ip: RouterIp::Auto,
        ..Default::default()
    };
    let addrs = [
        LocalIpv4Addr::new(Ipv4Addr::new(172, 16, 0, 5), 24),
        LocalIpv4Addr::new(Ipv4Addr::new(10, 0, 0, 5), 16),
        LocalIpv4Addr::new(Ipv4Addr::new(172, 16, 3, 9), 16),
    ];
    assert_eq!(
        resolve_vm_gateway(&opts, &cluster(), "br0", &addrs).unwrap(),
        Ipv4Addr::new(172, 16, 3, 9)
    );
    let result = resolve_vm_gateway(&opts, &cluster(), "br0", &addrs[..2]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
}

#[test]
fn test_vm_gateway_without_private_subnet() {
    let cluster = GniCluster {
        name: "c1".to_string(),
        ..Default::default()
    };
    let result =
        resolve_vm_gateway(&OnlineOptions::default(), &cluster, "br0", &[]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
}
