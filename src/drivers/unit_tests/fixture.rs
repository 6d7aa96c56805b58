// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;

use eucanetd::{
    gni_from_str, CycleView, EucanetdConfig, GlobalNetworkInfo,
    LocalInterface, LocalIpv4Addr, LocalNetworkInfo, PeerRole,
};

pub(crate) const NODE_IP: &str = "10.111.5.22";

/// Desired state with one cluster, two instances and two security groups.
/// `vpc` adds one VPC holding the first instance, `gateways` fills the
/// overlay gateway list.
pub(crate) fn gni(
    version: &str,
    mode: &str,
    vpc: bool,
    gateways: &[&str],
) -> GlobalNetworkInfo {
    let gateway_values: String = gateways
        .iter()
        .map(|g| format!("<value>{g}</value>"))
        .collect();
    let vpcs = if vpc {
        r#"<vpcs>
    <vpc name="vpc-00000001">
      <ownerId>000123456789</ownerId>
      <cidr>10.0.0.0/16</cidr>
      <subnets>
        <subnet name="subnet-00000001"><cidr>10.0.1.0/24</cidr></subnet>
      </subnets>
    </vpc>
  </vpcs>"#
    } else {
        ""
    };
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<network-data version="{version}" applied-version="{version}">
  <configuration>
    <property name="mode"><value>{mode}</value></property>
    <property name="enabledCLCIp"><value>10.111.5.1</value></property>
    <property name="instanceDNSDomain"><value>eucalyptus.internal</value></property>
    <property name="instanceDNSServers"><value>10.111.5.1</value></property>
    <property name="mido">
      <property name="eucanetdHost"><value>10.111.5.1</value></property>
      <property name="gatewayHosts">{gateway_values}</property>
    </property>
    <property name="clusters">
      <cluster name="c1">
        <property name="enabledCCIp"><value>10.111.5.10</value></property>
        <subnet name="172.16.0.0">
          <property name="subnet"><value>172.16.0.0</value></property>
          <property name="netmask"><value>255.255.0.0</value></property>
          <property name="gateway"><value>172.16.0.1</value></property>
        </subnet>
        <property name="nodes">
          <node name="{NODE_IP}">
            <instanceIds><value>i-00000001</value></instanceIds>
          </node>
          <node name="10.111.5.23">
            <instanceIds><value>i-00000002</value></instanceIds>
          </node>
        </property>
      </cluster>
    </property>
  </configuration>
  <instances>
    <instance name="i-00000001">
      <ownerId>000123456789</ownerId>
      <macAddress>d0:0d:00:00:00:01</macAddress>
      <publicIp>192.0.2.10</publicIp>
      <privateIp>172.16.0.20</privateIp>
      <vpc>vpc-00000001</vpc>
      <securityGroups><value>sg-00000001</value></securityGroups>
    </instance>
    <instance name="i-00000002">
      <ownerId>000123456789</ownerId>
      <macAddress>d0:0d:00:00:00:02</macAddress>
      <privateIp>172.16.0.21</privateIp>
      <securityGroups><value>sg-00000002</value></securityGroups>
    </instance>
  </instances>
  <securityGroups>
    <securityGroup name="sg-00000001">
      <ownerId>000123456789</ownerId>
      <rules><value>-P tcp -p 22-22 -s 0.0.0.0/0</value></rules>
    </securityGroup>
    <securityGroup name="sg-00000002">
      <ownerId>000123456789</ownerId>
      <rules><value>-P icmp -t -1:-1 -s 0.0.0.0/0</value></rules>
    </securityGroup>
  </securityGroups>
  {vpcs}
</network-data>
"#
    );
    gni_from_str(&xml).unwrap()
}

/// Interfaces of the node `NODE_IP`
pub(crate) fn node_lni() -> LocalNetworkInfo {
    let mut eth0 = LocalInterface::new("eth0");
    eth0.ipv4
        .push(LocalIpv4Addr::new(NODE_IP.parse().unwrap(), 24));
    let eth1 = LocalInterface::new("eth1");
    let mut br0 = LocalInterface::new("br0");
    br0.ipv4
        .push(LocalIpv4Addr::new(Ipv4Addr::new(172, 16, 0, 5), 16));
    LocalNetworkInfo::new(vec![eth0, eth1, br0])
}

pub(crate) struct Fixture {
    pub(crate) dir: tempfile::TempDir,
    pub(crate) config: EucanetdConfig,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EucanetdConfig::bootstrap_from(
            Some(dir.path().display().to_string()),
            None,
        )
        .unwrap();
        config.restart.bridge_dev = "br0".to_string();
        config.restart.pub_interface = "eth0".to_string();
        config.restart.priv_interface = "eth1".to_string();
        config.vm_gateway_ip = Some(Ipv4Addr::new(172, 16, 0, 1));
        Self { dir, config }
    }

    pub(crate) fn view<'a>(
        &'a self,
        peer: PeerRole,
        gni: &'a GlobalNetworkInfo,
        last_applied: Option<&'a GlobalNetworkInfo>,
        lni: Option<&'a LocalNetworkInfo>,
    ) -> CycleView<'a> {
        CycleView {
            config: &self.config,
            peer,
            gni,
            last_applied,
            lni,
        }
    }
}
