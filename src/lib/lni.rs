// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr};

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, EucanetdError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LocalIpv4Addr {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl LocalIpv4Addr {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
        }
    }

    pub fn netmask(&self) -> Ipv4Addr {
        if self.prefix_len == 0 {
            Ipv4Addr::UNSPECIFIED
        } else {
            Ipv4Addr::from(u32::MAX << (32 - u32::from(self.prefix_len.min(32))))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LocalInterface {
    pub name: String,
    pub mac_address: String,
    pub up: bool,
    pub controller: Option<String>,
    pub ipv4: Vec<LocalIpv4Addr>,
}

impl LocalInterface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Source of host observable networking state.
///
/// Implemented with netlink for the daemon and replaceable for tests.
pub trait HostNetworkProbe: Send + Sync {
    fn interfaces(
        &self,
    ) -> BoxFuture<'_, Result<Vec<LocalInterface>, EucanetdError>>;

    fn local_ips(&self) -> BoxFuture<'_, Result<Vec<IpAddr>, EucanetdError>> {
        async move {
            Ok(self
                .interfaces()
                .await?
                .iter()
                .flat_map(|i| i.ipv4.iter().map(|a| IpAddr::V4(a.address)))
                .collect())
        }
        .boxed()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NisporProbe;

impl HostNetworkProbe for NisporProbe {
    fn interfaces(
        &self,
    ) -> BoxFuture<'_, Result<Vec<LocalInterface>, EucanetdError>> {
        async move {
            let mut filter = nispor::NetStateFilter::default();
            // Routes are not used by any scrub, skip them as host with
            // full BGP table could take long time to dump.
            filter.route = None;
            let np_state =
                nispor::NetState::retrieve_with_filter_async(&filter).await?;
            let mut ifaces: Vec<LocalInterface> = np_state
                .ifaces
                .values()
                .map(np_iface_to_local)
                .collect();
            ifaces.sort_unstable_by(|a, b| a.name.cmp(&b.name));
            Ok(ifaces)
        }
        .boxed()
    }
}

fn np_iface_to_local(np_iface: &nispor::Iface) -> LocalInterface {
    let mut ipv4 = Vec::new();
    if let Some(np_ip) = np_iface.ipv4.as_ref() {
        for np_addr in &np_ip.addresses {
            match np_addr.address.parse::<Ipv4Addr>() {
                Ok(a) => ipv4.push(LocalIpv4Addr::new(a, np_addr.prefix_len)),
                Err(e) => {
                    log::warn!(
                        "BUG: nispor got invalid IP address {}, error {}",
                        np_addr.address,
                        e
                    );
                }
            }
        }
    }
    LocalInterface {
        name: np_iface.name.clone(),
        mac_address: np_iface.mac_address.clone(),
        up: np_iface.state == nispor::IfaceState::Up,
        controller: np_iface.controller.clone(),
        ipv4,
    }
}

/// Local Network Information: snapshot of the host networking valid only
/// within one apply cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LocalNetworkInfo {
    pub interfaces: Vec<LocalInterface>,
    pub populated: bool,
}

impl LocalNetworkInfo {
    pub fn new(interfaces: Vec<LocalInterface>) -> Self {
        Self {
            interfaces,
            populated: true,
        }
    }

    pub async fn populate(
        &mut self,
        probe: &dyn HostNetworkProbe,
    ) -> Result<(), EucanetdError> {
        self.reset();
        self.interfaces = probe.interfaces().await?;
        self.populated = true;
        Ok(())
    }

    /// Drop the cached view while keeping the allocation for next cycle.
    pub fn reset(&mut self) {
        self.interfaces.clear();
        self.populated = false;
    }

    pub fn iface(&self, name: &str) -> Option<&LocalInterface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn local_ips(&self) -> Vec<IpAddr> {
        self.interfaces
            .iter()
            .flat_map(|i| i.ipv4.iter().map(|a| IpAddr::V4(a.address)))
            .collect()
    }

    pub fn require_iface(
        &self,
        name: &str,
    ) -> Result<&LocalInterface, EucanetdError> {
        self.iface(name).ok_or_else(|| {
            EucanetdError::new(
                ErrorKind::TransientInput,
                format!("Interface {name} not found on this host"),
            )
        })
    }
}
