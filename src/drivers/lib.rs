// SPDX-License-Identifier: Apache-2.0

mod common;
mod edge;
mod managed;
mod midovpc;

#[cfg(test)]
mod unit_tests;

use eucanetd::{
    CycleView, DriverCapabilities, DriverSignal, ErrorKind, EucanetdConfig,
    EucanetdError, FlushMode, GlobalNetworkInfo, NetworkDriver, NetworkMode,
    PeerRole, ScrubResult,
};

pub use self::common::{
    AddressEntry, AddressingDocument, GroupEntry, NetworkDocument,
    SecurityGroupDocument, SubnetEntry, VlanEntry,
};
pub use self::edge::EdgeDriver;
pub use self::managed::{ManagedDriver, MANAGED_VLAN_BASE, MANAGED_VLAN_MAX};
pub use self::midovpc::{
    GatewayDocument, MidoVpcDriver, VpcDocument, VpcObject,
};

/// Every back-end this build ships, selected by network mode.
#[derive(Debug)]
#[non_exhaustive]
pub enum EucanetdDriver {
    Edge(EdgeDriver),
    Managed(ManagedDriver),
    MidoVpc(MidoVpcDriver),
}

/// Pick the driver implementing `mode`.
pub fn select_driver(
    mode: NetworkMode,
    _config: &EucanetdConfig,
) -> Result<EucanetdDriver, EucanetdError> {
    let driver = match mode {
        NetworkMode::Edge => EucanetdDriver::Edge(EdgeDriver::new()),
        NetworkMode::Managed => {
            EucanetdDriver::Managed(ManagedDriver::new(true))
        }
        NetworkMode::ManagedNoVlan => {
            EucanetdDriver::Managed(ManagedDriver::new(false))
        }
        NetworkMode::VpcMido => EucanetdDriver::MidoVpc(MidoVpcDriver::new()),
        NetworkMode::Invalid => {
            return Err(EucanetdError::new(
                ErrorKind::InvalidNetworkMode,
                format!("No network driver for mode {mode}"),
            ));
        }
    };
    log::info!("Selected network driver {}", driver.name());
    Ok(driver)
}

impl NetworkDriver for EucanetdDriver {
    fn name(&self) -> &str {
        match self {
            Self::Edge(d) => d.name(),
            Self::Managed(d) => d.name(),
            Self::MidoVpc(d) => d.name(),
        }
    }

    fn capabilities(&self) -> DriverCapabilities {
        match self {
            Self::Edge(d) => d.capabilities(),
            Self::Managed(d) => d.capabilities(),
            Self::MidoVpc(d) => d.capabilities(),
        }
    }

    async fn init(
        &mut self,
        config: &EucanetdConfig,
        peer: PeerRole,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.init(config, peer).await,
            Self::Managed(d) => d.init(config, peer).await,
            Self::MidoVpc(d) => d.init(config, peer).await,
        }
    }

    async fn upgrade(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.upgrade(view).await,
            Self::Managed(d) => d.upgrade(view).await,
            Self::MidoVpc(d) => d.upgrade(view).await,
        }
    }

    async fn flush(
        &mut self,
        view: CycleView<'_>,
        mode: FlushMode,
        arg: Option<&str>,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.flush(view, mode, arg).await,
            Self::Managed(d) => d.flush(view, mode, arg).await,
            Self::MidoVpc(d) => d.flush(view, mode, arg).await,
        }
    }

    async fn scrub(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<ScrubResult, EucanetdError> {
        match self {
            Self::Edge(d) => d.scrub(view).await,
            Self::Managed(d) => d.scrub(view).await,
            Self::MidoVpc(d) => d.scrub(view).await,
        }
    }

    async fn implement_network(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.implement_network(view).await,
            Self::Managed(d) => d.implement_network(view).await,
            Self::MidoVpc(d) => d.implement_network(view).await,
        }
    }

    async fn implement_security_groups(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.implement_security_groups(view).await,
            Self::Managed(d) => d.implement_security_groups(view).await,
            Self::MidoVpc(d) => d.implement_security_groups(view).await,
        }
    }

    async fn implement_addressing(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.implement_addressing(view).await,
            Self::Managed(d) => d.implement_addressing(view).await,
            Self::MidoVpc(d) => d.implement_addressing(view).await,
        }
    }

    async fn maintain(
        &mut self,
        config: &EucanetdConfig,
        gni: &GlobalNetworkInfo,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.maintain(config, gni).await,
            Self::Managed(d) => d.maintain(config, gni).await,
            Self::MidoVpc(d) => d.maintain(config, gni).await,
        }
    }

    async fn handle_signal(
        &mut self,
        config: &EucanetdConfig,
        signal: DriverSignal,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.handle_signal(config, signal).await,
            Self::Managed(d) => d.handle_signal(config, signal).await,
            Self::MidoVpc(d) => d.handle_signal(config, signal).await,
        }
    }

    async fn cleanup(
        &mut self,
        config: &EucanetdConfig,
        gni: Option<&GlobalNetworkInfo>,
        flush_mode: FlushMode,
    ) -> Result<(), EucanetdError> {
        match self {
            Self::Edge(d) => d.cleanup(config, gni, flush_mode).await,
            Self::Managed(d) => d.cleanup(config, gni, flush_mode).await,
            Self::MidoVpc(d) => d.cleanup(config, gni, flush_mode).await,
        }
    }
}
