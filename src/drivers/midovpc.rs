// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use eucanetd::{
    ArtifactStore, CycleView, DriverCapabilities, DriverSignal, ErrorKind,
    EucanetdConfig, EucanetdError, FlushMode, GlobalNetworkInfo, NetworkDriver,
    NetworkMode, PeerRole, ScrubResult,
};
use serde::{Deserialize, Serialize};

use crate::common::{
    addressing_document, artifact_store, network_document, not_initialized,
    remove_artifacts, scrub_sections, security_group_document,
    ADDRESSING_ARTIFACT, NETWORK_ARTIFACT, SECURITY_GROUPS_ARTIFACT,
};

pub(crate) const VPCS_ARTIFACT: &str = "vpcs";
/// Core overlay objects, survive `-C`
pub(crate) const GATEWAYS_ARTIFACT: &str = "gateways";
pub(crate) const UPGRADE_MARKER: &str = "upgrade";

const MIDO_DYNAMIC_ARTIFACTS: [&str; 3] =
    [VPCS_ARTIFACT, SECURITY_GROUPS_ARTIFACT, ADDRESSING_ARTIFACT];
const MIDO_ALL_ARTIFACTS: [&str; 6] = [
    NETWORK_ARTIFACT,
    VPCS_ARTIFACT,
    SECURITY_GROUPS_ARTIFACT,
    ADDRESSING_ARTIFACT,
    GATEWAYS_ARTIFACT,
    UPGRADE_MARKER,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcObject {
    pub name: String,
    pub owner_id: String,
    pub cidr: String,
    pub subnets: Vec<String>,
    pub instances: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcDocument {
    pub version: String,
    pub vpcs: Vec<VpcObject>,
}

impl VpcDocument {
    fn from_gni(gni: &GlobalNetworkInfo) -> Self {
        Self {
            version: gni.version.clone(),
            vpcs: gni
                .vpcs
                .iter()
                .map(|vpc| VpcObject {
                    name: vpc.name.clone(),
                    owner_id: vpc.owner_id.clone(),
                    cidr: vpc.cidr.clone(),
                    subnets: vpc.subnets.iter().map(|s| s.name.clone()).collect(),
                    instances: gni
                        .instances
                        .iter()
                        .filter(|i| i.vpc == vpc.name)
                        .map(|i| i.name.clone())
                        .collect(),
                })
                .collect(),
        }
    }

    /// Names showing up more than once, in first seen order
    pub fn duplicates(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ret = Vec::new();
        for vpc in self.vpcs.iter() {
            if !seen.insert(vpc.name.as_str()) && !ret.contains(&vpc.name) {
                ret.push(vpc.name.clone());
            }
        }
        ret
    }

    /// Objects no longer backed by a VPC of `gni`
    pub fn unconnected(&self, gni: &GlobalNetworkInfo) -> Vec<String> {
        self.vpcs
            .iter()
            .filter(|o| gni.vpcs.iter().all(|v| v.name != o.name))
            .map(|o| o.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayDocument {
    pub eucanetd_host: String,
    pub gateway_hosts: Vec<String>,
    pub public_network: String,
    pub public_gateway_ip: String,
}

impl GatewayDocument {
    fn from_config(config: &EucanetdConfig) -> Self {
        let mido = &config.restart.mido;
        Self {
            eucanetd_host: mido.eucanetd_host.clone(),
            gateway_hosts: configured_gateways(config),
            public_network: mido.public_network.clone(),
            public_gateway_ip: mido.public_gateway_ip.clone(),
        }
    }
}

fn configured_gateways(config: &EucanetdConfig) -> Vec<String> {
    config
        .restart
        .mido
        .gateway_hosts
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// VPCMIDO mode: desired state is rendered as overlay objects owned by an
/// external controller.
#[derive(Debug, Default)]
pub struct MidoVpcDriver {
    store: Option<ArtifactStore>,
    force_full: bool,
}

impl MidoVpcDriver {
    pub const NAME: &'static str = "VPCMIDO";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    /// Whether the next scrub requests a full apply
    pub fn force_full(&self) -> bool {
        self.force_full
    }

    fn initialized_store(&self) -> Result<&ArtifactStore, EucanetdError> {
        self.store.as_ref().ok_or_else(|| not_initialized(Self::NAME))
    }

    async fn rendered_vpcs(&self) -> Result<VpcDocument, EucanetdError> {
        Ok(self
            .initialized_store()?
            .read::<VpcDocument>(VPCS_ARTIFACT)
            .await?
            .unwrap_or_default())
    }

    async fn remove_vpcs(
        &self,
        doc: VpcDocument,
        names: &[String],
    ) -> Result<(), EucanetdError> {
        let mut seen = HashSet::new();
        let vpcs: Vec<VpcObject> = doc
            .vpcs
            .into_iter()
            .filter(|o| !names.contains(&o.name) || seen.insert(o.name.clone()))
            .collect();
        self.initialized_store()?
            .write(
                VPCS_ARTIFACT,
                &VpcDocument {
                    version: doc.version,
                    vpcs,
                },
            )
            .await
    }

    async fn write_gateways(
        &self,
        config: &EucanetdConfig,
    ) -> Result<(), EucanetdError> {
        self.initialized_store()?
            .write(GATEWAYS_ARTIFACT, &GatewayDocument::from_config(config))
            .await
    }

    async fn self_test(
        &self,
        view: CycleView<'_>,
        name: &str,
    ) -> Result<(), EucanetdError> {
        let store = self.initialized_store()?;
        let artifact = format!("test-{name}");
        let expected = VpcDocument::from_gni(view.gni);
        store.write(&artifact, &expected).await?;
        let got = store.read::<VpcDocument>(&artifact).await?;
        store.remove(&artifact).await?;
        if got.as_ref() == Some(&expected) {
            log::info!("VPCMIDO self test {name} passed");
            Ok(())
        } else {
            Err(EucanetdError::new(
                ErrorKind::ApplyFailure,
                format!("VPCMIDO self test {name} failed"),
            ))
        }
    }
}

fn require_arg<'a>(
    mode: FlushMode,
    arg: Option<&'a str>,
) -> Result<&'a str, EucanetdError> {
    arg.filter(|a| !a.is_empty()).ok_or_else(|| {
        EucanetdError::new(
            ErrorKind::InvalidArgument,
            format!("Flush mode {mode} requires an object ID"),
        )
    })
}

impl NetworkDriver for MidoVpcDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::all()
    }

    async fn init(
        &mut self,
        config: &EucanetdConfig,
        peer: PeerRole,
    ) -> Result<(), EucanetdError> {
        if config.restart.mido.eucanetd_host.is_empty() {
            log::warn!("VPCMIDO: MIDO_EUCANETD_HOST is not set");
        }
        let store = artifact_store(config, NetworkMode::VpcMido);
        store.prepare().await?;
        log::info!(
            "VPCMIDO driver rendering into {} for {peer}",
            store.dir().display()
        );
        self.store = Some(store);
        Ok(())
    }

    /// Records once which version the overlay layout was migrated at.
    async fn upgrade(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        let store = self.initialized_store()?;
        if store.exists(UPGRADE_MARKER).await {
            return Ok(());
        }
        store.write(UPGRADE_MARKER, &view.gni.version).await?;
        log::info!("VPCMIDO overlay layout upgraded at {}", view.gni.version);
        Ok(())
    }

    async fn flush(
        &mut self,
        view: CycleView<'_>,
        mode: FlushMode,
        arg: Option<&str>,
    ) -> Result<(), EucanetdError> {
        let store = self.initialized_store()?;
        match mode {
            FlushMode::MidoDynamic => {
                remove_artifacts(store, &MIDO_DYNAMIC_ARTIFACTS).await?;
            }
            FlushMode::MidoAll => {
                remove_artifacts(store, &MIDO_ALL_ARTIFACTS).await?;
            }
            FlushMode::MidoCheckDups | FlushMode::MidoDups => {
                let doc = self.rendered_vpcs().await?;
                let dups = doc.duplicates();
                if dups.is_empty() {
                    log::info!("No duplicate VPC objects");
                } else {
                    log::warn!("Duplicate VPC objects: {}", dups.join(", "));
                    if mode == FlushMode::MidoDups {
                        self.remove_vpcs(doc, &dups).await?;
                    }
                }
            }
            FlushMode::MidoCheckUnconnected | FlushMode::MidoUnconnected => {
                let doc = self.rendered_vpcs().await?;
                let orphans = doc.unconnected(view.gni);
                if orphans.is_empty() {
                    log::info!("No unconnected VPC objects");
                } else {
                    log::warn!(
                        "Unconnected VPC objects: {}",
                        orphans.join(", ")
                    );
                    if mode == FlushMode::MidoUnconnected {
                        let mut doc = doc;
                        doc.vpcs.retain(|o| !orphans.contains(&o.name));
                        store.write(VPCS_ARTIFACT, &doc).await?;
                    }
                }
            }
            FlushMode::MidoListVpc => {
                for vpc in self.rendered_vpcs().await?.vpcs {
                    log::info!(
                        "{} {} subnets={} instances={}",
                        vpc.name,
                        vpc.cidr,
                        vpc.subnets.len(),
                        vpc.instances.len()
                    );
                }
            }
            FlushMode::MidoCheckVpc | FlushMode::MidoVpc => {
                let id = require_arg(mode, arg)?;
                let mut doc = self.rendered_vpcs().await?;
                if doc.vpcs.iter().all(|o| o.name != id) {
                    return Err(EucanetdError::new(
                        ErrorKind::ApplyFailure,
                        format!("VPC object {id} not found"),
                    ));
                }
                log::info!("VPC object {id} found");
                if mode == FlushMode::MidoVpc {
                    doc.vpcs.retain(|o| o.name != id);
                    store.write(VPCS_ARTIFACT, &doc).await?;
                    log::info!("VPC object {id} removed");
                }
            }
            FlushMode::MidoTest => {
                let name = require_arg(mode, arg)?;
                self.self_test(view, name).await?;
            }
            FlushMode::None | FlushMode::All | FlushMode::Dynamic => {
                return Err(EucanetdError::new(
                    ErrorKind::InvalidArgument,
                    format!("Flush mode {mode} is not supported in VPCMIDO mode"),
                ));
            }
        }
        Ok(())
    }

    /// Until every configured gateway shows up in the desired state the
    /// overlay is only partially converged.
    async fn scrub(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<ScrubResult, EucanetdError> {
        if self.force_full {
            self.force_full = false;
            log::info!("VPCMIDO: full apply requested");
            return Ok(ScrubResult::ALL);
        }
        let store = self.initialized_store()?;
        let mut ret = scrub_sections(store, view).await;
        if !store.exists(VPCS_ARTIFACT).await
            || !store.exists(GATEWAYS_ARTIFACT).await
        {
            ret.insert(ScrubResult::NETWORK);
        }
        let missing: Vec<String> = configured_gateways(view.config)
            .into_iter()
            .filter(|g| !view.gni.mido.gateway_hosts.contains(g))
            .collect();
        if !missing.is_empty() {
            log::warn!(
                "VPCMIDO: gateways not in desired state yet: {}",
                missing.join(", ")
            );
            if ret == ScrubResult::NONE {
                return Ok(ScrubResult::OVERLAY_PARTIAL);
            }
        }
        Ok(ret)
    }

    async fn implement_network(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        self.write_gateways(view.config).await?;
        let store = self.initialized_store()?;
        store
            .write(VPCS_ARTIFACT, &VpcDocument::from_gni(view.gni))
            .await?;
        store
            .write(NETWORK_ARTIFACT, &network_document(view, Vec::new()))
            .await
    }

    async fn implement_security_groups(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        self.initialized_store()?
            .write(SECURITY_GROUPS_ARTIFACT, &security_group_document(view))
            .await
    }

    async fn implement_addressing(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        self.initialized_store()?
            .write(ADDRESSING_ARTIFACT, &addressing_document(view))
            .await
    }

    /// Core objects are restored when removed outside of an apply.
    async fn maintain(
        &mut self,
        config: &EucanetdConfig,
        _gni: &GlobalNetworkInfo,
    ) -> Result<(), EucanetdError> {
        if !self.initialized_store()?.exists(GATEWAYS_ARTIFACT).await {
            log::info!("VPCMIDO: restoring gateway objects");
            self.write_gateways(config).await?;
        }
        Ok(())
    }

    async fn handle_signal(
        &mut self,
        _config: &EucanetdConfig,
        signal: DriverSignal,
    ) -> Result<(), EucanetdError> {
        match signal {
            DriverSignal::Usr1 => {
                let doc = self.rendered_vpcs().await?;
                log::info!(
                    "VPCMIDO model: {}",
                    serde_json::to_string(&doc)?
                );
            }
            DriverSignal::Usr2 => {
                log::info!("VPCMIDO: next cycle runs a full apply");
                self.force_full = true;
            }
        }
        Ok(())
    }

    async fn cleanup(
        &mut self,
        _config: &EucanetdConfig,
        gni: Option<&GlobalNetworkInfo>,
        _flush_mode: FlushMode,
    ) -> Result<(), EucanetdError> {
        self.force_full = false;
        if let Some(gni) = gni {
            log::debug!(
                "VPCMIDO driver released, {} VPC(s) at {}",
                gni.vpcs.len(),
                gni.version
            );
        }
        Ok(())
    }
}
