// SPDX-License-Identifier: Apache-2.0

use eucanetd::{
    ArtifactStore, CycleView, DriverCapabilities, ErrorKind, EucanetdConfig,
    EucanetdError, FlushMode, GlobalNetworkInfo, NetworkDriver, NetworkMode,
    PeerRole, ScrubResult,
};

use crate::common::{
    addressing_document, artifact_store, missing_interfaces,
    network_document, not_initialized, remove_artifacts, scrub_sections,
    security_group_document, VlanEntry, ADDRESSING_ARTIFACT, ALL_ARTIFACTS,
    DYNAMIC_ARTIFACTS, NETWORK_ARTIFACT, SECURITY_GROUPS_ARTIFACT,
};

/// First VLAN tag handed out to security groups
pub const MANAGED_VLAN_BASE: u16 = 10;
pub const MANAGED_VLAN_MAX: u16 = 4095;

/// MANAGED and MANAGED-NOVLAN modes: each security group is its own
/// network, optionally isolated on a dedicated VLAN.
#[derive(Debug)]
pub struct ManagedDriver {
    vlan: bool,
    store: Option<ArtifactStore>,
}

impl ManagedDriver {
    pub fn new(vlan: bool) -> Self {
        Self { vlan, store: None }
    }

    pub fn mode(&self) -> NetworkMode {
        if self.vlan {
            NetworkMode::Managed
        } else {
            NetworkMode::ManagedNoVlan
        }
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    fn initialized_store(&self) -> Result<&ArtifactStore, EucanetdError> {
        self.store.as_ref().ok_or_else(|| not_initialized(self.name()))
    }

    /// Security groups are tagged in desired state order.
    pub fn vlans(
        &self,
        config: &EucanetdConfig,
        gni: &GlobalNetworkInfo,
    ) -> Result<Vec<VlanEntry>, EucanetdError> {
        if !self.vlan {
            return Ok(Vec::new());
        }
        let mut ret = Vec::new();
        for (index, group) in gni.security_groups.iter().enumerate() {
            let tag = u16::try_from(index)
                .ok()
                .and_then(|i| i.checked_add(MANAGED_VLAN_BASE))
                .filter(|t| *t <= MANAGED_VLAN_MAX)
                .ok_or_else(|| {
                    EucanetdError::new(
                        ErrorKind::ApplyFailure,
                        format!(
                            "Out of VLAN tags for security group {}",
                            group.name
                        ),
                    )
                })?;
            ret.push(VlanEntry {
                security_group: group.name.clone(),
                tag,
                device: format!("{}.{tag}", config.restart.priv_interface),
            });
        }
        Ok(ret)
    }
}

impl NetworkDriver for ManagedDriver {
    fn name(&self) -> &str {
        self.mode().as_str()
    }

    fn capabilities(&self) -> DriverCapabilities {
        let mut caps = DriverCapabilities::all();
        caps.upgrade = false;
        caps.handle_signal = false;
        caps.maintain = false;
        caps
    }

    async fn init(
        &mut self,
        config: &EucanetdConfig,
        peer: PeerRole,
    ) -> Result<(), EucanetdError> {
        if self.vlan && config.restart.priv_interface.is_empty() {
            return Err(EucanetdError::new(
                ErrorKind::InvalidArgument,
                "MANAGED mode requires VNET_PRIVINTERFACE".to_string(),
            ));
        }
        let store = artifact_store(config, self.mode());
        store.prepare().await?;
        log::info!(
            "{} driver rendering into {} for {peer}",
            self.name(),
            store.dir().display()
        );
        self.store = Some(store);
        Ok(())
    }

    async fn flush(
        &mut self,
        _view: CycleView<'_>,
        mode: FlushMode,
        _arg: Option<&str>,
    ) -> Result<(), EucanetdError> {
        let names: &[&str] = match mode {
            FlushMode::All => &ALL_ARTIFACTS,
            FlushMode::Dynamic => &DYNAMIC_ARTIFACTS,
            _ => {
                return Err(EucanetdError::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "Flush mode {mode} is not supported in {} mode",
                        self.name()
                    ),
                ));
            }
        };
        remove_artifacts(self.initialized_store()?, names).await?;
        Ok(())
    }

    async fn scrub(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<ScrubResult, EucanetdError> {
        let missing = missing_interfaces(view.config, view.lni);
        if !missing.is_empty() {
            log::error!(
                "{}: configured interfaces not found: {}",
                self.name(),
                missing.join(", ")
            );
            return Ok(ScrubResult::ERROR);
        }
        let mut ret = scrub_sections(self.initialized_store()?, view).await;
        // VLAN tags follow the group list
        if self.vlan
            && view.last_applied.map_or(false, |l| {
                l.security_groups.len() != view.gni.security_groups.len()
            })
        {
            ret.insert(ScrubResult::NETWORK);
        }
        Ok(ret)
    }

    async fn implement_network(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        let vlans = self.vlans(view.config, view.gni)?;
        self.initialized_store()?
            .write(NETWORK_ARTIFACT, &network_document(view, vlans))
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

    async fn cleanup(
        &mut self,
        _config: &EucanetdConfig,
        _gni: Option<&GlobalNetworkInfo>,
        flush_mode: FlushMode,
    ) -> Result<(), EucanetdError> {
        if flush_mode == FlushMode::All {
            if let Some(store) = self.store.as_ref() {
                remove_artifacts(store, &ALL_ARTIFACTS).await?;
            }
        }
        Ok(())
    }
}
