// SPDX-License-Identifier: Apache-2.0

use eucanetd::{
    ArtifactStore, CycleView, DriverCapabilities, ErrorKind, EucanetdConfig,
    EucanetdError, FlushMode, GlobalNetworkInfo, NetworkDriver, NetworkMode,
    PeerRole, ScrubResult,
};

use crate::common::{
    addressing_document, artifact_store, missing_interfaces,
    network_document, not_initialized, remove_artifacts, scrub_sections,
    security_group_document, ADDRESSING_ARTIFACT, ALL_ARTIFACTS,
    DYNAMIC_ARTIFACTS, NETWORK_ARTIFACT, SECURITY_GROUPS_ARTIFACT,
};

/// EDGE mode: every node routes and filters traffic of its own instances.
#[derive(Debug, Default)]
pub struct EdgeDriver {
    store: Option<ArtifactStore>,
    peer: PeerRole,
}

impl EdgeDriver {
    pub const NAME: &'static str = "EDGE";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    fn initialized_store(&self) -> Result<&ArtifactStore, EucanetdError> {
        self.store.as_ref().ok_or_else(|| not_initialized(Self::NAME))
    }
}

impl NetworkDriver for EdgeDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> DriverCapabilities {
        let mut caps = DriverCapabilities::all();
        caps.upgrade = false;
        caps.handle_signal = false;
        caps
    }

    async fn init(
        &mut self,
        config: &EucanetdConfig,
        peer: PeerRole,
    ) -> Result<(), EucanetdError> {
        let store = artifact_store(config, NetworkMode::Edge);
        store.prepare().await?;
        log::info!(
            "EDGE driver rendering into {} for {peer}",
            store.dir().display()
        );
        self.store = Some(store);
        self.peer = peer;
        Ok(())
    }

    async fn flush(
        &mut self,
        _view: CycleView<'_>,
        mode: FlushMode,
        _arg: Option<&str>,
    ) -> Result<(), EucanetdError> {
        let store = self.initialized_store()?;
        match mode {
            FlushMode::All => {
                remove_artifacts(store, &ALL_ARTIFACTS).await?;
            }
            FlushMode::Dynamic => {
                remove_artifacts(store, &DYNAMIC_ARTIFACTS).await?;
            }
            _ => {
                return Err(EucanetdError::new(
                    ErrorKind::InvalidArgument,
                    format!("Flush mode {mode} is not supported in EDGE mode"),
                ));
            }
        }
        Ok(())
    }

    async fn scrub(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<ScrubResult, EucanetdError> {
        let missing = missing_interfaces(view.config, view.lni);
        if !missing.is_empty() {
            log::error!(
                "EDGE: configured interfaces not found: {}",
                missing.join(", ")
            );
            return Ok(ScrubResult::ERROR);
        }
        let store = self.initialized_store()?;
        Ok(scrub_sections(store, view).await)
    }

    async fn implement_network(
        &mut self,
        view: CycleView<'_>,
    ) -> Result<(), EucanetdError> {
        if view.peer == PeerRole::NodeController && view.config.vm_gateway_ip.is_none()
        {
            return Err(EucanetdError::new(
                ErrorKind::ApplyFailure,
                "EDGE: no default gateway resolved for instances".to_string(),
            ));
        }
        self.initialized_store()?
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

    /// Artifacts removed behind our back are reported so an operator can
    /// send SIGHUP.
    async fn maintain(
        &mut self,
        _config: &EucanetdConfig,
        _gni: &GlobalNetworkInfo,
    ) -> Result<(), EucanetdError> {
        let store = self.initialized_store()?;
        let mut missing = Vec::new();
        for name in ALL_ARTIFACTS {
            if !store.exists(name).await {
                missing.push(name);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EucanetdError::new(
                ErrorKind::ApplyFailure,
                format!("EDGE artifacts missing: {}", missing.join(", ")),
            ))
        }
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
        log::debug!("EDGE driver cleaned up, peer was {}", self.peer);
        Ok(())
    }
}
