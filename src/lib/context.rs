// SPDX-License-Identifier: Apache-2.0

use std::net::IpAddr;
use std::sync::Arc;

use crate::config::resolve_vm_gateway;
use crate::fetch::write_file;
use crate::{
    gni_from_file, AtomicFile, ConfigFileWatcher, ConfigValues, ErrorKind,
    EucanetdConfig, EucanetdError, EucanetdLogLevel, GlobalNetworkInfo,
    GniBuffers, HostNetworkProbe, LocalNetworkInfo, LogController, PeerRole,
    SignalFlags,
};

/// Everything the control loop owns, passed explicitly to each stage.
pub struct EucanetdContext {
    pub config: EucanetdConfig,
    pub peer: PeerRole,
    pub buffers: GniBuffers,
    /// Only allocated for non-overlay drivers
    pub lni: Option<LocalNetworkInfo>,
    pub signals: SignalFlags,
    probe: Arc<dyn HostNetworkProbe>,
    gni_file: Option<AtomicFile>,
    config_watcher: ConfigFileWatcher,
    log: Option<LogController>,
}

impl std::fmt::Debug for EucanetdContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EucanetdContext")
            .field("config", &self.config)
            .field("peer", &self.peer)
            .field("gni_file", &self.gni_file)
            .finish_non_exhaustive()
    }
}

impl EucanetdContext {
    pub fn new(
        config: EucanetdConfig,
        signals: SignalFlags,
        probe: Arc<dyn HostNetworkProbe>,
    ) -> Self {
        let config_watcher = ConfigFileWatcher::new(&config.paths.config_file());
        Self {
            config,
            peer: PeerRole::Invalid,
            buffers: GniBuffers::new(),
            lni: None,
            signals,
            probe,
            gni_file: None,
            config_watcher,
            log: None,
        }
    }

    pub fn set_log_controller(&mut self, log: LogController) {
        self.log = Some(log);
    }

    pub fn probe(&self) -> &dyn HostNetworkProbe {
        self.probe.as_ref()
    }

    pub fn gni_file(&self) -> Option<&AtomicFile> {
        self.gni_file.as_ref()
    }

    /// Keep retry noise of pre-flight out of the log file.
    pub fn cap_log_level(&self) {
        if let Some(log) = self.log.as_ref() {
            if self.config.debug.is_none() {
                log.cap_level(EucanetdLogLevel::Warn);
            }
        }
    }

    /// Re-apply `LOG*` options unless the level was fixed on the command
    /// line.
    pub fn apply_log_params(&self) {
        if let Some(log) = self.log.as_ref() {
            if self.config.debug.is_none() {
                log.apply(&self.config.online.log);
            }
        }
    }

    /// Full configuration phase: locate and parse the desired state, then
    /// overlay the configuration file.
    pub async fn read_config(&mut self) -> Result<(), EucanetdError> {
        let gni_file = match self.gni_file.take() {
            Some(f) => f,
            None => self.locate_gni_source()?,
        };
        let result = gni_file.get();
        let dest = gni_file.dest().to_path_buf();
        self.gni_file = Some(gni_file);
        result?;

        let gni = gni_from_file(&dest)?;

        let values = match self.config_watcher.read() {
            Ok(v) => v,
            Err(e) => {
                log::warn!("{e}, using default configuration");
                ConfigValues::default()
            }
        };
        self.config.apply_values(&values, true);
        self.config.fill_mido_from_gni(&gni.mido);
        let config_file = self.config.paths.config_file();
        if config_file != self.config_watcher.path() {
            // EUCALYPTUS in the file moved the installation root
            self.config_watcher = ConfigFileWatcher::new(&config_file);
            self.config_watcher.read().ok();
        }
        self.apply_log_params();

        if !gni.mode.is_valid() {
            let mode_str = gni.mode_str.clone();
            self.buffers.set_current(gni);
            return Err(EucanetdError::new(
                ErrorKind::InvalidNetworkMode,
                format!("Invalid network mode '{mode_str}' in desired state"),
            ));
        }
        self.config.network_mode = gni.mode;
        self.buffers.set_current(gni);
        Ok(())
    }

    fn locate_gni_source(&self) -> Result<AtomicFile, EucanetdError> {
        for (source, dest) in self.config.paths.gni_candidates() {
            if source.exists() {
                log::info!("Using desired state from {}", source.display());
                return Ok(AtomicFile::new(
                    &format!("file://{}", source.display()),
                    &dest,
                ));
            }
        }
        Err(EucanetdError::new(
            ErrorKind::TransientInput,
            format!(
                "Cannot locate global network info under {} or {}",
                self.config.paths.run_dir().display(),
                self.config.paths.state_dir().display()
            ),
        ))
    }

    /// Re-read the configuration file if modified, returns whether it was.
    pub fn fetch_latest_local_config(&mut self) -> Result<bool, EucanetdError> {
        match self.config_watcher.read_if_modified()? {
            Some(values) => {
                self.config.apply_values(&values, false);
                self.apply_log_params();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Refresh the private desired state copy, returns whether it changed.
    pub fn fetch_latest_network(&mut self) -> Result<bool, EucanetdError> {
        match self.gni_file.as_ref() {
            Some(f) => f.get(),
            None => Err(EucanetdError::new(
                ErrorKind::Bug,
                "Desired state source not located yet".to_string(),
            )),
        }
    }

    /// Parse the private copy into the current buffer. On error the current
    /// buffer is left untouched.
    pub async fn read_latest_network(&mut self) -> Result<(), EucanetdError> {
        let dest = match self.gni_file.as_ref() {
            Some(f) => f.dest().to_path_buf(),
            None => {
                return Err(EucanetdError::new(
                    ErrorKind::Bug,
                    "Desired state source not located yet".to_string(),
                ));
            }
        };
        let gni = gni_from_file(&dest)?;
        if gni.mode != self.config.network_mode {
            return Err(EucanetdError::new(
                ErrorKind::ConfigInconsistency,
                format!(
                    "Inconsistent network mode in GNI ({}) and eucanetd ({})",
                    gni.mode_str, self.config.network_mode
                ),
            ));
        }
        if !gni.mode.is_overlay() {
            self.update_vm_gateway(&gni).await?;
        }
        self.buffers.set_current(gni);
        Ok(())
    }

    async fn update_vm_gateway(
        &mut self,
        gni: &GlobalNetworkInfo,
    ) -> Result<(), EucanetdError> {
        let interfaces = self.probe.interfaces().await?;
        let local_ips: Vec<IpAddr> = interfaces
            .iter()
            .flat_map(|i| i.ipv4.iter().map(|a| IpAddr::V4(a.address)))
            .collect();
        let cluster = gni.find_self_cluster(&local_ips).ok_or_else(|| {
            EucanetdError::new(
                ErrorKind::TransientInput,
                "Cannot retrieve the cluster this host belongs to".to_string(),
            )
        })?;
        let bridge_dev = self.config.restart.bridge_dev.as_str();
        let bridge_addrs: Vec<_> = interfaces
            .iter()
            .filter(|i| i.name == bridge_dev)
            .flat_map(|i| i.ipv4.iter().cloned())
            .collect();
        self.config.vm_gateway_ip = Some(resolve_vm_gateway(
            &self.config.online,
            cluster,
            bridge_dev,
            &bridge_addrs,
        )?);
        Ok(())
    }

    /// Whether the current buffer carries the version applied last
    pub fn is_already_applied(&self) -> bool {
        let version = self.buffers.current().version.as_str();
        !version.is_empty() && version == self.config.last_applied_version
    }

    /// Persist the version of the current buffer as applied.
    pub fn write_version_file(&mut self) -> Result<(), EucanetdError> {
        let version = self.buffers.current().version.clone();
        if version.is_empty() {
            log::debug!("Desired state carries no version, nothing to record");
            return Ok(());
        }
        let path = self.config.paths.version_file();
        write_file(&path, version.as_bytes(), 0o644).map_err(|e| {
            EucanetdError::new(
                ErrorKind::TransientInput,
                format!("Failed to write {}: {e}", path.display()),
            )
        })?;
        log::trace!("Applied desired state version {version}");
        self.config.last_applied_version = version;
        Ok(())
    }

    pub async fn populate_lni(&mut self) -> Result<(), EucanetdError> {
        if let Some(lni) = self.lni.as_mut() {
            lni.populate(self.probe.as_ref()).await?;
        }
        Ok(())
    }

    pub fn reset_lni(&mut self) {
        if let Some(lni) = self.lni.as_mut() {
            lni.reset();
        }
    }
}
