// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    ErrorKind, EucanetdError, EucanetdLogLevel, FlushMode, GniCluster,
    GniMido, LocalIpv4Addr, LogParams, NetworkMode,
};

pub const EUCALYPTUS_ENV_VAR_NAME: &str = "EUCALYPTUS";
pub const EUCALYPTUS_USER_ENV_VAR_NAME: &str = "EUCA_USER";
pub const DEFAULT_EUCA_USER: &str = "eucalyptus";
/// Polling interval used before the configuration file has been read
pub const DEFAULT_POLLING_FREQUENCY: u64 = 5;

const GNI_FILE_NAME: &str = "global_network_info.xml";
const CC_GNI_FILE_NAME: &str = "cc_global_network_info.xml";
const GNI_DEST_FILE_NAME: &str = "eucanetd_global_network_info.xml";

/// Keys only honored when eucanetd starts.
pub const RESTART_KEYS: [(&str, &str); 14] = [
    ("EUCALYPTUS", "/"),
    ("VNET_BRIDGE", ""),
    ("VNET_DHCPDAEMON", "/usr/sbin/dhcpd"),
    ("VNET_DHCPUSER", "root"),
    ("VNET_MODE", "MANAGED-NOVLAN"),
    ("VNET_LOCALIP", ""),
    ("VNET_PRIVINTERFACE", ""),
    ("VNET_PUBINTERFACE", ""),
    ("DISABLE_TUNNELING", "Y"),
    ("EUCA_USER", DEFAULT_EUCA_USER),
    ("MIDOEUCANETDHOST", ""),
    ("MIDOGWHOSTS", ""),
    ("MIDOPUBNW", ""),
    ("MIDOPUBGWIP", ""),
];

/// Keys re-read whenever the configuration file changes.
pub const ONLINE_KEYS: [(&str, &str); 12] = [
    ("POLLING_FREQUENCY", "1"),
    ("DISABLE_L2_ISOLATION", "N"),
    ("NC_PROXY", "N"),
    ("NC_ROUTER", "Y"),
    ("NC_ROUTER_IP", ""),
    ("METADATA_USE_VM_PRIVATE", "N"),
    ("METADATA_IP", ""),
    ("LOGLEVEL", "INFO"),
    ("LOGROLLNUMBER", "10"),
    ("LOGMAXSIZE", "104857600"),
    ("LOGPREFIX", ""),
    ("LOGFACILITY", ""),
];

/// Filesystem layout below the installation root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EucanetdPaths {
    pub root: PathBuf,
}

impl Default for EucanetdPaths {
    fn default() -> Self {
        Self::new(Path::new("/"))
    }
}

impl EucanetdPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join("var/run/eucalyptus")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("var/lib/eucalyptus")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("var/log/eucalyptus")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join("eucanetd.log")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.run_dir().join("eucanetd.pid")
    }

    pub fn version_file(&self) -> PathBuf {
        self.run_dir().join("global_network_info.version")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("etc/eucalyptus/eucalyptus.conf")
    }

    pub fn cmd_prefix(&self) -> String {
        format!(
            "{}",
            self.root.join("usr/lib/eucalyptus/euca_rootwrap").display()
        )
    }

    /// Directory holding artifacts rendered by the driver of `mode`
    pub fn artifact_dir(&self, mode: NetworkMode) -> PathBuf {
        self.run_dir()
            .join("net")
            .join(mode.as_str().to_lowercase())
    }

    /// Desired state sources in priority order with their private copy.
    pub fn gni_candidates(&self) -> Vec<(PathBuf, PathBuf)> {
        vec![
            (
                self.run_dir().join(GNI_FILE_NAME),
                self.run_dir().join(GNI_DEST_FILE_NAME),
            ),
            (
                self.run_dir().join(CC_GNI_FILE_NAME),
                self.run_dir().join(GNI_DEST_FILE_NAME),
            ),
            (
                self.state_dir().join(GNI_FILE_NAME),
                self.state_dir().join(GNI_DEST_FILE_NAME),
            ),
        ]
    }
}

/// Parsed `KEY="value"` pairs of eucalyptus.conf
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigValues(HashMap<String, String>);

impl ConfigValues {
    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() || key.contains(char::is_whitespace) {
                    continue;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .or_else(|| {
                        value.strip_prefix('\'').and_then(|v| v.strip_suffix('\''))
                    })
                    .unwrap_or(value);
                values.insert(key.to_string(), value.to_string());
            }
        }
        Self(values)
    }

    pub fn from_file(path: &Path) -> Result<Self, EucanetdError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EucanetdError::new(
                ErrorKind::TransientInput,
                format!("Failed to read config file {}: {e}", path.display()),
            )
        })?;
        Ok(Self::parse(&content))
    }

    /// Value of `key`, falling back to the built-in default of known keys
    pub fn get(&self, key: &str) -> &str {
        if let Some(v) = self.0.get(key) {
            return v.as_str();
        }
        RESTART_KEYS
            .iter()
            .chain(ONLINE_KEYS.iter())
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or_default()
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.0.get(key).map(|v| !v.is_empty()).unwrap_or(false)
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key) == "Y"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RouterIp {
    /// Use the cluster private subnet gateway (with ARP spoofing)
    #[default]
    None,
    /// Detect the bridge address inside the cluster private subnet
    Auto,
    Ip(Ipv4Addr),
}

/// Overlay controller endpoints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MidoOptions {
    pub eucanetd_host: String,
    pub gateway_hosts: String,
    pub public_network: String,
    pub public_gateway_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestartOptions {
    pub pub_interface: String,
    pub priv_interface: String,
    pub bridge_dev: String,
    pub dhcp_daemon: String,
    pub dhcp_user: String,
    /// `VNET_MODE` from file, informational only
    pub vnet_mode: String,
    pub local_ip: Option<Ipv4Addr>,
    pub disable_tunneling: bool,
    pub mido: MidoOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineOptions {
    pub polling_frequency: u64,
    pub disable_l2_isolation: bool,
    pub nc_proxy: bool,
    pub nc_router: bool,
    pub nc_router_ip: RouterIp,
    pub metadata_use_vm_private: bool,
    pub metadata_ip: Option<Ipv4Addr>,
    pub log: LogParams,
}

impl Default for OnlineOptions {
    fn default() -> Self {
        Self {
            polling_frequency: DEFAULT_POLLING_FREQUENCY,
            disable_l2_isolation: false,
            nc_proxy: false,
            nc_router: true,
            nc_router_ip: RouterIp::None,
            metadata_use_vm_private: false,
            metadata_ip: None,
            log: LogParams::default(),
        }
    }
}

impl OnlineOptions {
    pub fn from_values(values: &ConfigValues) -> Self {
        let polling_frequency =
            match values.get("POLLING_FREQUENCY").parse::<u64>() {
                Ok(i) if i > 0 => i,
                _ => {
                    log::warn!(
                        "Invalid POLLING_FREQUENCY '{}', using 1 second",
                        values.get("POLLING_FREQUENCY")
                    );
                    1
                }
            };

        let metadata_ip = match values.get("METADATA_IP") {
            "" => None,
            ip => match ip.parse::<Ipv4Addr>() {
                Ok(ip) if !ip.is_loopback() => Some(ip),
                _ => {
                    log::error!(
                        "value specified for METADATA_IP is not a valid IP, \
                         defaulting to CLC registered address"
                    );
                    None
                }
            },
        };

        let nc_router = values.flag("NC_ROUTER");
        let nc_router_ip = if !nc_router {
            RouterIp::None
        } else {
            match values.get("NC_ROUTER_IP") {
                "" => RouterIp::None,
                "AUTO" => RouterIp::Auto,
                ip => match ip.parse::<Ipv4Addr>() {
                    Ok(ip) if !ip.is_loopback() => RouterIp::Ip(ip),
                    _ => {
                        log::error!(
                            "value specified for NC_ROUTER_IP is not a valid \
                             IP or the string 'AUTO': defaulting to 'AUTO'"
                        );
                        RouterIp::Auto
                    }
                },
            }
        };

        let log_level = values
            .get("LOGLEVEL")
            .parse::<EucanetdLogLevel>()
            .unwrap_or_else(|e| {
                log::warn!("{e}, using INFO");
                EucanetdLogLevel::Info
            });

        Self {
            polling_frequency,
            disable_l2_isolation: values.flag("DISABLE_L2_ISOLATION"),
            nc_proxy: values.flag("NC_PROXY"),
            nc_router,
            nc_router_ip,
            metadata_use_vm_private: values.flag("METADATA_USE_VM_PRIVATE"),
            metadata_ip,
            log: LogParams {
                level: log_level,
                roll_number: values
                    .get("LOGROLLNUMBER")
                    .parse()
                    .unwrap_or(crate::logging::DEFAULT_LOG_ROLL_NUMBER),
                max_size: values
                    .get("LOGMAXSIZE")
                    .parse()
                    .unwrap_or(crate::logging::DEFAULT_LOG_MAX_SIZE),
                prefix: values.get("LOGPREFIX").to_string(),
                facility: values.get("LOGFACILITY").to_string(),
            },
        }
    }
}

/// Process wide eucanetd configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EucanetdConfig {
    pub paths: EucanetdPaths,
    pub euca_user: String,
    pub cmd_prefix: String,
    /// Fixed log level for terminal output, `None` means background daemon
    /// logging to file at the configured `LOGLEVEL`.
    pub debug: Option<EucanetdLogLevel>,
    pub flush_mode: FlushMode,
    pub flush_mode_arg: Option<String>,
    /// Read-only flush modes could run next to a running eucanetd
    pub multi_instance_safe: bool,
    /// Only accepted from the desired state document
    pub network_mode: NetworkMode,
    pub last_applied_version: String,
    pub restart: RestartOptions,
    pub online: OnlineOptions,
    /// Default gateway handed to VMs, resolved after each parse
    pub vm_gateway_ip: Option<Ipv4Addr>,
}

impl EucanetdConfig {
    /// Bootstrap phase: environment lookups only.
    pub fn bootstrap() -> Result<Self, EucanetdError> {
        Self::bootstrap_from(
            std::env::var(EUCALYPTUS_ENV_VAR_NAME).ok(),
            std::env::var(EUCALYPTUS_USER_ENV_VAR_NAME).ok(),
        )
    }

    pub fn bootstrap_from(
        root: Option<String>,
        user: Option<String>,
    ) -> Result<Self, EucanetdError> {
        let root = root.filter(|r| !r.is_empty()).unwrap_or("/".to_string());
        let user = user
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_EUCA_USER.to_string());
        if !Path::new(&root).is_absolute() {
            return Err(EucanetdError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "{EUCALYPTUS_ENV_VAR_NAME} should be an absolute path, \
                     but got {root}"
                ),
            ));
        }
        let paths = EucanetdPaths::new(Path::new(&root));
        Ok(Self {
            cmd_prefix: paths.cmd_prefix(),
            paths,
            euca_user: user,
            ..Default::default()
        })
    }

    /// Overlay the recognized keys of eucalyptus.conf. The restart key set
    /// is only honored when `with_restart_keys` is true.
    pub fn apply_values(&mut self, values: &ConfigValues, with_restart_keys: bool) {
        if with_restart_keys {
            self.apply_restart_values(values);
        }
        self.online = OnlineOptions::from_values(values);
    }

    fn apply_restart_values(&mut self, values: &ConfigValues) {
        if values.is_set("EUCALYPTUS") {
            self.paths = EucanetdPaths::new(Path::new(values.get("EUCALYPTUS")));
            self.cmd_prefix = self.paths.cmd_prefix();
        }
        if values.is_set("EUCA_USER") {
            self.euca_user = values.get("EUCA_USER").to_string();
        }
        let local_ip = match values.get("VNET_LOCALIP") {
            "" => None,
            ip => match ip.parse::<Ipv4Addr>() {
                Ok(ip) => Some(ip),
                Err(e) => {
                    log::warn!("Ignoring invalid VNET_LOCALIP {ip}: {e}");
                    None
                }
            },
        };
        self.restart = RestartOptions {
            pub_interface: values.get("VNET_PUBINTERFACE").to_string(),
            priv_interface: values.get("VNET_PRIVINTERFACE").to_string(),
            bridge_dev: values.get("VNET_BRIDGE").to_string(),
            dhcp_daemon: values.get("VNET_DHCPDAEMON").to_string(),
            dhcp_user: values.get("VNET_DHCPUSER").to_string(),
            vnet_mode: values.get("VNET_MODE").to_string(),
            local_ip,
            disable_tunneling: values.flag("DISABLE_TUNNELING"),
            mido: MidoOptions {
                eucanetd_host: values.get("MIDOEUCANETDHOST").to_string(),
                gateway_hosts: values.get("MIDOGWHOSTS").to_string(),
                public_network: values.get("MIDOPUBNW").to_string(),
                public_gateway_ip: values.get("MIDOPUBGWIP").to_string(),
            },
        };
        log::trace!(
            "required variables read from local config file: EUCALYPTUS={} \
             EUCA_USER={} VNET_MODE={} VNET_PUBINTERFACE={} \
             VNET_PRIVINTERFACE={} VNET_BRIDGE={} VNET_DHCPDAEMON={}",
            self.paths.root.display(),
            self.euca_user,
            self.restart.vnet_mode,
            self.restart.pub_interface,
            self.restart.priv_interface,
            self.restart.bridge_dev,
            self.restart.dhcp_daemon,
        );
    }

    /// Locally unset overlay endpoints come from the desired state.
    pub fn fill_mido_from_gni(&mut self, mido: &GniMido) {
        let opts = &mut self.restart.mido;
        if opts.eucanetd_host.is_empty() {
            opts.eucanetd_host.clone_from(&mido.eucanetd_host);
        }
        if opts.gateway_hosts.is_empty() {
            opts.gateway_hosts = mido.gateway_hosts.join(" ");
        }
        if opts.public_network.is_empty() {
            opts.public_network.clone_from(&mido.public_network_cidr);
        }
        if opts.public_gateway_ip.is_empty() {
            opts.public_gateway_ip.clone_from(&mido.public_gateway_ip);
        }
    }

    /// Sleep between two polls
    pub fn polling_frequency(&self) -> u64 {
        self.online.polling_frequency
    }
}

/// Pick the default gateway handed to VMs of `cluster`.
///
/// `bridge_addrs` are the addresses found on the configured bridge device,
/// only consulted for `NC_ROUTER_IP=AUTO`.
pub fn resolve_vm_gateway(
    online: &OnlineOptions,
    cluster: &GniCluster,
    bridge_dev: &str,
    bridge_addrs: &[LocalIpv4Addr],
) -> Result<Ipv4Addr, EucanetdError> {
    let subnet = cluster.private_subnet.as_ref().ok_or_else(|| {
        EucanetdError::new(
            ErrorKind::TransientInput,
            format!("Cluster {} has no private subnet defined", cluster.name),
        )
    })?;
    match (&online.nc_router, &online.nc_router_ip) {
        (false, _) => {
            log::trace!(
                "using default cluster private subnet GW as VM default GW: {}",
                subnet.gateway
            );
            Ok(subnet.gateway)
        }
        (true, RouterIp::None) => {
            log::trace!(
                "using default cluster private subnet GW, with ARP spoofing, \
                 as VM default GW: {}",
                subnet.gateway
            );
            Ok(subnet.gateway)
        }
        (true, RouterIp::Ip(ip)) => {
            log::trace!("using user specified NC IP as VM default GW: {ip}");
            Ok(*ip)
        }
        (true, RouterIp::Auto) => {
            for addr in bridge_addrs {
                if addr.netmask() == subnet.netmask
                    && subnet.contains(addr.address)
                {
                    log::trace!(
                        "using auto-detected IP {} of bridge {bridge_dev} as \
                         VM default GW",
                        addr.address
                    );
                    return Ok(addr.address);
                }
            }
            Err(EucanetdError::new(
                ErrorKind::TransientInput,
                format!(
                    "cannot find an IP assigned to specified bridge device \
                     '{bridge_dev}' that falls within this cluster's \
                     specified subnet '{}/{}': check your configuration",
                    subnet.subnet, subnet.netmask
                ),
            ))
        }
    }
}
