//! TOML configuration for Net/ROM nodes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use netrom_core::constants::{DEFAULT_TTL, DEFAULT_WINDOW, SEQ_MODULUS};
use netrom_core::{Callsign, Mnemonic};

use crate::error::NodeError;
use crate::storage::Storage;

/// Suffix appended to the callsign tail to form a default alias.
const ALIAS_SUFFIX: &str = "NOD";

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub interfaces: InterfacesSection,
}

impl NodeConfig {
    /// A configuration with defaults everywhere except the callsign.
    pub fn new(callsign: impl Into<String>) -> Self {
        Self {
            node: NodeSection::new(callsign),
            logging: LoggingSection::default(),
            storage: StorageSection::default(),
            interfaces: InterfacesSection::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        self.callsign()?;
        self.alias()?;
        if self.node.ttl == 0 {
            return Err(NodeError::Config("ttl must be at least 1".into()));
        }
        if self.node.window == 0 || self.node.window >= SEQ_MODULUS {
            return Err(NodeError::Config(format!(
                "window must be between 1 and {}, got {}",
                SEQ_MODULUS - 1,
                self.node.window
            )));
        }
        for entry in &self.interfaces.kiss_tcp {
            if entry.port > 0x0F {
                return Err(NodeError::Config(format!(
                    "{}: KISS port {} out of range",
                    entry.name, entry.port
                )));
            }
        }
        Ok(())
    }

    pub fn callsign(&self) -> Result<Callsign, NodeError> {
        self.node
            .callsign
            .parse()
            .map_err(|e| NodeError::Config(format!("invalid callsign {:?}: {e}", self.node.callsign)))
    }

    /// The configured alias, or one derived from the callsign.
    pub fn alias(&self) -> Result<Mnemonic, NodeError> {
        match &self.node.alias {
            Some(alias) => Mnemonic::new(alias)
                .map_err(|e| NodeError::Config(format!("invalid alias {alias:?}: {e}"))),
            None => {
                let callsign = self.callsign()?;
                resolve_alias(&callsign)
                    .map_err(|e| NodeError::Config(format!("cannot derive alias: {e}")))
            }
        }
    }

    /// Storage directory, if storage is enabled.
    pub fn storage_path(&self) -> Option<PathBuf> {
        if !self.storage.enabled {
            return None;
        }
        match &self.storage.path {
            Some(path) => Some(PathBuf::from(path)),
            None => Storage::default_dir(),
        }
    }
}

/// Default alias: last three characters of the base callsign plus `NOD`.
pub fn resolve_alias(callsign: &Callsign) -> Result<Mnemonic, netrom_core::CallsignError> {
    let base = callsign.base();
    let tail = &base[base.len().saturating_sub(3)..];
    Mnemonic::new(&format!("{tail}{ALIAS_SUFFIX}"))
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    pub callsign: String,
    pub alias: Option<String>,
    /// Seconds between NODES broadcasts. 0 disables. Default: 1800.
    #[serde(default = "default_beacon_interval")]
    pub beacon_interval: u64,
    #[serde(default = "default_ttl")]
    pub ttl: u8,
    /// Largest window granted to or proposed by this node.
    #[serde(default = "default_window")]
    pub window: u8,
    #[serde(default = "default_true")]
    pub accept_connections: bool,
}

impl NodeSection {
    pub fn new(callsign: impl Into<String>) -> Self {
        Self {
            callsign: callsign.into(),
            alias: None,
            beacon_interval: default_beacon_interval(),
            ttl: default_ttl(),
            window: default_window(),
            accept_connections: true,
        }
    }

    pub fn beacon_interval(&self) -> Option<Duration> {
        (self.beacon_interval > 0).then(|| Duration::from_secs(self.beacon_interval))
    }
}

fn default_beacon_interval() -> u64 {
    1800
}

fn default_ttl() -> u8 {
    DEFAULT_TTL
}

fn default_window() -> u8 {
    DEFAULT_WINDOW
}

fn default_true() -> bool {
    true
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[storage]` section.
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Storage directory. Defaults to `~/.netrom/storage`.
    pub path: Option<String>,
    /// Seconds between routing-table saves. 0 saves only at shutdown.
    #[serde(default = "default_persist_interval")]
    pub persist_interval: u64,
}

fn default_persist_interval() -> u64 {
    300
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            persist_interval: default_persist_interval(),
        }
    }
}

/// The `[interfaces]` section.
#[derive(Debug, Default, Deserialize)]
pub struct InterfacesSection {
    #[serde(default)]
    pub kiss_tcp: Vec<KissTcpEntry>,
}

/// A `[[interfaces.kiss_tcp]]` entry.
#[derive(Debug, Deserialize)]
pub struct KissTcpEntry {
    pub name: String,
    /// `host:port` of the TNC.
    pub target: String,
    #[serde(default)]
    pub port: u8,
    pub max_reconnect_tries: Option<u32>,
}
