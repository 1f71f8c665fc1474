//! `mdip.toml`: how a Gatekeeper node binds, where it keeps its ledger and
//! how often it sweeps it. The `[gatekeeper]` table is handed to the ledger
//! as-is.

use anyhow::{bail, Context};
use mdip_core::GatekeeperConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Every table in `mdip.toml`. Missing tables take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// DID prefix, accepted registries and ledger limits.
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The HTTP surface mediators and wallets talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind, loopback unless the node is fronted by a proxy.
    #[serde(default = "loopback")]
    pub listen_addr: String,
    /// Zero picks a free port.
    #[serde(default = "gatekeeper_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// RocksDB directory holding event logs, queues, blocks and content.
    #[serde(default = "ledger_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Minutes between `verify_db` sweeps. Zero disables the loop.
    #[serde(default = "sweep_minutes")]
    pub gc_interval_minutes: u64,
    /// Minutes between DID census reports. Zero disables the loop.
    #[serde(default = "census_minutes")]
    pub status_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `mdip_gatekeeper=debug`.
    #[serde(default = "info_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "text_format")]
    pub format: String,
}

const LOG_FORMATS: [&str; 2] = ["text", "json"];

fn loopback() -> String {
    "127.0.0.1".into()
}
fn gatekeeper_port() -> u16 {
    4224
}
fn ledger_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn sweep_minutes() -> u64 {
    15
}
fn census_minutes() -> u64 {
    5
}
fn info_level() -> String {
    "info".into()
}
fn text_format() -> String {
    "text".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: loopback(),
            port: gatekeeper_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: ledger_dir() }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            gc_interval_minutes: sweep_minutes(),
            status_interval_minutes: census_minutes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: info_level(),
            format: text_format(),
        }
    }
}

impl NodeConfig {
    /// Read `path`, or start from defaults when it does not exist yet.
    /// A file that parses but describes an unusable ledger is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: NodeConfig =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config back out, creating the parent directory. Used by `--init`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks that hold after CLI overrides are applied too.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.gatekeeper.validate()?;
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            bail!("unknown log format '{}'", self.logging.format);
        }
        Ok(())
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
