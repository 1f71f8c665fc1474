use serde::{Deserialize, Serialize};

use crate::error::MdipError;

/// Protocol versions this node accepts in `mdip.version`.
pub const VALID_VERSIONS: &[u32] = &[1];

/// Registries recognised when importing DIDs from the network.
pub const VALID_REGISTRIES: &[&str] = &[
    "local",
    "hyperswarm",
    "TESS",
    "TBTC",
    "TFTC",
    "Signet",
    "Signet-Inscription",
    "BTC-Inscription",
];

/// The private registry. Operations on it are never distributed.
pub const LOCAL_REGISTRY: &str = "local";

/// Returns true if `registry` is one of [`VALID_REGISTRIES`].
pub fn is_valid_registry(registry: &str) -> bool {
    VALID_REGISTRIES.contains(&registry)
}

/// Configuration for a Gatekeeper instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Prefix for DIDs minted by this node when a create has no `mdip.prefix`.
    #[serde(default = "default_did_prefix")]
    pub did_prefix: String,
    /// Registries this node accepts new DIDs on.
    #[serde(default = "default_registries")]
    pub registries: Vec<String>,
    /// Ceiling on the serialized size of a single operation.
    #[serde(default = "default_max_op_bytes")]
    pub max_op_bytes: usize,
    /// Queue length at which a registry stops being supported.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Channel every distributed operation is also queued on.
    #[serde(default = "default_fallback_registry")]
    pub fallback_registry: String,
}

fn default_did_prefix() -> String {
    "did:test".into()
}
fn default_registries() -> Vec<String> {
    vec!["local".into(), "hyperswarm".into()]
}
fn default_max_op_bytes() -> usize {
    64 * 1024
}
fn default_max_queue_size() -> usize {
    100
}
fn default_fallback_registry() -> String {
    "hyperswarm".into()
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            did_prefix: default_did_prefix(),
            registries: default_registries(),
            max_op_bytes: default_max_op_bytes(),
            max_queue_size: default_max_queue_size(),
            fallback_registry: default_fallback_registry(),
        }
    }
}

impl GatekeeperConfig {
    /// Check that every configured registry is known to the protocol.
    pub fn validate(&self) -> Result<(), MdipError> {
        for registry in self.registries.iter().chain(std::iter::once(&self.fallback_registry)) {
            if !is_valid_registry(registry) {
                return Err(MdipError::InvalidParameter(format!("registry={}", registry)));
            }
        }
        if !self.did_prefix.starts_with("did:") {
            return Err(MdipError::InvalidParameter(format!(
                "did_prefix={}",
                self.did_prefix
            )));
        }
        Ok(())
    }
}
