use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Kind of a signed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Kind of DID minted by a create operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MdipType {
    /// Key-controlled identity.
    Agent,
    /// Data object owned by a controller DID.
    Asset,
}

impl fmt::Display for MdipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Asset => write!(f, "asset"),
        }
    }
}

/// secp256k1 public key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub crv: String,
    /// base64url X coordinate (32 bytes).
    pub x: String,
    /// base64url Y coordinate (32 bytes).
    pub y: String,
}

/// Protocol metadata declared by a create operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mdip {
    pub version: u32,
    #[serde(rename = "type")]
    pub mdip_type: MdipType,
    /// Native registry of the DID.
    pub registry: String,
    /// Expiry of an ephemeral DID.
    #[serde(rename = "validUntil", default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    /// Custom DID prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Blockchain anchor of the latest applied update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Mdip {
    pub fn new(mdip_type: MdipType, registry: impl Into<String>) -> Self {
        Self {
            version: 1,
            mdip_type,
            registry: registry.into(),
            valid_until: None,
            prefix: None,
            registration: None,
            extra: Map::new(),
        }
    }
}

/// Signature block attached to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    pub signed: String,
    /// Hex SHA-256 of the canonical operation without its signature.
    pub hash: String,
    /// Compact hex ECDSA signature.
    pub value: String,
}

/// A signed create, update or delete instruction.
///
/// Fields this type does not model are kept in `extra` so that the canonical
/// form (and therefore the hash and content id) survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mdip: Option<Mdip>,
    #[serde(rename = "publicJwk", default, skip_serializing_if = "Option::is_none")]
    pub public_jwk: Option<PublicJwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Operation {
    /// An empty operation of the given type.
    pub fn new(op_type: OperationType) -> Self {
        Self {
            op_type,
            created: None,
            mdip: None,
            public_jwk: None,
            controller: None,
            data: None,
            did: None,
            previd: None,
            blockid: None,
            doc: None,
            signature: None,
            extra: Map::new(),
        }
    }

    /// Copy of this operation with the signature removed; this is what gets hashed.
    pub fn unsigned(&self) -> Operation {
        Operation {
            signature: None,
            ..self.clone()
        }
    }

    pub fn signature_value(&self) -> Option<&str> {
        self.signature.as_ref().map(|s| s.value.as_str())
    }

    pub fn signature_hash(&self) -> Option<&str> {
        self.signature.as_ref().map(|s| s.hash.as_str())
    }

    pub fn signed_time(&self) -> Option<&str> {
        self.signature.as_ref().map(|s| s.signed.as_str())
    }

    /// Registry declared by a create operation.
    pub fn registry(&self) -> Option<&str> {
        self.mdip.as_ref().map(|m| m.registry.as_str())
    }
}

/// Anchor of an event in an external chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainAnchor {
    pub height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opidx: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An operation plus the ledger metadata it was recorded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatekeeperEvent {
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<Vec<u64>>,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// Content id of `operation`, filled in lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<BlockchainAnchor>,
}

impl GatekeeperEvent {
    pub fn new(registry: impl Into<String>, time: impl Into<String>, operation: Operation) -> Self {
        Self {
            registry: registry.into(),
            time: time.into(),
            ordinal: None,
            operation,
            did: None,
            opid: None,
            blockchain: None,
        }
    }
}

/// Lexicographic comparison of ordinals; a strict prefix sorts first.
pub fn compare_ordinals(a: &[u64], b: &[u64]) -> Ordering {
    a.cmp(b)
}

/// A block recorded for a chain-backed registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
    /// Unix seconds.
    pub time: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lookup key for a block: height or hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl BlockId {
    /// Numeric strings are heights, anything else is a hash.
    pub fn parse(s: &str) -> Self {
        match s.parse::<u64>() {
            Ok(height) => Self::Height(height),
            Err(_) => Self::Hash(s.to_string()),
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height(h) => write!(f, "{}", h),
            Self::Hash(h) => write!(f, "{}", h),
        }
    }
}

/// The suffix a DID is stored under: everything after the last `:`.
pub fn did_suffix(did: &str) -> &str {
    did.rsplit(':').next().unwrap_or(did)
}
