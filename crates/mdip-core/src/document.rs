use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::types::{Mdip, PublicJwk};

/// The DID context every generated document carries.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Verification method type for secp256k1 agent keys.
pub const SECP256K1_VERIFICATION_KEY: &str = "EcdsaSecp256k1VerificationKey2019";

/// A verification method entry of a DID document.
///
/// Only `publicKeyJwk` matters for signing; everything else is optional so
/// that any W3C-shaped entry round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationMethod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub method_type: Option<String>,
    #[serde(rename = "publicKeyJwk", default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<PublicJwk>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// W3C DID document as produced for agents and assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// A single URI or a list; kept as written.
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(rename = "verificationMethod", default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,
    /// References or embedded methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DidDocument {
    /// Document of an agent DID controlled by `jwk`.
    pub fn agent(did: &str, jwk: PublicJwk) -> Self {
        Self {
            context: Some(json!([DID_CONTEXT])),
            id: Some(did.into()),
            controller: None,
            verification_method: Some(vec![VerificationMethod {
                id: Some("#key-1".into()),
                controller: Some(did.into()),
                method_type: Some(SECP256K1_VERIFICATION_KEY.into()),
                public_key_jwk: Some(jwk),
                extra: Map::new(),
            }]),
            authentication: Some(vec![json!("#key-1")]),
            extra: Map::new(),
        }
    }

    /// Document of an asset DID owned by `controller`.
    pub fn asset(did: &str, controller: &str) -> Self {
        Self {
            context: Some(json!([DID_CONTEXT])),
            id: Some(did.into()),
            controller: Some(controller.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// First key in `verificationMethod`, the current signing key of an agent.
    pub fn signing_key(&self) -> Option<&PublicJwk> {
        self.verification_method
            .as_ref()?
            .first()?
            .public_key_jwk
            .as_ref()
    }
}

/// One end of the block interval an update was confirmed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockBound {
    pub time: i64,
    #[serde(rename = "timeISO")]
    pub time_iso: String,
    pub blockid: String,
    pub height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txidx: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batchid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opidx: Option<u64>,
}

/// Chain timing attached to documents whose latest update was anchored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTimestamp {
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opid: Option<String>,
    #[serde(rename = "lowerBound", default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<BlockBound>,
    #[serde(rename = "upperBound", default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<BlockBound>,
}

/// `didDocumentMetadata` of a resolved document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
    #[serde(rename = "canonicalId", default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    #[serde(rename = "versionId", default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "version_string")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DocumentTimestamp>,
}

/// Versions travel as decimal strings but numbers are accepted on input.
mod version_string {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&v.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(n)),
            Some(Raw::Text(t)) => t.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// A resolved DID: document, data, metadata and protocol section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MdipDocument {
    #[serde(rename = "didDocument", default, skip_serializing_if = "Option::is_none")]
    pub did_document: Option<DidDocument>,
    #[serde(rename = "didDocumentData", default, skip_serializing_if = "Option::is_none")]
    pub did_document_data: Option<Value>,
    #[serde(rename = "didDocumentMetadata", default, skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<DocumentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mdip: Option<Mdip>,
}

impl MdipDocument {
    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        self.did_document_metadata.as_ref()
    }

    pub fn is_deactivated(&self) -> bool {
        self.metadata()
            .and_then(|m| m.deactivated)
            .unwrap_or(false)
    }

    pub fn version(&self) -> Option<u32> {
        self.metadata().and_then(|m| m.version)
    }

    /// `id` of the DID document, if any.
    pub fn id(&self) -> Option<&str> {
        self.did_document.as_ref()?.id.as_deref()
    }

    /// Controller of an asset document.
    pub fn controller(&self) -> Option<&str> {
        self.did_document.as_ref()?.controller.as_deref()
    }

    pub fn is_empty_document(&self) -> bool {
        self.did_document.as_ref().map_or(true, DidDocument::is_empty)
    }
}
