use futures::future::BoxFuture;
use mdip_core::document::{BlockBound, DidDocument, DocumentMetadata, DocumentTimestamp};
use mdip_core::time::{parse_time, standard_time, unix_to_iso};
use mdip_core::{
    BlockId, BlockchainAnchor, GatekeeperEvent, MdipDocument, MdipError, MdipResult, MdipType,
    Operation, OperationType, VALID_REGISTRIES, VALID_VERSIONS,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::trace;

use crate::did::is_valid_did;
use crate::gatekeeper::Gatekeeper;

/// Options for [`Gatekeeper::resolve_did`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Resolve as of this time; later events are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_time: Option<String>,
    /// Resolve this version number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_sequence: Option<u32>,
    /// Stop at the first event not confirmed on the native registry.
    #[serde(default)]
    pub confirm: bool,
    /// Re-verify every operation while replaying.
    #[serde(default)]
    pub verify: bool,
}

impl ResolveOptions {
    /// Confirmed view as of `time`, used to check signers.
    pub fn confirmed_at(time: Option<&str>) -> Self {
        Self {
            version_time: time.map(str::to_string),
            confirm: true,
            ..Default::default()
        }
    }
}

impl Gatekeeper {
    /// Replay the event log of `did` into a document.
    ///
    /// Fails with `InvalidDid` for malformed DIDs and `UnknownDid` when no
    /// events are stored.
    pub fn resolve_did<'a>(
        &'a self,
        did: &'a str,
        options: ResolveOptions,
    ) -> BoxFuture<'a, MdipResult<MdipDocument>> {
        Box::pin(self.replay(did, options))
    }

    async fn replay(&self, did: &str, options: ResolveOptions) -> MdipResult<MdipDocument> {
        if !is_valid_did(did) {
            return Err(MdipError::InvalidDid(did.to_string()));
        }

        let version_time = match options.version_time.as_deref() {
            Some(t) => Some(
                parse_time(t)
                    .ok_or_else(|| MdipError::InvalidParameter(format!("versionTime={}", t)))?,
            ),
            None => None,
        };

        let events = self.db.get_events(did).await?;
        let Some(anchor) = events.first() else {
            return Err(MdipError::UnknownDid(did.to_string()));
        };

        let mut doc = self.generate_doc(&anchor.operation, did)?;
        let created = anchor
            .operation
            .created
            .as_deref()
            .and_then(standard_time)
            .ok_or_else(|| MdipError::InvalidOperation("created".into()))?;
        let canonical_id = doc
            .metadata()
            .and_then(|m| m.canonical_id.clone());

        let mut version: u32 = 1;
        let mut confirmed = true;

        for (index, event) in events.iter().enumerate() {
            let operation = &event.operation;
            let version_id = self.generate_cid(operation, false).await?;
            let updated = standard_time(&event.time).unwrap_or_else(|| event.time.clone());
            let registry = doc.mdip.as_ref().map(|m| m.registry.clone());
            let timestamp = match registry.as_deref() {
                Some(chain) => self.timestamp(chain, event, &version_id).await?,
                None => None,
            };

            if index == 0 {
                if operation.op_type != OperationType::Create {
                    return Err(MdipError::InvalidOperation("first event is not a create".into()));
                }
                if options.verify && !self.verify_create_operation(operation).await? {
                    return Err(MdipError::InvalidOperation("signature".into()));
                }
                doc.did_document_metadata = Some(DocumentMetadata {
                    created: Some(created.clone()),
                    canonical_id: canonical_id.clone(),
                    version_id: Some(version_id),
                    version: Some(version),
                    confirmed: Some(confirmed),
                    timestamp,
                    ..Default::default()
                });
                continue;
            }

            if let Some(limit) = version_time {
                if parse_time(&event.time).is_some_and(|t| t > limit) {
                    break;
                }
            }

            if options.version_sequence == Some(version) {
                break;
            }

            confirmed = confirmed && registry.as_deref() == Some(event.registry.as_str());

            if options.confirm && !confirmed {
                break;
            }

            if options.verify {
                if !self.verify_update_operation(operation, &doc).await? {
                    return Err(MdipError::InvalidOperation("signature".into()));
                }
                let previous = doc.metadata().and_then(|m| m.version_id.as_deref());
                if let Some(previd) = operation.previd.as_deref() {
                    if Some(previd) != previous {
                        return Err(MdipError::InvalidOperation("previd".into()));
                    }
                }
            }

            match operation.op_type {
                OperationType::Update => {
                    version += 1;
                    doc = replacement_doc(operation, event.blockchain.as_ref())?;
                    doc.did_document_metadata = Some(DocumentMetadata {
                        created: Some(created.clone()),
                        updated: Some(updated),
                        canonical_id: canonical_id.clone(),
                        version_id: Some(version_id),
                        version: Some(version),
                        confirmed: Some(confirmed),
                        timestamp,
                        ..Default::default()
                    });
                }
                OperationType::Delete => {
                    version += 1;
                    doc.did_document = Some(DidDocument::default());
                    doc.did_document_data = Some(json!({}));
                    doc.did_document_metadata = Some(DocumentMetadata {
                        created: Some(created.clone()),
                        deleted: Some(updated),
                        deactivated: Some(true),
                        canonical_id: canonical_id.clone(),
                        version_id: Some(version_id),
                        version: Some(version),
                        confirmed: Some(confirmed),
                        timestamp,
                        ..Default::default()
                    });
                }
                OperationType::Create => {
                    trace!(did = %did, "ignoring repeated create");
                }
            }
        }

        Ok(doc)
    }

    /// Initial document built from a create operation.
    pub(crate) fn generate_doc(&self, anchor: &Operation, did: &str) -> MdipResult<MdipDocument> {
        let mdip = anchor
            .mdip
            .as_ref()
            .ok_or_else(|| MdipError::InvalidOperation("mdip".into()))?;

        if !VALID_VERSIONS.contains(&mdip.version) {
            return Err(MdipError::InvalidOperation(format!(
                "mdip.version={}",
                mdip.version
            )));
        }
        if !VALID_REGISTRIES.contains(&mdip.registry.as_str()) {
            return Err(MdipError::InvalidOperation(format!(
                "mdip.registry={}",
                mdip.registry
            )));
        }

        let (did_document, data) = match mdip.mdip_type {
            MdipType::Agent => {
                let jwk = anchor
                    .public_jwk
                    .clone()
                    .ok_or_else(|| MdipError::InvalidOperation("publicJwk".into()))?;
                (DidDocument::agent(did, jwk), Some(json!({})))
            }
            MdipType::Asset => {
                let controller = anchor
                    .controller
                    .as_deref()
                    .ok_or_else(|| MdipError::InvalidOperation("controller".into()))?;
                (DidDocument::asset(did, controller), anchor.data.clone())
            }
        };

        let metadata = DocumentMetadata {
            created: anchor.created.clone(),
            canonical_id: mdip.prefix.as_ref().map(|_| did.to_string()),
            ..Default::default()
        };

        Ok(MdipDocument {
            did_document: Some(did_document),
            did_document_data: data,
            did_document_metadata: Some(metadata),
            mdip: Some(mdip.clone()),
        })
    }

    /// Block interval an event was anchored in, when the chain's blocks are known.
    async fn timestamp(
        &self,
        chain: &str,
        event: &GatekeeperEvent,
        opid: &str,
    ) -> MdipResult<Option<DocumentTimestamp>> {
        let mut lower_bound = None;
        let mut upper_bound = None;

        if let Some(blockid) = event.operation.blockid.as_deref() {
            let id = BlockId::Hash(blockid.to_string());
            if let Some(block) = self.db.get_block(chain, Some(&id)).await? {
                lower_bound = Some(BlockBound {
                    time: block.time,
                    time_iso: unix_to_iso(block.time).unwrap_or_default(),
                    blockid: block.hash,
                    height: block.height,
                    txid: None,
                    txidx: None,
                    batchid: None,
                    opidx: None,
                });
            }
        }

        if let Some(anchor) = event.blockchain.as_ref() {
            let id = BlockId::Height(anchor.height);
            if let Some(block) = self.db.get_block(chain, Some(&id)).await? {
                upper_bound = Some(BlockBound {
                    time: block.time,
                    time_iso: unix_to_iso(block.time).unwrap_or_default(),
                    blockid: block.hash,
                    height: block.height,
                    txid: anchor.txid.clone(),
                    txidx: anchor.index,
                    batchid: anchor.batch.clone(),
                    opidx: anchor.opidx,
                });
            }
        }

        if lower_bound.is_none() && upper_bound.is_none() {
            return Ok(None);
        }

        Ok(Some(DocumentTimestamp {
            chain: chain.to_string(),
            opid: Some(opid.to_string()),
            lower_bound,
            upper_bound,
        }))
    }
}

/// The document an update carries, without its stale metadata.
pub(crate) fn update_doc(operation: &Operation) -> MdipResult<MdipDocument> {
    let mut value = operation.doc.clone().unwrap_or_else(|| json!({}));
    if let Value::Object(map) = &mut value {
        map.remove("didDocumentMetadata");
    }
    serde_json::from_value(value).map_err(|e| MdipError::InvalidOperation(format!("doc: {}", e)))
}

/// Document carried by an update, with the event's chain anchor recorded
/// under `mdip.registration`.
fn replacement_doc(
    operation: &Operation,
    blockchain: Option<&BlockchainAnchor>,
) -> MdipResult<MdipDocument> {
    let mut doc = update_doc(operation)?;

    if let Some(mdip) = doc.mdip.as_mut() {
        mdip.registration = match blockchain {
            Some(anchor) => Some(serde_json::to_value(anchor)?),
            None => None,
        };
    }
    Ok(doc)
}
