use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use mdip_core::time::parse_time;
use mdip_core::types::did_suffix;
use mdip_core::{
    BlockId, BlockInfo, GatekeeperConfig, GatekeeperEvent, MdipDocument, MdipError, MdipResult,
    Operation, OperationType, LOCAL_REGISTRY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::cas::ContentStore;
use crate::db::GatekeeperDb;
use crate::importer::ImportBatchResult;
use crate::resolver::ResolveOptions;

/// Filters for [`Gatekeeper::get_dids`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDidsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_before: Option<String>,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default)]
    pub verify: bool,
    /// Return resolved documents instead of DIDs.
    #[serde(default)]
    pub resolve: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GetDidsResult {
    Dids(Vec<String>),
    Docs(Vec<MdipDocument>),
}

impl GetDidsResult {
    pub fn len(&self) -> usize {
        match self {
            Self::Dids(dids) => dids.len(),
            Self::Docs(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The DID list, or the document ids when documents were returned.
    pub fn into_dids(self) -> Vec<String> {
        match self {
            Self::Dids(dids) => dids,
            Self::Docs(docs) => docs
                .iter()
                .filter_map(|doc| doc.id().map(str::to_string))
                .collect(),
        }
    }
}

/// A DID ledger node: verifies, stores, resolves and reconciles DID operations.
pub struct Gatekeeper {
    pub(crate) db: Arc<dyn GatekeeperDb>,
    pub(crate) cas: Arc<dyn ContentStore>,
    pub(crate) config: GatekeeperConfig,
    /// Imported events waiting to be merged.
    pub(crate) events_queue: Mutex<Vec<GatekeeperEvent>>,
    /// `registry/hash` keys already accepted by `import_batch`.
    pub(crate) events_seen: DashSet<String>,
    /// Suffixes of DIDs that passed `verify_db`.
    pub(crate) verified_dids: DashSet<String>,
    pub(crate) is_processing: AtomicBool,
    pub(crate) supported_registries: RwLock<Vec<String>>,
    did_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds a per-DID write lock; the map entry goes away with the last holder.
pub(crate) struct DidLockGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DidLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Gatekeeper {
    pub fn new(
        config: GatekeeperConfig,
        db: Arc<dyn GatekeeperDb>,
        cas: Arc<dyn ContentStore>,
    ) -> MdipResult<Self> {
        config.validate()?;
        let supported = config.registries.clone();
        Ok(Self {
            db,
            cas,
            config,
            events_queue: Mutex::new(Vec::new()),
            events_seen: DashSet::new(),
            verified_dids: DashSet::new(),
            is_processing: AtomicBool::new(false),
            supported_registries: RwLock::new(supported),
            did_locks: DashMap::new(),
        })
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    pub fn did_prefix(&self) -> &str {
        &self.config.did_prefix
    }

    pub async fn start(&self) -> MdipResult<()> {
        self.db.start().await
    }

    pub async fn stop(&self) -> MdipResult<()> {
        self.db.stop().await
    }

    /// Serialize writers on a single DID.
    pub(crate) async fn lock_did(&self, did: &str) -> DidLockGuard<'_> {
        let key = did_suffix(did).to_string();
        let lock = self.did_locks.entry(key.clone()).or_default().clone();
        DidLockGuard {
            locks: &self.did_locks,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Forget cached verification state after the log of `did` changed.
    pub(crate) fn invalidate(&self, did: &str) {
        self.verified_dids.remove(did_suffix(did));
    }

    /// Content id of the canonical JSON form of `value`, optionally stored in the CAS.
    pub async fn generate_cid<T: Serialize + Sync>(&self, value: &T, save: bool) -> MdipResult<String> {
        if save {
            let json = serde_json::to_value(value)?;
            return self.cas.add_json(&json).await;
        }
        Ok(mdip_crypto::json_cid(value)?)
    }

    /// The DID a create operation mints.
    pub async fn generate_did(&self, operation: &Operation) -> MdipResult<String> {
        let cid = self.generate_cid(operation, false).await?;
        let prefix = operation
            .mdip
            .as_ref()
            .and_then(|m| m.prefix.as_deref())
            .unwrap_or(&self.config.did_prefix);
        Ok(format!("{}:{}", prefix, cid))
    }

    /// Verify and record a create operation, returning the new DID.
    ///
    /// Creating a DID that already exists is a no-op returning the same DID.
    pub async fn create_did(&self, operation: Operation) -> MdipResult<String> {
        if !self.verify_create_operation(&operation).await? {
            return Err(MdipError::InvalidOperation("signature".into()));
        }

        let registry = operation.registry().unwrap_or_default().to_string();
        if !self.is_supported(&registry).await {
            return Err(MdipError::InvalidOperation(format!(
                "registry {} not supported",
                registry
            )));
        }

        let did = self.generate_did(&operation).await?;
        let _guard = self.lock_did(&did).await;

        if !self.db.get_events(&did).await?.is_empty() {
            return Ok(did);
        }

        let event = GatekeeperEvent {
            registry: LOCAL_REGISTRY.into(),
            time: operation.created.clone().unwrap_or_default(),
            ordinal: Some(vec![0]),
            operation: operation.clone(),
            did: Some(did.clone()),
            opid: None,
            blockchain: None,
        };
        self.db.add_event(&did, event).await?;
        self.invalidate(&did);
        self.queue_operation(&registry, operation).await?;

        info!(did = %did, registry = %registry, "DID created");
        Ok(did)
    }

    /// Verify and record an update or delete operation.
    ///
    /// Returns `false` when the signature does not verify.
    pub async fn update_did(&self, operation: Operation) -> MdipResult<bool> {
        let did = operation
            .did
            .clone()
            .ok_or_else(|| MdipError::InvalidOperation("missing operation.did".into()))?;

        let doc = self.resolve_did(&did, ResolveOptions::default()).await?;
        if !self.verify_update_operation(&operation, &doc).await? {
            return Ok(false);
        }

        let registry = doc
            .mdip
            .as_ref()
            .map(|m| m.registry.clone())
            .unwrap_or_default();
        if !self.is_supported(&registry).await {
            return Err(MdipError::InvalidOperation(format!(
                "registry {} not supported",
                registry
            )));
        }

        let _guard = self.lock_did(&did).await;
        let event = GatekeeperEvent {
            registry: LOCAL_REGISTRY.into(),
            time: operation.signed_time().unwrap_or_default().to_string(),
            ordinal: Some(vec![0]),
            operation: operation.clone(),
            did: Some(did.clone()),
            opid: None,
            blockchain: None,
        };
        self.db.add_event(&did, event).await?;
        self.invalidate(&did);
        self.queue_operation(&registry, operation.clone()).await?;

        info!(did = %did, op = %operation.op_type, "DID updated");
        Ok(true)
    }

    pub async fn delete_did(&self, operation: Operation) -> MdipResult<bool> {
        if operation.op_type != OperationType::Delete {
            return Err(MdipError::InvalidOperation(format!(
                "type={}",
                operation.op_type
            )));
        }
        self.update_did(operation).await
    }

    /// List known DIDs, optionally filtered by update time and resolved.
    pub async fn get_dids(&self, options: GetDidsOptions) -> MdipResult<GetDidsResult> {
        let dids = match options.dids {
            Some(dids) => dids,
            None => self
                .db
                .get_all_keys()
                .await?
                .into_iter()
                .map(|key| format!("{}:{}", self.config.did_prefix, key))
                .collect(),
        };

        if options.updated_after.is_none() && options.updated_before.is_none() && !options.resolve {
            return Ok(GetDidsResult::Dids(dids));
        }

        let start = parse_bound("updatedAfter", options.updated_after.as_deref())?;
        let end = parse_bound("updatedBefore", options.updated_before.as_deref())?;
        let resolve_options = ResolveOptions {
            confirm: options.confirm,
            verify: options.verify,
            ..Default::default()
        };

        let mut did_list = Vec::new();
        let mut doc_list = Vec::new();

        for did in dids {
            let doc = match self.resolve_did(&did, resolve_options.clone()).await {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(did = %did, error = %e, "skipping unresolvable DID");
                    continue;
                }
            };

            let updated = doc
                .metadata()
                .and_then(|m| m.updated.as_deref().or(m.created.as_deref()))
                .and_then(parse_time)
                .map(|t| t.timestamp_millis())
                .unwrap_or(0);

            if start.is_some_and(|start| updated <= start) {
                continue;
            }
            if end.is_some_and(|end| updated >= end) {
                continue;
            }

            if options.resolve {
                doc_list.push(doc);
            } else {
                did_list.push(did);
            }
        }

        if options.resolve {
            Ok(GetDidsResult::Docs(doc_list))
        } else {
            Ok(GetDidsResult::Dids(did_list))
        }
    }

    /// Every DID stored locally.
    pub(crate) async fn all_dids(&self) -> MdipResult<Vec<String>> {
        Ok(self.get_dids(GetDidsOptions::default()).await?.into_dids())
    }

    /// The raw event log of `did`.
    pub async fn export_did(&self, did: &str) -> MdipResult<Vec<GatekeeperEvent>> {
        self.db.get_events(did).await
    }

    pub async fn export_dids(&self, dids: Option<Vec<String>>) -> MdipResult<Vec<Vec<GatekeeperEvent>>> {
        let dids = match dids {
            Some(dids) => dids,
            None => self.all_dids().await?,
        };

        let mut batch = Vec::with_capacity(dids.len());
        for did in dids {
            batch.push(self.export_did(&did).await?);
        }
        Ok(batch)
    }

    /// Queue exported logs for import.
    pub async fn import_dids(&self, dids: Vec<Vec<GatekeeperEvent>>) -> MdipResult<ImportBatchResult> {
        self.import_batch(dids.into_iter().flatten().collect()).await
    }

    /// Delete the logs of `dids` outright.
    pub async fn remove_dids(&self, dids: &[String]) -> MdipResult<bool> {
        if dids.is_empty() {
            return Err(MdipError::InvalidParameter("dids".into()));
        }
        for did in dids {
            self.db.delete_events(did).await?;
            self.invalidate(did);
        }
        info!(count = dids.len(), "DIDs removed");
        Ok(true)
    }

    /// Events of every non-local DID, oldest signature first.
    pub async fn export_batch(&self, dids: Option<Vec<String>>) -> MdipResult<Vec<GatekeeperEvent>> {
        let all = self.export_dids(dids).await?;
        let mut events: Vec<GatekeeperEvent> = all
            .into_iter()
            .filter(|events| {
                events
                    .first()
                    .and_then(|create| create.operation.registry())
                    .is_some_and(|registry| registry != LOCAL_REGISTRY)
            })
            .flatten()
            .collect();

        events.sort_by_key(|event| {
            event
                .operation
                .signed_time()
                .and_then(parse_time)
                .map(|t| t.timestamp_millis())
                .unwrap_or(0)
        });
        Ok(events)
    }

    /// Wipe the store and the verification memo.
    pub async fn reset_db(&self) -> MdipResult<bool> {
        self.db.reset_db().await?;
        self.verified_dids.clear();
        info!("database reset");
        Ok(true)
    }

    pub async fn add_block(&self, registry: &str, block: BlockInfo) -> MdipResult<bool> {
        require_valid_registry(registry)?;
        self.db.add_block(registry, block).await
    }

    pub async fn get_block(&self, registry: &str, id: Option<BlockId>) -> MdipResult<Option<BlockInfo>> {
        require_valid_registry(registry)?;
        self.db.get_block(registry, id.as_ref()).await
    }

    pub async fn add_json(&self, value: &Value) -> MdipResult<String> {
        self.cas.add_json(value).await
    }

    pub async fn get_json(&self, cid: &str) -> MdipResult<Option<Value>> {
        self.cas.get_json(cid).await
    }

    pub async fn add_text(&self, text: &str) -> MdipResult<String> {
        self.cas.add_text(text).await
    }

    pub async fn get_text(&self, cid: &str) -> MdipResult<Option<String>> {
        self.cas.get_text(cid).await
    }

    pub async fn add_data(&self, data: Bytes) -> MdipResult<String> {
        self.cas.add_data(data).await
    }

    pub async fn get_data(&self, cid: &str) -> MdipResult<Option<Bytes>> {
        self.cas.get_data(cid).await
    }
}

pub(crate) fn require_valid_registry(registry: &str) -> MdipResult<()> {
    if !mdip_core::config::is_valid_registry(registry) {
        return Err(MdipError::InvalidParameter(format!("registry={}", registry)));
    }
    Ok(())
}

fn parse_bound(name: &str, value: Option<&str>) -> MdipResult<Option<i64>> {
    match value {
        None => Ok(None),
        Some(s) => parse_time(s)
            .map(|t| Some(t.timestamp_millis()))
            .ok_or_else(|| MdipError::InvalidParameter(format!("{}={}", name, s))),
    }
}
