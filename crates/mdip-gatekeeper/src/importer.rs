use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};

use mdip_core::types::compare_ordinals;
use mdip_core::{GatekeeperEvent, MdipError, MdipResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::gatekeeper::Gatekeeper;

/// Outcome of importing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// The log changed.
    Added,
    /// Already known; nothing changed.
    Merged,
    Rejected,
    /// Depends on something not yet imported; retry later.
    Deferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEventsResult {
    pub added: usize,
    pub merged: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEventsResult {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub busy: bool,
    pub added: usize,
    pub merged: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl ProcessEventsResult {
    fn busy() -> Self {
        Self {
            busy: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchResult {
    pub queued: usize,
    pub processed: usize,
    pub rejected: usize,
    /// Pending queue length after the batch.
    pub total: usize,
}

/// Clears the processing flag when dropped.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Gatekeeper {
    /// Merge one externally sourced event into the local log.
    ///
    /// Never fails: problems become `Rejected`, and events whose DID or
    /// controller is not known yet become `Deferred`.
    pub async fn import_event(&self, event: &mut GatekeeperEvent) -> ImportStatus {
        match self.try_import_event(event).await {
            Ok(status) => status,
            Err(MdipError::UnknownDid(did)) => {
                debug!(did = %did, "deferring event until DID is known");
                ImportStatus::Deferred
            }
            Err(e) => {
                debug!(did = ?event.did, error = %e, "rejecting event");
                ImportStatus::Rejected
            }
        }
    }

    async fn try_import_event(&self, event: &mut GatekeeperEvent) -> MdipResult<ImportStatus> {
        if event.operation.signature.is_none() {
            return Ok(ImportStatus::Rejected);
        }

        let did = match event.did.clone() {
            Some(did) => did,
            None => {
                let did = match event.operation.did.clone() {
                    Some(did) => did,
                    None => self.generate_did(&event.operation).await?,
                };
                event.did = Some(did.clone());
                did
            }
        };

        let _guard = self.lock_did(&did).await;
        let mut current = self.db.get_events(&did).await?;

        for existing in current.iter_mut() {
            if existing.opid.is_none() {
                existing.opid = Some(self.generate_cid(&existing.operation, true).await?);
            }
        }
        if event.opid.is_none() {
            event.opid = Some(self.generate_cid(&event.operation, true).await?);
        }

        let native = current
            .first()
            .and_then(|first| first.operation.registry())
            .map(str::to_string);
        let on_native = native.as_deref() == Some(event.registry.as_str());

        let duplicate = current
            .iter()
            .position(|e| e.operation.signature_value() == event.operation.signature_value());

        if let Some(index) = duplicate {
            if native.as_deref() == Some(current[index].registry.as_str()) {
                return Ok(ImportStatus::Merged);
            }
            if on_native {
                current[index] = event.clone();
                self.db.set_events(&did, current).await?;
                self.invalidate(&did);
                return Ok(ImportStatus::Added);
            }
            return Ok(ImportStatus::Merged);
        }

        if !self.verify_operation(&event.operation).await? {
            return Ok(ImportStatus::Rejected);
        }

        let Some(previd) = event.operation.previd.as_deref() else {
            self.db.add_event(&did, event.clone()).await?;
            self.invalidate(&did);
            return Ok(ImportStatus::Added);
        };

        if current.is_empty() {
            self.db.add_event(&did, event.clone()).await?;
            self.invalidate(&did);
            return Ok(ImportStatus::Added);
        }

        let Some(index) = current.iter().position(|e| e.opid.as_deref() == Some(previd)) else {
            return Ok(ImportStatus::Deferred);
        };

        if index == current.len() - 1 {
            self.db.add_event(&did, event.clone()).await?;
            self.invalidate(&did);
            return Ok(ImportStatus::Added);
        }

        if on_native {
            let next = &current[index + 1];
            let earlier = match (event.ordinal.as_deref(), next.ordinal.as_deref()) {
                (Some(a), Some(b)) => compare_ordinals(a, b) == CmpOrdering::Less,
                _ => false,
            };

            if next.registry != event.registry || earlier {
                debug!(did = %did, at = index + 1, "reorg replaces log tail");
                current.truncate(index + 1);
                current.push(event.clone());
                self.db.set_events(&did, current).await?;
                self.invalidate(&did);
                return Ok(ImportStatus::Added);
            }
        }

        Ok(ImportStatus::Rejected)
    }

    /// One pass over the pending queue. Deferred events are re-queued.
    pub async fn import_events(&self) -> ImportEventsResult {
        let batch = std::mem::take(&mut *self.events_queue.lock().await);
        let total = batch.len();
        let mut result = ImportEventsResult::default();

        for (i, mut event) in batch.into_iter().enumerate() {
            let status = self.import_event(&mut event).await;
            debug!(n = i + 1, total, did = ?event.did, status = ?status, "import");

            match status {
                ImportStatus::Added => result.added += 1,
                ImportStatus::Merged => result.merged += 1,
                ImportStatus::Rejected => result.rejected += 1,
                ImportStatus::Deferred => self.events_queue.lock().await.push(event),
            }
        }

        result
    }

    /// Import until a pass makes no progress.
    ///
    /// Only one caller runs at a time; a concurrent call returns `busy`.
    pub async fn process_events(&self) -> ProcessEventsResult {
        if self
            .is_processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ProcessEventsResult::busy();
        }
        let _guard = ProcessingGuard(&self.is_processing);

        let mut result = ProcessEventsResult::default();
        loop {
            let pass = self.import_events().await;
            result.added += pass.added;
            result.merged += pass.merged;
            result.rejected += pass.rejected;

            if pass.added == 0 && pass.merged == 0 {
                break;
            }
        }
        result.pending = self.events_queue.lock().await.len();

        debug!(
            added = result.added,
            merged = result.merged,
            rejected = result.rejected,
            pending = result.pending,
            "processEvents"
        );
        result
    }

    /// Queue structurally valid events for import, skipping ones already seen.
    pub async fn import_batch(&self, batch: Vec<GatekeeperEvent>) -> MdipResult<ImportBatchResult> {
        if batch.is_empty() {
            return Err(MdipError::InvalidParameter("batch".into()));
        }

        let mut result = ImportBatchResult::default();
        let mut queue = self.events_queue.lock().await;

        for event in batch {
            if !self.verify_event(&event) {
                result.rejected += 1;
                continue;
            }

            let key = format!(
                "{}/{}",
                event.registry,
                event.operation.signature_hash().unwrap_or_default()
            );
            if self.events_seen.insert(key) {
                queue.push(event);
                result.queued += 1;
            } else {
                result.processed += 1;
            }
        }

        result.total = queue.len();
        Ok(result)
    }

    /// Like [`import_batch`](Self::import_batch) for untyped input; entries
    /// that are not events count as rejected.
    pub async fn import_batch_json(&self, batch: Vec<Value>) -> MdipResult<ImportBatchResult> {
        if batch.is_empty() {
            return Err(MdipError::InvalidParameter("batch".into()));
        }

        let total = batch.len();
        let events: Vec<GatekeeperEvent> = batch
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        let malformed = total - events.len();

        if events.is_empty() {
            debug!(malformed, "batch contained no events");
            let queued = self.events_queue.lock().await.len();
            return Ok(ImportBatchResult {
                rejected: malformed,
                total: queued,
                ..Default::default()
            });
        }

        let mut result = self.import_batch(events).await?;
        result.rejected += malformed;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GatekeeperDb;
    use crate::resolver::ResolveOptions;
    use crate::testing;
    use mdip_core::{MdipDocument, Operation};
    use mdip_crypto::{hash_message, sign_hash, KeyPair};
    use serde_json::json;

    fn event(registry: &str, operation: &Operation, did: &str, ordinal: Vec<u64>) -> GatekeeperEvent {
        let time = operation
            .signed_time()
            .or(operation.created.as_deref())
            .unwrap_or_default()
            .to_string();
        GatekeeperEvent {
            ordinal: Some(ordinal),
            did: Some(did.to_string()),
            ..GatekeeperEvent::new(registry, time, operation.clone())
        }
    }

    fn version_id(doc: &MdipDocument) -> Option<String> {
        doc.metadata().and_then(|m| m.version_id.clone())
    }

    fn with_data(doc: &MdipDocument, data: serde_json::Value) -> MdipDocument {
        let mut next = doc.clone();
        next.did_document_data = Some(data);
        next
    }

    #[tokio::test]
    async fn test_import_same_event_twice_merges() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();

        let mut first = event("hyperswarm", &create, &did, vec![0]);
        assert_eq!(gk.import_event(&mut first).await, ImportStatus::Added);
        assert!(first.opid.is_some());

        let mut second = event("hyperswarm", &create, &did, vec![0]);
        assert_eq!(gk.import_event(&mut second).await, ImportStatus::Merged);
    }

    #[tokio::test]
    async fn test_import_fills_in_missing_did() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();

        let mut event = GatekeeperEvent::new("hyperswarm", create.created.clone().unwrap(), create);
        assert_eq!(gk.import_event(&mut event).await, ImportStatus::Added);
        assert_eq!(event.did.as_deref(), Some(did.as_str()));
    }

    #[tokio::test]
    async fn test_import_rejects_forged_signature() {
        let (gk, db) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let mut create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();
        create.signature.as_mut().unwrap().value =
            sign_hash(&hash_message(b"forged"), &kp).unwrap();

        let mut forged = event("hyperswarm", &create, &did, vec![0]);
        assert_eq!(gk.import_event(&mut forged).await, ImportStatus::Rejected);
        assert!(db.get_events(&did).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_rejects_unsigned_event() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let mut create = testing::agent_op(&kp, "hyperswarm");
        create.signature = None;

        let mut unsigned = GatekeeperEvent::new("hyperswarm", "2024-01-01T00:00:00Z", create);
        assert_eq!(gk.import_event(&mut unsigned).await, ImportStatus::Rejected);
    }

    #[tokio::test]
    async fn test_update_before_create_is_deferred() {
        let (source, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = source.create_did(create.clone()).await.unwrap();
        let doc = source.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let update = testing::update_op(
            &kp,
            &did,
            &with_data(&doc, json!({"n": 1})),
            &did,
            version_id(&doc),
        );

        let (gk, _) = testing::gatekeeper();
        let mut early = event("hyperswarm", &update, &did, vec![1]);
        assert_eq!(gk.import_event(&mut early).await, ImportStatus::Deferred);

        let batch = vec![
            event("hyperswarm", &update, &did, vec![1]),
            event("hyperswarm", &create, &did, vec![0]),
        ];
        let queued = gk.import_batch(batch).await.unwrap();
        assert_eq!(queued.queued, 2);

        let result = gk.process_events().await;
        assert!(!result.busy);
        assert_eq!(result.added, 2);
        assert_eq!(result.pending, 0);

        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.version(), Some(2));
        assert_eq!(doc.did_document_data, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_orphan_update_stays_pending() {
        let (source, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let did = source
            .create_did(testing::agent_op(&kp, "hyperswarm"))
            .await
            .unwrap();
        let doc = source.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let update = testing::update_op(&kp, &did, &doc, &did, version_id(&doc));

        let (gk, _) = testing::gatekeeper();
        gk.import_batch(vec![event("hyperswarm", &update, &did, vec![1])])
            .await
            .unwrap();

        let result = gk.process_events().await;
        assert_eq!(result.added, 0);
        assert_eq!(result.pending, 1);
        assert_eq!(gk.check_dids(None).await.unwrap().events_queue.len(), 1);
    }

    #[tokio::test]
    async fn test_earlier_ordinal_on_native_registry_wins() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();

        let mut first = event("hyperswarm", &create, &did, vec![0]);
        assert_eq!(gk.import_event(&mut first).await, ImportStatus::Added);
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let previd = version_id(&doc);

        let b = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "b"})), &did, previd.clone());
        let b_prime = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "b'"})), &did, previd.clone());
        let late = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "late"})), &did, previd);

        let mut event_b = event("hyperswarm", &b, &did, vec![1]);
        assert_eq!(gk.import_event(&mut event_b).await, ImportStatus::Added);

        let mut event_b_prime = event("hyperswarm", &b_prime, &did, vec![0, 1]);
        assert_eq!(gk.import_event(&mut event_b_prime).await, ImportStatus::Added);

        let mut event_late = event("hyperswarm", &late, &did, vec![2]);
        assert_eq!(gk.import_event(&mut event_late).await, ImportStatus::Rejected);

        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.version(), Some(2));
        assert_eq!(doc.did_document_data, Some(json!({"fork": "b'"})));
        assert_eq!(gk.export_did(&did).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_native_event_replaces_foreign_registry_tail() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();

        let mut genesis = event("hyperswarm", &create, &did, vec![0]);
        assert_eq!(gk.import_event(&mut genesis).await, ImportStatus::Added);
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let previd = version_id(&doc);

        // The same update slot taken on another registry, then on the native one
        // with a later ordinal.
        let foreign = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "TFTC"})), &did, previd.clone());
        let native = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "native"})), &did, previd);

        let mut foreign = event("TFTC", &foreign, &did, vec![0]);
        assert_eq!(gk.import_event(&mut foreign).await, ImportStatus::Added);

        let mut native = event("hyperswarm", &native, &did, vec![9]);
        assert_eq!(gk.import_event(&mut native).await, ImportStatus::Added);

        let events = gk.export_did(&did).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.registry == "hyperswarm"));
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.did_document_data, Some(json!({"fork": "native"})));
    }

    #[tokio::test]
    async fn test_foreign_registry_cannot_displace_native_tail() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();

        let mut genesis = event("hyperswarm", &create, &did, vec![0]);
        gk.import_event(&mut genesis).await;
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let previd = version_id(&doc);

        let native = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "native"})), &did, previd.clone());
        let foreign = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "TFTC"})), &did, previd);

        let mut native = event("hyperswarm", &native, &did, vec![1]);
        assert_eq!(gk.import_event(&mut native).await, ImportStatus::Added);
        let mut foreign = event("TFTC", &foreign, &did, vec![0]);
        assert_eq!(gk.import_event(&mut foreign).await, ImportStatus::Rejected);
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_update_document() {
        let (gk, db) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();
        let mut genesis = event("hyperswarm", &create, &did, vec![0]);
        gk.import_event(&mut genesis).await;
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();

        let mut value = serde_json::to_value(&doc).unwrap();
        value["didDocument"]["controller"] = json!(["did:test:a", "did:test:b"]);
        let mut update = Operation::new(mdip_core::OperationType::Update);
        update.did = Some(did.clone());
        update.doc = Some(value);
        update.previd = version_id(&doc);
        let update = testing::sign(update, &kp, Some(&did));

        let bad = event("hyperswarm", &update, &did, vec![1]);
        assert!(!gk.verify_event(&bad));

        let mut bad = bad;
        assert_eq!(gk.import_event(&mut bad).await, ImportStatus::Rejected);
        assert_eq!(db.get_events(&did).await.unwrap().len(), 1);
        assert!(gk.resolve_did(&did, ResolveOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_native_event_replaces_local_fork() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.create_did(create).await.unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let previd = version_id(&doc);

        let local = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "local"})), &did, previd.clone());
        assert!(gk.update_did(local).await.unwrap());

        let remote = testing::update_op(&kp, &did, &with_data(&doc, json!({"fork": "remote"})), &did, previd);
        let mut remote = event("hyperswarm", &remote, &did, vec![5]);
        assert_eq!(gk.import_event(&mut remote).await, ImportStatus::Added);

        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.did_document_data, Some(json!({"fork": "remote"})));
        assert_eq!(doc.metadata().unwrap().confirmed, Some(true));
    }

    #[tokio::test]
    async fn test_native_copy_confirms_local_event() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let did = gk
            .create_did(testing::agent_op(&kp, "hyperswarm"))
            .await
            .unwrap();
        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        let update = testing::update_op(&kp, &did, &with_data(&doc, json!({"n": 2})), &did, version_id(&doc));
        assert!(gk.update_did(update.clone()).await.unwrap());

        let pending = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(pending.version(), Some(2));
        assert_eq!(pending.metadata().unwrap().confirmed, Some(false));

        let confirmed_view = gk
            .resolve_did(&did, ResolveOptions { confirm: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(confirmed_view.version(), Some(1));

        let mut anchored = event("hyperswarm", &update, &did, vec![1]);
        assert_eq!(gk.import_event(&mut anchored).await, ImportStatus::Added);

        let mut again = event("hyperswarm", &update, &did, vec![1]);
        assert_eq!(gk.import_event(&mut again).await, ImportStatus::Merged);

        let doc = gk.resolve_did(&did, ResolveOptions::default()).await.unwrap();
        assert_eq!(doc.version(), Some(2));
        assert_eq!(doc.metadata().unwrap().confirmed, Some(true));
    }

    #[tokio::test]
    async fn test_process_events_reports_busy() {
        let (gk, _) = testing::gatekeeper();
        gk.is_processing.store(true, Ordering::SeqCst);
        let result = gk.process_events().await;
        assert!(result.busy);
        assert_eq!(result.added, 0);

        gk.is_processing.store(false, Ordering::SeqCst);
        assert!(!gk.process_events().await.busy);
        assert!(!gk.is_processing.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_import_batch_dedups_and_validates() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();

        assert!(matches!(
            gk.import_batch(Vec::new()).await,
            Err(MdipError::InvalidParameter(_))
        ));

        let good = event("hyperswarm", &create, &did, vec![0]);
        let mut bad = good.clone();
        bad.time = "yesterday".into();

        let result = gk.import_batch(vec![good.clone(), bad]).await.unwrap();
        assert_eq!(result.queued, 1);
        assert_eq!(result.rejected, 1);
        assert_eq!(result.total, 1);

        let result = gk.import_batch(vec![good]).await.unwrap();
        assert_eq!(result.queued, 0);
        assert_eq!(result.processed, 1);
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_import_batch_json_counts_malformed_entries() {
        let (gk, _) = testing::gatekeeper();
        let kp = KeyPair::generate();
        let create = testing::agent_op(&kp, "hyperswarm");
        let did = gk.generate_did(&create).await.unwrap();
        let good = serde_json::to_value(event("hyperswarm", &create, &did, vec![0])).unwrap();

        let result = gk
            .import_batch_json(vec![good, json!({"foo": 1}), json!("bar")])
            .await
            .unwrap();
        assert_eq!(result.queued, 1);
        assert_eq!(result.rejected, 2);

        let result = gk.import_batch_json(vec![json!(42)]).await.unwrap();
        assert_eq!(result.rejected, 1);
        assert_eq!(result.total, 1);
    }
}
