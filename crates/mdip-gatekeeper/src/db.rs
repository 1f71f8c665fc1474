use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use mdip_core::types::did_suffix;
use mdip_core::{BlockId, BlockInfo, GatekeeperEvent, MdipError, MdipResult, Operation};

/// Persistence contract for the event log, outbound queues and block index.
///
/// Events are keyed by DID suffix, so `did:a:xyz` and `did:b:xyz` share a log.
#[async_trait]
pub trait GatekeeperDb: Send + Sync {
    async fn start(&self) -> MdipResult<()> {
        Ok(())
    }

    async fn stop(&self) -> MdipResult<()> {
        Ok(())
    }

    /// Drop every event, queue and block.
    async fn reset_db(&self) -> MdipResult<()>;

    /// Append an event to the log of `did`.
    async fn add_event(&self, did: &str, event: GatekeeperEvent) -> MdipResult<()>;

    /// The full log of `did`, empty if unknown.
    async fn get_events(&self, did: &str) -> MdipResult<Vec<GatekeeperEvent>>;

    /// Atomically replace the log of `did`.
    async fn set_events(&self, did: &str, events: Vec<GatekeeperEvent>) -> MdipResult<()>;

    async fn delete_events(&self, did: &str) -> MdipResult<()>;

    /// Suffixes of every DID with a log.
    async fn get_all_keys(&self) -> MdipResult<Vec<String>>;

    /// Append to a registry queue, returning its new length.
    async fn queue_operation(&self, registry: &str, op: Operation) -> MdipResult<usize>;

    async fn get_queue(&self, registry: &str) -> MdipResult<Vec<Operation>>;

    /// Remove queued operations whose signature value matches one in `ops`.
    async fn clear_queue(&self, registry: &str, ops: &[Operation]) -> MdipResult<bool>;

    async fn add_block(&self, registry: &str, block: BlockInfo) -> MdipResult<bool>;

    /// Latest block when `id` is `None`, else by height or hash.
    async fn get_block(&self, registry: &str, id: Option<&BlockId>)
        -> MdipResult<Option<BlockInfo>>;
}

pub(crate) fn require_did(did: &str) -> MdipResult<&str> {
    if did.is_empty() {
        return Err(MdipError::InvalidDid("missing".into()));
    }
    Ok(did_suffix(did))
}

/// Drop from `queue` every operation acknowledged in `ops`.
pub fn retain_unacknowledged(queue: &mut Vec<Operation>, ops: &[Operation]) {
    queue.retain(|item| {
        !ops
            .iter()
            .any(|op| op.signature_value() == item.signature_value())
    });
}

/// Pick a block from a registry's blocks per the `get_block` rules.
pub fn select_block<'a>(
    blocks: impl Iterator<Item = &'a BlockInfo>,
    id: Option<&BlockId>,
) -> Option<BlockInfo> {
    let mut blocks = blocks;
    match id {
        None => blocks.max_by_key(|b| b.height).cloned(),
        Some(BlockId::Height(height)) => blocks.find(|b| b.height == *height).cloned(),
        Some(BlockId::Hash(hash)) => blocks.find(|b| &b.hash == hash).cloned(),
    }
}

/// In-memory store used by tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryDb {
    dids: DashMap<String, Vec<GatekeeperEvent>>,
    queues: DashMap<String, Vec<Operation>>,
    blocks: DashMap<String, HashMap<String, BlockInfo>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GatekeeperDb for MemoryDb {
    async fn reset_db(&self) -> MdipResult<()> {
        self.dids.clear();
        self.queues.clear();
        self.blocks.clear();
        Ok(())
    }

    async fn add_event(&self, did: &str, event: GatekeeperEvent) -> MdipResult<()> {
        let key = require_did(did)?;
        self.dids.entry(key.to_string()).or_default().push(event);
        Ok(())
    }

    async fn get_events(&self, did: &str) -> MdipResult<Vec<GatekeeperEvent>> {
        Ok(self
            .dids
            .get(did_suffix(did))
            .map(|events| events.clone())
            .unwrap_or_default())
    }

    async fn set_events(&self, did: &str, events: Vec<GatekeeperEvent>) -> MdipResult<()> {
        let key = require_did(did)?;
        self.dids.insert(key.to_string(), events);
        Ok(())
    }

    async fn delete_events(&self, did: &str) -> MdipResult<()> {
        self.dids.remove(did_suffix(did));
        Ok(())
    }

    async fn get_all_keys(&self) -> MdipResult<Vec<String>> {
        Ok(self.dids.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn queue_operation(&self, registry: &str, op: Operation) -> MdipResult<usize> {
        let mut queue = self.queues.entry(registry.to_string()).or_default();
        queue.push(op);
        Ok(queue.len())
    }

    async fn get_queue(&self, registry: &str) -> MdipResult<Vec<Operation>> {
        Ok(self
            .queues
            .get(registry)
            .map(|q| q.clone())
            .unwrap_or_default())
    }

    async fn clear_queue(&self, registry: &str, ops: &[Operation]) -> MdipResult<bool> {
        if let Some(mut queue) = self.queues.get_mut(registry) {
            retain_unacknowledged(&mut queue, ops);
        }
        Ok(true)
    }

    async fn add_block(&self, registry: &str, block: BlockInfo) -> MdipResult<bool> {
        self.blocks
            .entry(registry.to_string())
            .or_default()
            .insert(block.hash.clone(), block);
        Ok(true)
    }

    async fn get_block(
        &self,
        registry: &str,
        id: Option<&BlockId>,
    ) -> MdipResult<Option<BlockInfo>> {
        Ok(self
            .blocks
            .get(registry)
            .and_then(|blocks| select_block(blocks.values(), id)))
    }
}
