//! RocksDB storage backend for the Gatekeeper node.
//!
//! One column family per concern. Event logs and queues are stored as JSON
//! arrays under a single key and rewritten under `write_lock`.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use mdip_core::types::did_suffix;
use mdip_core::{BlockId, BlockInfo, GatekeeperEvent, MdipError, MdipResult, Operation};
use mdip_gatekeeper::db::retain_unacknowledged;
use mdip_gatekeeper::{ContentStore, GatekeeperDb};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

/// Column family names for different data types.
const CF_EVENTS: &str = "events";
const CF_QUEUE: &str = "queue";
const CF_BLOCKS: &str = "blocks";
const CF_CAS: &str = "cas";

const ALL_CFS: [&str; 4] = [CF_EVENTS, CF_QUEUE, CF_BLOCKS, CF_CAS];

fn storage_err(e: rocksdb::Error) -> MdipError {
    MdipError::Storage(e.to_string())
}

/// RocksDB-backed event store and content store.
pub struct Storage {
    db: DB,
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> MdipResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| MdipError::Storage(format!("column family '{}' not found", name)))
    }

    fn get_raw(&self, cf_name: &str, key: &str) -> MdipResult<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        self.db.get_cf(&cf, key.as_bytes()).map_err(storage_err)
    }

    fn put_raw(&self, cf_name: &str, key: &str, value: &[u8]) -> MdipResult<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(&cf, key.as_bytes(), value).map_err(storage_err)
    }

    fn delete_raw(&self, cf_name: &str, key: &str) -> MdipResult<()> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(&cf, key.as_bytes()).map_err(storage_err)
    }

    fn read_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> MdipResult<Option<T>> {
        match self.get_raw(cf_name, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> MdipResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_raw(cf_name, key, &bytes)
    }

    /// Every key in a column family starting with `prefix`.
    fn scan(&self, cf_name: &str, prefix: &str) -> MdipResult<Vec<(String, Vec<u8>)>> {
        let cf = self.cf(cf_name)?;
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            let (key, value) = item.map_err(storage_err)?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            entries.push((String::from_utf8_lossy(&key).into_owned(), value.into_vec()));
        }
        Ok(entries)
    }

    /// Resolve a height or tip key to the block it names.
    fn follow_block_pointer(&self, registry: &str, pointer: &str) -> MdipResult<Option<BlockInfo>> {
        match self.get_raw(CF_BLOCKS, pointer)? {
            Some(hash) => {
                let hash = String::from_utf8_lossy(&hash);
                self.read_json(CF_BLOCKS, &block_key(registry, &hash))
            }
            None => Ok(None),
        }
    }

    fn clear_cf(&self, cf_name: &str) -> MdipResult<()> {
        let cf = self.cf(cf_name)?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(storage_err)?;
            batch.delete_cf(&cf, key);
        }
        self.db.write(batch).map_err(storage_err)
    }
}

// Blocks live under `<registry>/hash/<hash>`. Heights and the tip are
// pointers to that key so lookups never walk the whole registry.
fn block_key(registry: &str, hash: &str) -> String {
    format!("{}/hash/{}", registry, hash)
}

fn height_key(registry: &str, height: u64) -> String {
    format!("{}/height/{:020}", registry, height)
}

fn latest_key(registry: &str) -> String {
    format!("{}/latest", registry)
}

#[async_trait]
impl GatekeeperDb for Storage {
    async fn stop(&self) -> MdipResult<()> {
        self.db.flush().map_err(storage_err)
    }

    async fn reset_db(&self) -> MdipResult<()> {
        let _guard = self.write_lock.lock().await;
        for name in [CF_EVENTS, CF_QUEUE, CF_BLOCKS] {
            self.clear_cf(name)?;
        }
        Ok(())
    }

    async fn add_event(&self, did: &str, event: GatekeeperEvent) -> MdipResult<()> {
        if did.is_empty() {
            return Err(MdipError::InvalidDid("missing".into()));
        }
        let key = did_suffix(did);
        let _guard = self.write_lock.lock().await;
        let mut events: Vec<GatekeeperEvent> = self.read_json(CF_EVENTS, key)?.unwrap_or_default();
        events.push(event);
        self.write_json(CF_EVENTS, key, &events)
    }

    async fn get_events(&self, did: &str) -> MdipResult<Vec<GatekeeperEvent>> {
        Ok(self
            .read_json(CF_EVENTS, did_suffix(did))?
            .unwrap_or_default())
    }

    async fn set_events(&self, did: &str, events: Vec<GatekeeperEvent>) -> MdipResult<()> {
        if did.is_empty() {
            return Err(MdipError::InvalidDid("missing".into()));
        }
        let _guard = self.write_lock.lock().await;
        self.write_json(CF_EVENTS, did_suffix(did), &events)
    }

    async fn delete_events(&self, did: &str) -> MdipResult<()> {
        let _guard = self.write_lock.lock().await;
        self.delete_raw(CF_EVENTS, did_suffix(did))
    }

    async fn get_all_keys(&self) -> MdipResult<Vec<String>> {
        Ok(self
            .scan(CF_EVENTS, "")?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    async fn queue_operation(&self, registry: &str, op: Operation) -> MdipResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut queue: Vec<Operation> = self.read_json(CF_QUEUE, registry)?.unwrap_or_default();
        queue.push(op);
        self.write_json(CF_QUEUE, registry, &queue)?;
        Ok(queue.len())
    }

    async fn get_queue(&self, registry: &str) -> MdipResult<Vec<Operation>> {
        Ok(self.read_json(CF_QUEUE, registry)?.unwrap_or_default())
    }

    async fn clear_queue(&self, registry: &str, ops: &[Operation]) -> MdipResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut queue: Vec<Operation> = self.read_json(CF_QUEUE, registry)?.unwrap_or_default();
        retain_unacknowledged(&mut queue, ops);
        self.write_json(CF_QUEUE, registry, &queue)?;
        Ok(true)
    }

    async fn add_block(&self, registry: &str, block: BlockInfo) -> MdipResult<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_BLOCKS)?;
        let latest = self.follow_block_pointer(registry, &latest_key(registry))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf, block_key(registry, &block.hash), serde_json::to_vec(&block)?);
        batch.put_cf(&cf, height_key(registry, block.height), block.hash.as_bytes());
        if latest.map_or(true, |tip| block.height >= tip.height) {
            batch.put_cf(&cf, latest_key(registry), block.hash.as_bytes());
        }
        self.db.write(batch).map_err(storage_err)?;
        Ok(true)
    }

    async fn get_block(
        &self,
        registry: &str,
        id: Option<&BlockId>,
    ) -> MdipResult<Option<BlockInfo>> {
        let pointer = match id {
            Some(BlockId::Hash(hash)) => return self.read_json(CF_BLOCKS, &block_key(registry, hash)),
            Some(BlockId::Height(height)) => height_key(registry, *height),
            None => latest_key(registry),
        };
        self.follow_block_pointer(registry, &pointer)
    }
}

#[async_trait]
impl ContentStore for Storage {
    async fn put(&self, cid: &str, data: Bytes) -> MdipResult<()> {
        self.put_raw(CF_CAS, cid, &data)
    }

    async fn get(&self, cid: &str) -> MdipResult<Option<Bytes>> {
        Ok(self.get_raw(CF_CAS, cid)?.map(Bytes::from))
    }
}
