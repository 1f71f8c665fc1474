use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use mdip_core::MdipResult;
use mdip_crypto::canonical::canonical_bytes;
use mdip_crypto::cid::{cid_for, CODEC_JSON, CODEC_RAW};
use serde_json::Value;

/// Content-addressed blob store.
///
/// Implementors provide `put`/`get`; the typed helpers derive the content id
/// (json codec for JSON, raw codec for text and bytes) and delegate.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, cid: &str, data: Bytes) -> MdipResult<()>;

    async fn get(&self, cid: &str) -> MdipResult<Option<Bytes>>;

    /// Store canonical JSON and return its content id.
    async fn add_json(&self, value: &Value) -> MdipResult<String> {
        let bytes = canonical_bytes(value)?;
        let cid = cid_for(CODEC_JSON, &bytes);
        self.put(&cid, Bytes::from(bytes)).await?;
        Ok(cid)
    }

    async fn get_json(&self, cid: &str) -> MdipResult<Option<Value>> {
        match self.get(cid).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn add_text(&self, text: &str) -> MdipResult<String> {
        self.add_data(Bytes::copy_from_slice(text.as_bytes())).await
    }

    /// `None` if the blob is missing or not UTF-8.
    async fn get_text(&self, cid: &str) -> MdipResult<Option<String>> {
        Ok(self
            .get(cid)
            .await?
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok()))
    }

    async fn add_data(&self, data: Bytes) -> MdipResult<String> {
        let cid = cid_for(CODEC_RAW, &data);
        self.put(&cid, data).await?;
        Ok(cid)
    }

    async fn get_data(&self, cid: &str) -> MdipResult<Option<Bytes>> {
        self.get(cid).await
    }
}

/// In-memory content store.
#[derive(Default)]
pub struct MemoryCas {
    blobs: DashMap<String, Bytes>,
}

impl MemoryCas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryCas {
    async fn put(&self, cid: &str, data: Bytes) -> MdipResult<()> {
        self.blobs.insert(cid.to_string(), data);
        Ok(())
    }

    async fn get(&self, cid: &str) -> MdipResult<Option<Bytes>> {
        Ok(self.blobs.get(cid).map(|b| b.clone()))
    }
}
