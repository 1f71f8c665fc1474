//! Shared node state for HTTP handlers and maintenance tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use mdip_gatekeeper::{CheckDidsResult, Gatekeeper};
use tokio::sync::RwLock;

pub struct NodeState {
    pub gatekeeper: Arc<Gatekeeper>,
    /// When the node started.
    pub start_time: Instant,
    /// Set once startup maintenance has finished.
    ready: AtomicBool,
    /// Result of the most recent `check_dids` run.
    dids: RwLock<Option<CheckDidsResult>>,
}

impl NodeState {
    pub fn new(gatekeeper: Arc<Gatekeeper>) -> Self {
        Self {
            gatekeeper,
            start_time: Instant::now(),
            ready: AtomicBool::new(false),
            dids: RwLock::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn last_check(&self) -> Option<CheckDidsResult> {
        self.dids.read().await.clone()
    }

    /// Run `check_dids` and remember the result for `/status`.
    pub async fn refresh_check(&self) -> mdip_core::MdipResult<CheckDidsResult> {
        let result = self.gatekeeper.check_dids(None).await?;
        *self.dids.write().await = Some(result.clone());
        Ok(result)
    }
}
