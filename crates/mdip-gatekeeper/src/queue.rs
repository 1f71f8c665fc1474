use mdip_core::{MdipResult, Operation, LOCAL_REGISTRY};
use tracing::{info, warn};

use crate::gatekeeper::{require_valid_registry, Gatekeeper};

impl Gatekeeper {
    pub(crate) async fn is_supported(&self, registry: &str) -> bool {
        self.supported_registries
            .read()
            .await
            .iter()
            .any(|r| r == registry)
    }

    /// Queue a locally accepted operation for distribution.
    ///
    /// Every distributed operation goes to the fallback channel; operations
    /// native to another registry are queued there too, and that registry
    /// stops being supported once its queue is full.
    pub async fn queue_operation(&self, registry: &str, operation: Operation) -> MdipResult<()> {
        if registry == LOCAL_REGISTRY {
            return Ok(());
        }

        let fallback = self.config.fallback_registry.as_str();
        self.db.queue_operation(fallback, operation.clone()).await?;

        if registry != fallback {
            let size = self.db.queue_operation(registry, operation).await?;
            if size >= self.config.max_queue_size {
                let mut supported = self.supported_registries.write().await;
                if supported.iter().any(|r| r == registry) {
                    supported.retain(|r| r != registry);
                    warn!(registry, size, "queue full, registry no longer supported");
                }
            }
        }

        Ok(())
    }

    /// Pending outbound operations for `registry`.
    ///
    /// A mediator polling the queue signals the registry is serviced again,
    /// so it is re-added to the supported set.
    pub async fn get_queue(&self, registry: &str) -> MdipResult<Vec<Operation>> {
        require_valid_registry(registry)?;

        {
            let mut supported = self.supported_registries.write().await;
            if !supported.iter().any(|r| r == registry) {
                supported.push(registry.to_string());
                info!(registry, "registry supported again");
            }
        }

        self.db.get_queue(registry).await
    }

    /// Drop acknowledged operations from a queue.
    pub async fn clear_queue(&self, registry: &str, operations: &[Operation]) -> MdipResult<bool> {
        require_valid_registry(registry)?;
        self.db.clear_queue(registry, operations).await
    }

    /// Registries on which this node currently accepts new operations.
    pub async fn list_registries(&self) -> Vec<String> {
        self.supported_registries.read().await.clone()
    }
}
