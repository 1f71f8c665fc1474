//! The Gatekeeper node runtime.
//!
//! Opens storage, builds the ledger, serves the HTTP API and runs the
//! periodic status report and DID garbage collection.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mdip_gatekeeper::{CheckDidsResult, Gatekeeper};

use crate::config::NodeConfig;
use crate::state::NodeState;
use crate::storage::Storage;

/// A running Gatekeeper node.
pub struct GatekeeperNode {
    config: NodeConfig,
    state: Option<Arc<NodeState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl GatekeeperNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            state: None,
            tasks: Vec::new(),
        }
    }

    /// Open storage, report status, start the maintenance loops and the API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting Gatekeeper node");

        let storage = Arc::new(Storage::open(&self.config.storage.data_dir)?);
        tracing::info!(path = %self.config.storage.data_dir.display(), "storage initialized");

        let gatekeeper = Gatekeeper::new(self.config.gatekeeper.clone(), storage.clone(), storage)?;
        gatekeeper.start().await?;
        let state = Arc::new(NodeState::new(Arc::new(gatekeeper)));

        report_status(&state).await;

        let status_minutes = self.config.maintenance.status_interval_minutes;
        if status_minutes > 0 {
            tracing::info!(minutes = status_minutes, "status reports enabled");
            self.tasks.push(tokio::spawn(status_loop(state.clone(), status_minutes)));
        } else {
            tracing::info!("status reports disabled");
        }

        let gc_minutes = self.config.maintenance.gc_interval_minutes;
        if gc_minutes > 0 {
            tracing::info!(minutes = gc_minutes, "DID garbage collection enabled");
            self.tasks.push(tokio::spawn(gc_loop(state.clone(), gc_minutes)));
        } else {
            tracing::info!("DID garbage collection disabled");
        }

        tracing::info!(prefix = %state.gatekeeper.did_prefix(), "DID prefix");
        tracing::info!(
            registries = ?state.gatekeeper.list_registries().await,
            "supported registries"
        );

        let listener = TcpListener::bind(self.config.api_addr()).await?;
        let api_state = state.clone();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(listener, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        }));
        state.set_ready(true);

        self.state = Some(state);
        Ok(())
    }

    /// Stop background tasks and flush storage.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Gatekeeper node");

        for task in self.tasks.drain(..) {
            task.abort();
        }

        if let Some(state) = self.state.take() {
            state.set_ready(false);
            state.gatekeeper.stop().await?;
        }

        tracing::info!("node stopped");
        Ok(())
    }

    pub fn state(&self) -> Option<&Arc<NodeState>> {
        self.state.as_ref()
    }
}

async fn report_status(state: &NodeState) {
    match state.refresh_check().await {
        Ok(check) => log_check(state.uptime_seconds(), &check),
        Err(e) => tracing::error!(error = %e, "status check failed"),
    }
}

fn log_check(uptime_seconds: u64, check: &CheckDidsResult) {
    tracing::info!(
        total = check.total,
        agents = check.by_type.agents,
        assets = check.by_type.assets,
        confirmed = check.by_type.confirmed,
        unconfirmed = check.by_type.unconfirmed,
        ephemeral = check.by_type.ephemeral,
        invalid = check.by_type.invalid,
        by_registry = ?check.by_registry,
        by_version = ?check.by_version,
        events_queue = check.events_queue.len(),
        uptime_seconds,
        "status"
    );
}

async fn status_loop(state: Arc<NodeState>, minutes: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
    // First tick fires immediately; startup already reported.
    interval.tick().await;
    loop {
        interval.tick().await;
        report_status(&state).await;
    }
}

/// Verify the database every `minutes`, starting one interval after startup.
async fn gc_loop(state: Arc<NodeState>, minutes: u64) {
    let period = Duration::from_secs(minutes * 60);
    loop {
        tokio::time::sleep(period).await;
        match state.gatekeeper.verify_db().await {
            Ok(result) => {
                tracing::info!(
                    total = result.total,
                    verified = result.verified,
                    expired = result.expired,
                    invalid = result.invalid,
                    next_minutes = minutes,
                    "DID garbage collection"
                );
                if let Err(e) = state.refresh_check().await {
                    tracing::error!(error = %e, "status check failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "DID garbage collection failed"),
        }
    }
}
