use std::collections::BTreeMap;

use chrono::Utc;
use mdip_core::time::parse_time;
use mdip_core::types::did_suffix;
use mdip_core::{GatekeeperEvent, MdipResult, MdipType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::gatekeeper::Gatekeeper;
use crate::resolver::ResolveOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyDbResult {
    pub total: usize,
    pub verified: usize,
    pub expired: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidsByType {
    pub agents: usize,
    pub assets: usize,
    pub confirmed: usize,
    pub unconfirmed: usize,
    pub ephemeral: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDidsResult {
    pub total: usize,
    pub by_type: DidsByType,
    pub by_registry: BTreeMap<String, usize>,
    pub by_version: BTreeMap<u32, usize>,
    pub events_queue: Vec<GatekeeperEvent>,
}

impl Gatekeeper {
    /// Re-verify every stored DID, pruning invalid and expired ones.
    ///
    /// Verified permanent DIDs are remembered and skipped on later runs
    /// until their log changes. The pending import queue is cleared.
    pub async fn verify_db(&self) -> MdipResult<VerifyDbResult> {
        let dids = self.all_dids().await?;
        let total = dids.len();
        let mut result = VerifyDbResult {
            total,
            verified: self.verified_dids.len(),
            ..Default::default()
        };

        for (i, did) in dids.iter().enumerate() {
            let n = i + 1;
            if self.verified_dids.contains(did_suffix(did)) {
                continue;
            }

            let doc = match self
                .resolve_did(did, ResolveOptions { verify: true, ..Default::default() })
                .await
            {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(n, total, did = %did, error = %e, "removing invalid DID");
                    self.db.delete_events(did).await?;
                    result.invalid += 1;
                    continue;
                }
            };

            let valid_until = doc.mdip.as_ref().and_then(|m| m.valid_until.as_deref());
            match valid_until.and_then(parse_time) {
                Some(expires) if expires < Utc::now() => {
                    warn!(n, total, did = %did, "removing expired DID");
                    self.db.delete_events(did).await?;
                    result.expired += 1;
                }
                Some(expires) => {
                    let minutes = (expires - Utc::now()).num_minutes();
                    debug!(n, total, did = %did, minutes, "ephemeral DID expiring");
                    result.verified += 1;
                }
                None => {
                    debug!(n, total, did = %did, "DID verified");
                    self.verified_dids.insert(did_suffix(did).to_string());
                    result.verified += 1;
                }
            }
        }

        self.events_queue.lock().await.clear();

        info!(
            total = result.total,
            verified = result.verified,
            expired = result.expired,
            invalid = result.invalid,
            "verifyDb"
        );
        Ok(result)
    }

    /// Summarise stored DIDs by type, registry and version.
    pub async fn check_dids(&self, dids: Option<Vec<String>>) -> MdipResult<CheckDidsResult> {
        let dids = match dids {
            Some(dids) => dids,
            None => self.all_dids().await?,
        };

        let mut result = CheckDidsResult {
            total: dids.len(),
            ..Default::default()
        };

        for did in &dids {
            let doc = match self.resolve_did(did, ResolveOptions::default()).await {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(did = %did, error = %e, "cannot resolve");
                    result.by_type.invalid += 1;
                    continue;
                }
            };

            if let Some(mdip) = doc.mdip.as_ref() {
                match mdip.mdip_type {
                    MdipType::Agent => result.by_type.agents += 1,
                    MdipType::Asset => result.by_type.assets += 1,
                }
                if mdip.valid_until.is_some() {
                    result.by_type.ephemeral += 1;
                }
                *result.by_registry.entry(mdip.registry.clone()).or_default() += 1;
            }

            if doc.metadata().and_then(|m| m.confirmed).unwrap_or(false) {
                result.by_type.confirmed += 1;
            } else {
                result.by_type.unconfirmed += 1;
            }

            if let Some(version) = doc.version() {
                *result.by_version.entry(version).or_default() += 1;
            }
        }

        result.events_queue = self.events_queue.lock().await.clone();
        Ok(result)
    }
}
