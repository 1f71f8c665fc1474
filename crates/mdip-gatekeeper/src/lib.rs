//! MDIP Gatekeeper
//!
//! The ledger engine of an MDIP node:
//! - operation verification (create, update, delete)
//! - DID resolution by replaying the event log
//! - import and merge of events from other registries, including reorgs
//! - outbound registry queues with backpressure
//! - database maintenance (verify, check)

pub mod cas;
pub mod db;
pub mod did;
pub mod gatekeeper;
pub mod importer;
pub mod maintenance;
pub mod queue;
pub mod resolver;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use cas::{ContentStore, MemoryCas};
pub use db::{GatekeeperDb, MemoryDb};
pub use did::is_valid_did;
pub use gatekeeper::{Gatekeeper, GetDidsOptions, GetDidsResult};
pub use importer::{ImportBatchResult, ImportEventsResult, ImportStatus, ProcessEventsResult};
pub use maintenance::{CheckDidsResult, DidsByType, VerifyDbResult};
pub use resolver::ResolveOptions;
pub use verifier::MAX_CONTROLLER_DEPTH;
