//! MDIP Core: wire types, errors and configuration shared by the
//! gatekeeper, the node and the CLI.

pub mod config;
pub mod document;
pub mod error;
pub mod time;
pub mod types;

pub use config::{GatekeeperConfig, LOCAL_REGISTRY, VALID_REGISTRIES, VALID_VERSIONS};
pub use document::{DidDocument, DocumentMetadata, DocumentTimestamp, MdipDocument};
pub use error::{MdipError, MdipResult};
pub use types::{
    BlockId, BlockInfo, BlockchainAnchor, GatekeeperEvent, Mdip, MdipType, Operation,
    OperationType, PublicJwk, Signature,
};
