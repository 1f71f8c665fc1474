pub mod canonical;
pub mod cid;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod signing;

pub use canonical::{canonical_bytes, canonicalize};
pub use cid::{is_valid_cid, json_cid, raw_cid};
pub use error::CryptoError;
pub use hashing::{hash, hash_json, hash_message};
pub use keys::{from_jwk, to_jwk, KeyPair};
pub use signing::{sign_hash, verify_sig};
