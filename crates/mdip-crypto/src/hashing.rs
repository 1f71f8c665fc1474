use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_bytes;
use crate::error::CryptoError;

/// SHA-256 digest (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using SHA-256.
pub fn hash(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hex SHA-256 of a message.
pub fn hash_message(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Hex SHA-256 of the canonical JSON form of `value`.
pub fn hash_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    Ok(hash_message(&canonical_bytes(value)?))
}
