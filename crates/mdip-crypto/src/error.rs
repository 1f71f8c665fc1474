use mdip_core::MdipError;

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for MdipError {
    fn from(err: CryptoError) -> Self {
        MdipError::Crypto(err.to_string())
    }
}
