/// Protocol and node errors shared by every MDIP crate.
#[derive(Debug, thiserror::Error)]
pub enum MdipError {
    /// Malformed DID syntax or a DID that cannot be used in this context.
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    /// A well-formed DID with no events in the local log.
    #[error("Invalid DID: unknown {0}")]
    UnknownDid(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MdipError {
    /// True for either flavour of DID error.
    pub fn is_invalid_did(&self) -> bool {
        matches!(self, Self::InvalidDid(_) | Self::UnknownDid(_))
    }
}

pub type MdipResult<T> = Result<T, MdipError>;
