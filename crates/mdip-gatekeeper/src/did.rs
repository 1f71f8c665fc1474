use mdip_core::types::did_suffix;
use mdip_crypto::is_valid_cid;

/// `did:<method...>:<cid>` with at least three segments and a valid content id.
pub fn is_valid_did(did: &str) -> bool {
    did.starts_with("did:") && did.split(':').count() >= 3 && is_valid_cid(did_suffix(did))
}

/// Loose syntax check used for signer fields.
pub fn is_did_format(did: &str) -> bool {
    did.starts_with("did:")
}
