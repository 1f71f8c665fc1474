use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::Signature;
use mdip_core::PublicJwk;

use crate::error::CryptoError;
use crate::keys::{from_jwk, KeyPair};

fn decode_digest(hash_hex: &str) -> Result<Vec<u8>, CryptoError> {
    let digest = hex::decode(hash_hex).map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
    if digest.len() != 32 {
        return Err(CryptoError::InvalidInput(format!(
            "digest must be 32 bytes, got {}",
            digest.len()
        )));
    }
    Ok(digest)
}

/// Sign a hex SHA-256 digest, returning the compact 64-byte signature as hex.
pub fn sign_hash(hash_hex: &str, keypair: &KeyPair) -> Result<String, CryptoError> {
    let digest = decode_digest(hash_hex)?;
    let signature: Signature = keypair
        .signing_key()
        .sign_prehash(&digest)
        .map_err(|e| CryptoError::SigningError(e.to_string()))?;
    Ok(hex::encode(signature.to_bytes()))
}

/// Check a compact hex signature over a hex digest against a JWK.
///
/// Malformed input of any kind verifies as `false`.
pub fn verify_sig(hash_hex: &str, signature_hex: &str, jwk: &PublicJwk) -> bool {
    let Ok(digest) = decode_digest(hash_hex) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    let Ok(key) = from_jwk(jwk) else {
        return false;
    };
    key.verify_prehash(&digest, &signature).is_ok()
}
