use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use k256::ecdsa::{SigningKey, VerifyingKey};
use mdip_core::PublicJwk;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// secp256k1 key pair used to sign operations.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Restore a key pair from a 32-byte secret scalar.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: secret.len(),
            });
        }
        let signing_key =
            SigningKey::from_slice(secret).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Secret scalar, wiped when dropped.
    pub fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_bytes().to_vec())
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public half as a JWK.
    pub fn public_jwk(&self) -> PublicJwk {
        to_jwk(self.verifying_key())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_jwk())
            .finish_non_exhaustive()
    }
}

/// Encode a verifying key as an uncompressed secp256k1 JWK.
pub fn to_jwk(key: &VerifyingKey) -> PublicJwk {
    let point = key.to_encoded_point(false);
    let x = point.x().map(|x| URL_SAFE_NO_PAD.encode(x)).unwrap_or_default();
    let y = point.y().map(|y| URL_SAFE_NO_PAD.encode(y)).unwrap_or_default();
    PublicJwk {
        kty: "EC".into(),
        crv: "secp256k1".into(),
        x,
        y,
    }
}

/// Decode a secp256k1 JWK into a verifying key.
pub fn from_jwk(jwk: &PublicJwk) -> Result<VerifyingKey, CryptoError> {
    if jwk.kty != "EC" || jwk.crv != "secp256k1" {
        return Err(CryptoError::InvalidKey(format!(
            "unsupported key type {}/{}",
            jwk.kty, jwk.crv
        )));
    }
    let x = decode_coordinate(&jwk.x)?;
    let y = decode_coordinate(&jwk.y)?;
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn decode_coordinate(s: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}
