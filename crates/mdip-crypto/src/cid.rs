//! CIDv1 content identifiers over SHA-256.

use serde::Serialize;

use crate::canonical::canonical_bytes;
use crate::error::CryptoError;
use crate::hashing::hash;

const CID_V1: u64 = 0x01;
const SHA2_256: u64 = 0x12;
const SHA2_256_LEN: u64 = 32;

/// Multicodec for JSON documents.
pub const CODEC_JSON: u64 = 0x0200;
/// Multicodec for raw bytes.
pub const CODEC_RAW: u64 = 0x55;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648Lower { padding: false };

fn write_varint(mut n: u64, out: &mut Vec<u8>) {
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

fn read_varint(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(9) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, &bytes[i + 1..]));
        }
    }
    None
}

/// CIDv1 of `data` under `codec`, multibase base32 encoded.
pub fn cid_for(codec: u64, data: &[u8]) -> String {
    let digest = hash(data);
    let mut bytes = Vec::with_capacity(36 + 2);
    write_varint(CID_V1, &mut bytes);
    write_varint(codec, &mut bytes);
    write_varint(SHA2_256, &mut bytes);
    write_varint(SHA2_256_LEN, &mut bytes);
    bytes.extend_from_slice(&digest);
    format!("b{}", base32::encode(BASE32, &bytes))
}

/// Content id of the canonical JSON form of `value`.
pub fn json_cid<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    Ok(cid_for(CODEC_JSON, &canonical_bytes(value)?))
}

/// Content id of raw bytes.
pub fn raw_cid(data: &[u8]) -> String {
    cid_for(CODEC_RAW, data)
}

/// Accepts base32 CIDv1 (`b...`), base58btc CIDv1 (`z...`) and CIDv0 (`Qm...`).
pub fn is_valid_cid(s: &str) -> bool {
    if s.len() == 46 && s.starts_with("Qm") {
        return match bs58::decode(s).into_vec() {
            Ok(bytes) => is_valid_multihash(&bytes),
            Err(_) => false,
        };
    }
    let bytes = if let Some(rest) = s.strip_prefix('b') {
        if rest.bytes().any(|c| c.is_ascii_uppercase()) {
            return false;
        }
        match base32::decode(BASE32, rest) {
            Some(bytes) => bytes,
            None => return false,
        }
    } else if let Some(rest) = s.strip_prefix('z') {
        match bs58::decode(rest).into_vec() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        }
    } else {
        return false;
    };
    match read_varint(&bytes) {
        Some((CID_V1, rest)) => match read_varint(rest) {
            Some((_codec, multihash)) => is_valid_multihash(multihash),
            None => false,
        },
        _ => false,
    }
}

fn is_valid_multihash(bytes: &[u8]) -> bool {
    let Some((_code, rest)) = read_varint(bytes) else {
        return false;
    };
    let Some((len, digest)) = read_varint(rest) else {
        return false;
    };
    len > 0 && digest.len() as u64 == len
}
