// Hashing utilities

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Single SHA-256 hash.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&digest);
    result
}

/// RIPEMD160(SHA256(data)) - used to lock outputs to a public key.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}

/// First 4 bytes of SHA256(SHA256(payload)) - the address checksum.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut result = [0u8; 4];
    result.copy_from_slice(&second[..4]);
    result
}
