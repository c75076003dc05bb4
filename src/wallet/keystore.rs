// Key management and addresses

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::generic_array::GenericArray;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::EncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::core::hash::{checksum, hash160};
use crate::error::{ChainError, Result};

/// Address version prefix.
pub const VERSION: u8 = 0x00;
/// Length of the double-SHA256 checksum suffix.
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

const PUBKEY_HASH_LEN: usize = 20;
/// Raw public key length: two 32-byte P-256 coordinates, no SEC1 tag.
const RAW_PUBKEY_LEN: usize = 64;
const SIGNATURE_LEN: usize = 64;

/// An ECDSA P-256 key pair.
///
/// The public key is the raw X||Y coordinate concatenation; the secret key is
/// the raw scalar. Both are kept as bytes so the wallet file stays a plain
/// serialized map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    secret_key: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let point = signing_key.verifying_key().to_encoded_point(false);

        Ok(Self {
            secret_key: signing_key.to_bytes().to_vec(),
            // Strip the 0x04 uncompressed-point tag.
            public_key: point.as_bytes()[1..].to_vec(),
        })
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Base58 of VERSION || hash160(pubkey) || checksum.
    pub fn address(&self) -> String {
        let mut payload = Vec::with_capacity(1 + PUBKEY_HASH_LEN + ADDRESS_CHECKSUM_LEN);
        payload.push(VERSION);
        payload.extend_from_slice(&hash160(&self.public_key));
        let check = checksum(&payload);
        payload.extend_from_slice(&check);

        bs58::encode(payload).into_string()
    }

    /// ECDSA-sign a 32-byte digest. The signature is the fixed 64-byte r||s
    /// encoding with each half left-padded to 32 bytes, so verification can
    /// split it at the midpoint.
    pub fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::from_slice(&self.secret_key)
            .map_err(|e| ChainError::Crypto(format!("bad secret key: {}", e)))?;
        let signature: Signature = signing_key
            .sign_prehash(digest)
            .map_err(|e| ChainError::Crypto(format!("signing failed: {}", e)))?;

        Ok(signature.to_bytes().to_vec())
    }
}

/// Hash of a raw public key: RIPEMD160(SHA256(pubkey)).
pub fn hash_pubkey(pubkey: &[u8]) -> Vec<u8> {
    hash160(pubkey).to_vec()
}

/// Verify a 64-byte r||s signature over `digest` under a raw X||Y public key.
/// Any malformed key or signature verifies as false.
pub fn verify_digest(pubkey: &[u8], digest: &[u8], signature: &[u8]) -> bool {
    if pubkey.len() != RAW_PUBKEY_LEN || signature.len() != SIGNATURE_LEN {
        return false;
    }

    let point = EncodedPoint::from_untagged_bytes(GenericArray::from_slice(pubkey));
    let Ok(verifying_key) = VerifyingKey::from_encoded_point(&point) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    verifying_key.verify_prehash(digest, &signature).is_ok()
}

/// Checksum-validate an address. False on any decoding or length failure.
pub fn validate_address(address: &str) -> bool {
    let Ok(payload) = bs58::decode(address).into_vec() else {
        return false;
    };
    if payload.len() != 1 + PUBKEY_HASH_LEN + ADDRESS_CHECKSUM_LEN {
        return false;
    }

    let (versioned, actual) = payload.split_at(payload.len() - ADDRESS_CHECKSUM_LEN);
    actual == checksum(versioned).as_slice()
}

/// Extract the 20-byte pubkey hash an address locks to.
pub fn pubkey_hash_from_address(address: &str) -> Result<Vec<u8>> {
    if !validate_address(address) {
        return Err(ChainError::InvalidAddress(address.to_owned()));
    }

    let payload = bs58::decode(address)
        .into_vec()
        .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;
    Ok(payload[1..payload.len() - ADDRESS_CHECKSUM_LEN].to_vec())
}

/// The wallet file: a serialized map from address to key pair.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    #[serde(skip)]
    path: PathBuf,
}

impl Wallets {
    /// Load the collection from `path`; a missing file is an empty collection.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut wallets = if path.exists() {
            let data = fs::read(&path)?;
            serde_json::from_slice::<Wallets>(&data)?
        } else {
            Wallets::default()
        };
        wallets.path = path;

        Ok(wallets)
    }

    /// Generate a new wallet, persist the collection, return its address.
    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.address();

        self.wallets.insert(address.clone(), wallet);
        self.save()?;

        Ok(address)
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;

    #[test]
    fn new_wallet_has_raw_keys() {
        let wallet = Wallet::new().unwrap();
        assert_eq!(wallet.public_key().len(), RAW_PUBKEY_LEN);
        assert_eq!(wallet.secret_key.len(), 32);
    }

    #[test]
    fn address_validates() {
        let wallet = Wallet::new().unwrap();
        assert!(validate_address(&wallet.address()));
    }

    #[test]
    fn corrupted_address_fails_validation() {
        let wallet = Wallet::new().unwrap();
        let address = wallet.address();

        // Swap one character in the middle for a different alphabet character.
        let mut chars: Vec<char> = address.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == '3' { '4' } else { '3' };
        let tampered: String = chars.into_iter().collect();

        assert!(!validate_address(&tampered));
    }

    #[test]
    fn rejects_garbage_addresses() {
        assert!(!validate_address(""));
        assert!(!validate_address("0OIl not base58"));
        assert!(!validate_address("abc"));
    }

    #[test]
    fn base58_round_trips_leading_zeros() {
        let cases: [&[u8]; 4] = [&[], &[0, 0, 0], &[0, 255, 0, 1], &[0x00, 0x61, 0x62]];
        for bytes in cases {
            let encoded = bs58::encode(bytes).into_string();
            assert_eq!(bs58::decode(&encoded).into_vec().unwrap(), bytes);
        }
    }

    #[test]
    fn pubkey_hash_round_trips_through_address() {
        let wallet = Wallet::new().unwrap();
        let from_address = pubkey_hash_from_address(&wallet.address()).unwrap();
        assert_eq!(from_address, hash_pubkey(wallet.public_key()));
    }

    #[test]
    fn pubkey_hash_from_bad_address_errors() {
        let err = pubkey_hash_from_address("not an address").unwrap_err();
        assert!(matches!(err, ChainError::InvalidAddress(_)));
    }

    #[test]
    fn sign_and_verify_digest() {
        let wallet = Wallet::new().unwrap();
        let digest = sha256(b"payload");

        let signature = wallet.sign_digest(&digest).unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(verify_digest(wallet.public_key(), &digest, &signature));
    }

    #[test]
    fn verify_rejects_wrong_key_and_digest() {
        let wallet = Wallet::new().unwrap();
        let other = Wallet::new().unwrap();
        let digest = sha256(b"payload");
        let signature = wallet.sign_digest(&digest).unwrap();

        assert!(!verify_digest(other.public_key(), &digest, &signature));
        assert!(!verify_digest(wallet.public_key(), &sha256(b"other"), &signature));
        assert!(!verify_digest(wallet.public_key(), &digest, &[0u8; 64]));
        assert!(!verify_digest(&[], &digest, &signature));
    }

    #[test]
    fn wallets_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");

        let mut wallets = Wallets::load(&path).unwrap();
        assert!(wallets.addresses().is_empty());

        let address = wallets.create_wallet().unwrap();
        assert!(wallets.get_wallet(&address).is_some());

        let reloaded = Wallets::load(&path).unwrap();
        assert_eq!(reloaded.addresses(), vec![address.clone()]);
        assert_eq!(
            reloaded.get_wallet(&address).unwrap().address(),
            address
        );
    }
}
