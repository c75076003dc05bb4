// Proof of Work

use sha2::{Digest, Sha256};

use crate::core::serialize::int_to_be;
use crate::core::Block;
use crate::error::{ChainError, Result};

/// Fixed difficulty: a valid block hash is numerically below 2^(256 - 24).
pub const TARGET_BITS: u32 = 24;

/// Hash search and validator over a block's proof-of-work preimage.
///
/// The preimage for nonce n is
/// `prev_block_hash || merkle_root || be(timestamp) || be(TARGET_BITS) || be(n)`
/// and the digest is a single SHA-256. The target is kept as a 32-byte
/// big-endian array so the strict-less-than test is a plain byte compare.
pub struct ProofOfWork<'a> {
    block: &'a Block,
    target: [u8; 32],
}

impl<'a> ProofOfWork<'a> {
    pub fn new(block: &'a Block) -> Self {
        Self {
            block,
            target: target_bytes(TARGET_BITS),
        }
    }

    /// The preimage without the trailing nonce bytes.
    fn preimage_prefix(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&self.block.prev_block_hash);
        data.extend_from_slice(&self.block.hash_transactions());
        data.extend_from_slice(&int_to_be(self.block.timestamp));
        data.extend_from_slice(&int_to_be(TARGET_BITS as i64));
        data
    }

    fn digest(&self, prefix: &[u8], nonce: i64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(prefix);
        hasher.update(int_to_be(nonce));
        hasher.finalize().into()
    }

    /// Search nonces from 0 upward until the digest falls below the target.
    pub fn run(&self) -> Result<(i64, [u8; 32])> {
        let prefix = self.preimage_prefix();

        for nonce in 0..i64::MAX {
            let hash = self.digest(&prefix, nonce);
            if hash.as_slice() < self.target.as_slice() {
                log::debug!("found nonce {} -> {}", nonce, hex::encode(hash));
                return Ok((nonce, hash));
            }

            if nonce > 0 && nonce % 100_000 == 0 {
                log::debug!("mining: {} nonces tried", nonce);
            }
        }

        Err(ChainError::MineExhausted)
    }

    /// Recompute the digest with the stored nonce and re-run the target test.
    pub fn validate(&self) -> bool {
        let prefix = self.preimage_prefix();
        let hash = self.digest(&prefix, self.block.nonce);
        hash.as_slice() < self.target.as_slice()
    }
}

/// 2^(256 - bits) as a 32-byte big-endian integer.
fn target_bytes(bits: u32) -> [u8; 32] {
    let bit = 256 - bits as usize;
    let mut target = [0u8; 32];
    target[31 - bit / 8] = 1 << (bit % 8);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::wallet::Wallet;

    #[test]
    fn target_is_one_shifted() {
        let target = target_bytes(24);
        // 2^232: byte 2 of the big-endian representation holds the single bit.
        let mut expected = [0u8; 32];
        expected[2] = 1;
        assert_eq!(target, expected);
    }

    #[test]
    fn target_comparison_bounds() {
        let target = target_bytes(24);
        assert!([0u8; 32].as_slice() < target.as_slice());
        assert!([0xffu8; 32].as_slice() > target.as_slice());
        // The target itself is not strictly below the target.
        assert!(!(target.as_slice() < target.as_slice()));
    }

    #[test]
    fn mined_block_meets_target() {
        let wallet = Wallet::new().unwrap();
        let coinbase = Transaction::new_coinbase(&wallet.address(), "pow test").unwrap();
        let block = crate::core::Block::genesis(coinbase).unwrap();

        let pow = ProofOfWork::new(&block);
        assert!(pow.validate());
        assert!(block.hash.as_slice() < target_bytes(TARGET_BITS).as_slice());
    }

    #[test]
    fn tampered_nonce_fails_validation() {
        let wallet = Wallet::new().unwrap();
        let coinbase = Transaction::new_coinbase(&wallet.address(), "pow test").unwrap();
        let mut block = crate::core::Block::genesis(coinbase).unwrap();

        block.nonce += 1;
        // A successor nonce satisfying the target as well is astronomically
        // unlikely at 24 bits.
        assert!(!ProofOfWork::new(&block).validate());
    }
}
