// Block data structure

use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::consensus::ProofOfWork;
use crate::core::merkle::MerkleTree;
use crate::core::serialize::{
    corrupt, read_int_be, read_var_bytes, read_varint, write_int_be, write_var_bytes,
    write_varint, Serializable,
};
use crate::core::transaction::Transaction;
use crate::error::Result;

/// A mined block. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Unix seconds at mining time.
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    /// Hash of the preceding block; empty for the genesis block.
    pub prev_block_hash: Vec<u8>,
    /// The proof-of-work digest found for this block.
    pub hash: Vec<u8>,
    pub nonce: i64,
}

impl Block {
    /// Assemble and mine a block on top of `prev_block_hash`.
    pub fn new(transactions: Vec<Transaction>, prev_block_hash: Vec<u8>) -> Result<Self> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        let mut block = Self {
            timestamp,
            transactions,
            prev_block_hash,
            hash: Vec::new(),
            nonce: 0,
        };

        let (nonce, hash) = ProofOfWork::new(&block).run()?;
        block.hash = hash.to_vec();
        block.nonce = nonce;

        Ok(block)
    }

    /// Mine the genesis block from its coinbase transaction.
    pub fn genesis(coinbase: Transaction) -> Result<Self> {
        Self::new(vec![coinbase], Vec::new())
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash.is_empty()
    }

    /// Merkle root over the canonical serializations of this block's
    /// transactions; part of the proof-of-work preimage.
    pub fn hash_transactions(&self) -> Vec<u8> {
        let leaves: Vec<Vec<u8>> = self.transactions.iter().map(|tx| tx.serialize()).collect();
        MerkleTree::new(&leaves).root().to_vec()
    }
}

impl Serializable for Block {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_int_be(&mut buf, self.timestamp);
        write_var_bytes(&mut buf, &self.prev_block_hash);
        write_var_bytes(&mut buf, &self.hash);
        write_int_be(&mut buf, self.nonce);

        write_varint(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            write_var_bytes(&mut buf, &tx.serialize());
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let timestamp = read_int_be(&mut cursor).map_err(corrupt)?;
        let prev_block_hash = read_var_bytes(&mut cursor).map_err(corrupt)?;
        let hash = read_var_bytes(&mut cursor).map_err(corrupt)?;
        let nonce = read_int_be(&mut cursor).map_err(corrupt)?;

        let tx_count = read_varint(&mut cursor).map_err(corrupt)? as usize;
        let mut transactions = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            let tx_bytes = read_var_bytes(&mut cursor).map_err(corrupt)?;
            transactions.push(Transaction::deserialize(&tx_bytes)?);
        }

        Ok(Self {
            timestamp,
            transactions,
            prev_block_hash,
            hash,
            nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn mined_genesis() -> Block {
        let wallet = Wallet::new().unwrap();
        let coinbase = Transaction::new_coinbase(&wallet.address(), "test genesis").unwrap();
        Block::genesis(coinbase).unwrap()
    }

    #[test]
    fn genesis_has_empty_prev_hash() {
        let block = mined_genesis();
        assert!(block.is_genesis());
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
    }

    #[test]
    fn mined_block_passes_validation() {
        let block = mined_genesis();
        assert_eq!(block.hash.len(), 32);
        assert!(ProofOfWork::new(&block).validate());
    }

    #[test]
    fn serialization_round_trip() {
        let block = mined_genesis();
        let decoded = Block::deserialize(&block.serialize()).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn truncated_bytes_are_corrupt() {
        let block = mined_genesis();
        let bytes = block.serialize();
        assert!(Block::deserialize(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn merkle_root_of_single_transaction() {
        use crate::core::hash::sha256;

        let block = mined_genesis();
        let leaf = sha256(&block.transactions[0].serialize());

        let mut combined = Vec::with_capacity(64);
        combined.extend_from_slice(&leaf);
        combined.extend_from_slice(&leaf);
        assert_eq!(block.hash_transactions(), sha256(&combined));
    }
}
