// Persistent chain store backed by sled

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sled::transaction::ConflictableTransactionResult;

use crate::core::{Block, Serializable, Transaction, TxOutputs};
use crate::error::{ChainError, Result};
use crate::wallet::Wallet;

const BLOCKS_TREE: &[u8] = b"blocks";
const CHAINSTATE_TREE: &[u8] = b"chainstate";
/// Distinguished key whose value is the current tip hash.
const TIP_KEY: &[u8] = b"l";

/// Note embedded in the genesis coinbase.
pub const GENESIS_COINBASE_DATA: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// The chain store: owner of the on-disk blocks and chainstate buckets.
///
/// The blocks tree maps block hash to serialized block, plus the tip key.
/// The chainstate tree maps transaction id to that transaction's unspent
/// outputs and is maintained by [`crate::storage::UtxoSet`].
#[derive(Debug)]
pub struct Blockchain {
    db: sled::Db,
    pub(crate) blocks: sled::Tree,
    pub(crate) chainstate: sled::Tree,
    tip: Vec<u8>,
    path: PathBuf,
}

impl Blockchain {
    /// Create a fresh chain at `path` with a genesis coinbase paying
    /// `address`. Fails if a database already exists there. The caller is
    /// expected to reindex the UTXO bucket next.
    pub fn create<P: AsRef<Path>>(path: P, address: &str) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ChainError::AlreadyExists(path.display().to_string()));
        }

        let coinbase = Transaction::new_coinbase(address, GENESIS_COINBASE_DATA)?;
        let genesis = Block::genesis(coinbase)?;
        log::info!("mined genesis block {}", hex::encode(&genesis.hash));

        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let chainstate = db.open_tree(CHAINSTATE_TREE)?;

        let bytes = genesis.serialize();
        blocks
            .transaction(|tree| -> ConflictableTransactionResult<(), ChainError> {
                tree.insert(genesis.hash.as_slice(), bytes.as_slice())?;
                tree.insert(TIP_KEY, genesis.hash.as_slice())?;
                Ok(())
            })
            .map_err(ChainError::from)?;

        Ok(Self {
            db,
            blocks,
            chainstate,
            tip: genesis.hash.clone(),
            path: path.to_path_buf(),
        })
    }

    /// Open an existing chain at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChainError::NotFound(format!(
                "blockchain at {}",
                path.display()
            )));
        }

        let db = sled::open(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let chainstate = db.open_tree(CHAINSTATE_TREE)?;

        let tip = blocks
            .get(TIP_KEY)?
            .ok_or_else(|| ChainError::CorruptStore("missing tip pointer".to_owned()))?
            .to_vec();

        Ok(Self {
            db,
            blocks,
            chainstate,
            tip,
            path: path.to_path_buf(),
        })
    }

    pub fn tip(&self) -> &[u8] {
        &self.tip
    }

    /// Verify the submitted transactions, mine a block on the current tip and
    /// commit it. The tip pointer and block body move in one store
    /// transaction. The UTXO bucket is untouched; the caller applies
    /// [`crate::storage::UtxoSet::update`] next.
    ///
    /// An invalid submitted transaction is a broken consensus invariant, not
    /// a recoverable condition.
    pub fn mine_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        for tx in &transactions {
            if !self.verify_transaction(tx)? {
                return Err(ChainError::InvalidTransaction(hex::encode(&tx.id)));
            }
        }

        let block = Block::new(transactions, self.tip.clone())?;
        let bytes = block.serialize();

        self.blocks
            .transaction(|tree| -> ConflictableTransactionResult<(), ChainError> {
                tree.insert(block.hash.as_slice(), bytes.as_slice())?;
                tree.insert(TIP_KEY, block.hash.as_slice())?;
                Ok(())
            })
            .map_err(ChainError::from)?;

        self.tip = block.hash.clone();
        log::info!("mined block {}", hex::encode(&block.hash));
        Ok(block)
    }

    /// Iterate blocks from the tip back to genesis.
    pub fn iter(&self) -> ChainIterator<'_> {
        ChainIterator {
            blocks: &self.blocks,
            current_hash: self.tip.clone(),
        }
    }

    /// Linear scan for a transaction by id.
    pub fn find_transaction(&self, id: &[u8]) -> Result<Transaction> {
        for block in self.iter() {
            let block = block?;
            for tx in block.transactions {
                if tx.id == id {
                    return Ok(tx);
                }
            }
        }

        Err(ChainError::NotFound(format!(
            "transaction {}",
            hex::encode(id)
        )))
    }

    /// Sign a transaction's inputs against the outputs they consume.
    pub fn sign_transaction(&self, tx: &mut Transaction, wallet: &Wallet) -> Result<()> {
        let prev_txs = self.previous_transactions(tx)?;
        tx.sign(wallet, &prev_txs)
    }

    /// Check a transaction's input signatures against the chain.
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.previous_transactions(tx)?;
        tx.verify(&prev_txs)
    }

    fn previous_transactions(&self, tx: &Transaction) -> Result<HashMap<Vec<u8>, Transaction>> {
        let mut prev_txs = HashMap::new();
        for vin in &tx.vin {
            let prev_tx = self.find_transaction(&vin.prev_tx_id)?;
            prev_txs.insert(prev_tx.id.clone(), prev_tx);
        }
        Ok(prev_txs)
    }

    /// Walk the whole chain and collect, per transaction, the outputs no
    /// later input has consumed. This is the source of truth the UTXO bucket
    /// is rebuilt from.
    pub fn find_utxo_map(&self) -> Result<HashMap<Vec<u8>, TxOutputs>> {
        let mut utxo: HashMap<Vec<u8>, TxOutputs> = HashMap::new();
        let mut spent: HashMap<Vec<u8>, Vec<i64>> = HashMap::new();

        for block in self.iter() {
            let block = block?;
            for tx in &block.transactions {
                for (index, output) in tx.vout.iter().enumerate() {
                    let index = index as i64;
                    if spent.get(&tx.id).is_some_and(|s| s.contains(&index)) {
                        continue;
                    }
                    utxo.entry(tx.id.clone())
                        .or_default()
                        .0
                        .push((index, output.clone()));
                }

                if !tx.is_coinbase() {
                    for vin in &tx.vin {
                        spent
                            .entry(vin.prev_tx_id.clone())
                            .or_default()
                            .push(vin.out_index);
                    }
                }
            }
        }

        Ok(utxo)
    }

    /// Drop both buckets and remove the database from disk.
    pub fn delete(self) -> Result<()> {
        let Blockchain {
            db,
            blocks,
            chainstate,
            path,
            ..
        } = self;

        drop(blocks);
        drop(chainstate);
        db.drop_tree(BLOCKS_TREE)?;
        db.drop_tree(CHAINSTATE_TREE)?;
        drop(db);

        std::fs::remove_dir_all(&path)?;
        Ok(())
    }
}

/// Tip-to-genesis block iterator. Yields the genesis block last; a missing
/// or undecodable entry surfaces as a corrupt-store error and ends the walk.
pub struct ChainIterator<'a> {
    blocks: &'a sled::Tree,
    current_hash: Vec<u8>,
}

impl Iterator for ChainIterator<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_hash.is_empty() {
            return None;
        }

        let bytes = match self.blocks.get(&self.current_hash) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                let missing = hex::encode(&self.current_hash);
                self.current_hash.clear();
                return Some(Err(ChainError::CorruptStore(format!(
                    "missing block {}",
                    missing
                ))));
            }
            Err(e) => {
                self.current_hash.clear();
                return Some(Err(e.into()));
            }
        };

        match Block::deserialize(&bytes) {
            Ok(block) => {
                self.current_hash = block.prev_block_hash.clone();
                Some(Ok(block))
            }
            Err(e) => {
                self.current_hash.clear();
                Some(Err(e))
            }
        }
    }
}
