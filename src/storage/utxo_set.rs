// UTXO index over the chainstate bucket

use std::collections::HashMap;

use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};

use crate::core::{Block, Serializable, TxOutput, TxOutputs};
use crate::error::{ChainError, Result};
use crate::storage::Blockchain;

/// Derived index of unspent outputs, keyed by transaction id.
///
/// The index exists so balance and spend queries scan the chainstate bucket
/// instead of the whole chain. It borrows the store for the duration of each
/// call and is always reconstructible from the chain via [`UtxoSet::reindex`].
pub struct UtxoSet<'a> {
    chain: &'a Blockchain,
}

impl<'a> UtxoSet<'a> {
    pub fn new(chain: &'a Blockchain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Blockchain {
        self.chain
    }

    /// Rebuild the chainstate bucket from scratch: walk the chain, then swap
    /// the stale records for the rebuilt map in one store transaction, so a
    /// crash leaves either the old index or the new one, never an empty
    /// bucket.
    pub fn reindex(&self) -> Result<()> {
        let utxo = self.chain.find_utxo_map()?;
        let stale: Vec<Vec<u8>> = self
            .chain
            .chainstate
            .iter()
            .keys()
            .map(|key| key.map(|k| k.to_vec()))
            .collect::<std::result::Result<_, sled::Error>>()?;

        self.chain
            .chainstate
            .transaction(|tree| -> ConflictableTransactionResult<(), ChainError> {
                for key in &stale {
                    tree.remove(key.as_slice())?;
                }
                for (tx_id, outputs) in &utxo {
                    tree.insert(tx_id.as_slice(), outputs.serialize())?;
                }
                Ok(())
            })
            .map_err(ChainError::from)?;

        log::info!("reindexed {} transactions", utxo.len());
        Ok(())
    }

    /// Apply a freshly mined tip block: consumed outputs leave the bucket,
    /// the block's own outputs enter it. One store transaction.
    pub fn update(&self, block: &Block) -> Result<()> {
        self.chain
            .chainstate
            .transaction(|tree| -> ConflictableTransactionResult<(), ChainError> {
                for tx in &block.transactions {
                    if !tx.is_coinbase() {
                        for vin in &tx.vin {
                            let record = tree.get(vin.prev_tx_id.as_slice())?.ok_or_else(|| {
                                ConflictableTransactionError::Abort(ChainError::CorruptStore(
                                    format!(
                                        "no chainstate entry for spent transaction {}",
                                        hex::encode(&vin.prev_tx_id)
                                    ),
                                ))
                            })?;
                            let outputs = TxOutputs::deserialize(&record)
                                .map_err(ConflictableTransactionError::Abort)?;

                            let remaining = TxOutputs(
                                outputs
                                    .0
                                    .into_iter()
                                    .filter(|(index, _)| *index != vin.out_index)
                                    .collect(),
                            );

                            if remaining.0.is_empty() {
                                tree.remove(vin.prev_tx_id.as_slice())?;
                            } else {
                                tree.insert(vin.prev_tx_id.as_slice(), remaining.serialize())?;
                            }
                        }
                    }

                    let fresh = TxOutputs(
                        tx.vout
                            .iter()
                            .enumerate()
                            .map(|(index, output)| (index as i64, output.clone()))
                            .collect(),
                    );
                    tree.insert(tx.id.as_slice(), fresh.serialize())?;
                }
                Ok(())
            })
            .map_err(ChainError::from)?;

        Ok(())
    }

    /// Accumulate outputs locked to `pubkey_hash` until `amount` is covered.
    /// Returns the accumulated value and the referenced (txid, out index)
    /// pairs; first-fit in bucket iteration order.
    pub fn find_spendable(
        &self,
        pubkey_hash: &[u8],
        amount: i64,
    ) -> Result<(i64, HashMap<Vec<u8>, Vec<i64>>)> {
        let mut unspent: HashMap<Vec<u8>, Vec<i64>> = HashMap::new();
        let mut accumulated = 0;

        for entry in self.chain.chainstate.iter() {
            let (tx_id, record) = entry?;
            let outputs = TxOutputs::deserialize(&record)?;

            for (index, output) in &outputs.0 {
                if output.is_locked_with(pubkey_hash) && accumulated < amount {
                    accumulated += output.value;
                    unspent.entry(tx_id.to_vec()).or_default().push(*index);
                }
            }

            if accumulated >= amount {
                break;
            }
        }

        Ok((accumulated, unspent))
    }

    /// Every unspent output locked to `pubkey_hash`.
    pub fn find_utxo(&self, pubkey_hash: &[u8]) -> Result<Vec<TxOutput>> {
        let mut utxos = Vec::new();

        for entry in self.chain.chainstate.iter() {
            let (_, record) = entry?;
            let outputs = TxOutputs::deserialize(&record)?;

            for (_, output) in outputs.0 {
                if output.is_locked_with(pubkey_hash) {
                    utxos.push(output);
                }
            }
        }

        Ok(utxos)
    }

    /// Number of transactions with at least one unspent output.
    pub fn count_transactions(&self) -> usize {
        self.chain.chainstate.len()
    }
}
