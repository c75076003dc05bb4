// Transaction data structures and the signing protocol

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

use crate::core::hash::sha256;
use crate::core::serialize::{
    corrupt, read_int_be, read_var_bytes, read_varint, write_int_be, write_var_bytes,
    write_varint, Serializable,
};
use crate::error::{ChainError, Result};
use crate::wallet::{pubkey_hash_from_address, verify_digest, Wallet};

/// Mining reward paid by every coinbase output.
pub const SUBSIDY: i64 = 10;

/// Transaction input - references an output of an earlier transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Id of the transaction holding the referenced output; empty for coinbase.
    pub prev_tx_id: Vec<u8>,
    /// Index of the referenced output; -1 for coinbase.
    pub out_index: i64,
    /// 64-byte r||s signature, empty until signed.
    pub signature: Vec<u8>,
    /// Raw 64-byte X||Y public key of the spender; arbitrary payload for coinbase.
    pub pubkey: Vec<u8>,
}

/// Transaction output - locks an amount to a public key hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: i64,
    pub pubkey_hash: Vec<u8>,
}

impl TxOutput {
    /// Create an output locked to the pubkey hash encoded in `address`.
    pub fn new(value: i64, address: &str) -> Result<Self> {
        Ok(Self {
            value,
            pubkey_hash: pubkey_hash_from_address(address)?,
        })
    }

    pub fn is_locked_with(&self, pubkey_hash: &[u8]) -> bool {
        self.pubkey_hash == pubkey_hash
    }
}

/// The chainstate record for one transaction: its still-unspent outputs,
/// keyed by their original position so later spends can resolve an
/// `out_index` even after earlier-indexed outputs were consumed. Kept in
/// ascending index order so incremental updates and full rebuilds produce
/// byte-identical records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOutputs(pub Vec<(i64, TxOutput)>);

impl Serializable for TxOutputs {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, self.0.len() as u64);
        for (index, output) in &self.0 {
            write_int_be(&mut buf, *index);
            write_int_be(&mut buf, output.value);
            write_var_bytes(&mut buf, &output.pubkey_hash);
        }
        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let count = read_varint(&mut cursor).map_err(corrupt)? as usize;

        let mut outputs = Vec::with_capacity(count);
        for _ in 0..count {
            let index = read_int_be(&mut cursor).map_err(corrupt)?;
            let value = read_int_be(&mut cursor).map_err(corrupt)?;
            let pubkey_hash = read_var_bytes(&mut cursor).map_err(corrupt)?;
            outputs.push((index, TxOutput { value, pubkey_hash }));
        }

        Ok(Self(outputs))
    }
}

/// A transfer of value: inputs consuming earlier outputs, outputs locking
/// value to recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// SHA-256 of the transaction serialized with this field cleared.
    pub id: Vec<u8>,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// Create a coinbase transaction paying the subsidy to `to`.
    ///
    /// An empty note is replaced with a marker naming the recipient, which
    /// keeps the genesis transaction deterministic for a given address.
    pub fn new_coinbase(to: &str, note: &str) -> Result<Self> {
        let note = if note.is_empty() {
            format!("Regard to '{}'", to)
        } else {
            note.to_owned()
        };

        let vin = TxInput {
            prev_tx_id: Vec::new(),
            out_index: -1,
            signature: Vec::new(),
            pubkey: note.into_bytes(),
        };
        let vout = TxOutput::new(SUBSIDY, to)?;

        let mut tx = Self {
            id: Vec::new(),
            vin: vec![vin],
            vout: vec![vout],
        };
        tx.id = tx.hash();
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prev_tx_id.is_empty() && self.vin[0].out_index == -1
    }

    /// SHA-256 of the canonical serialization with the id cleared.
    pub fn hash(&self) -> Vec<u8> {
        let mut copy = self.clone();
        copy.id = Vec::new();
        sha256(&copy.serialize()).to_vec()
    }

    /// Copy with every input's signature and pubkey emptied; the signing and
    /// verification preimage is built from this.
    pub fn trimmed_copy(&self) -> Self {
        let vin = self
            .vin
            .iter()
            .map(|vin| TxInput {
                prev_tx_id: vin.prev_tx_id.clone(),
                out_index: vin.out_index,
                signature: Vec::new(),
                pubkey: Vec::new(),
            })
            .collect();

        Self {
            id: self.id.clone(),
            vin,
            vout: self.vout.clone(),
        }
    }

    /// Sign every input against the outputs it consumes.
    ///
    /// For input i, the trimmed copy temporarily carries the referenced
    /// output's pubkey hash in vin[i].pubkey; the digest of that copy is what
    /// gets signed. `prev_txs` maps transaction id to the transaction holding
    /// the referenced output.
    pub fn sign(&mut self, wallet: &Wallet, prev_txs: &HashMap<Vec<u8>, Transaction>) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        self.check_prev_txs(prev_txs)?;

        let mut trimmed = self.trimmed_copy();
        for index in 0..self.vin.len() {
            let digest = trimmed_digest(&mut trimmed, index, prev_txs)?;
            self.vin[index].signature = wallet.sign_digest(&digest)?;
        }

        Ok(())
    }

    /// Check every input's signature. Returns false on the first input that
    /// fails; a missing referenced transaction is an error, not a false.
    pub fn verify(&self, prev_txs: &HashMap<Vec<u8>, Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        self.check_prev_txs(prev_txs)?;

        let mut trimmed = self.trimmed_copy();
        for (index, vin) in self.vin.iter().enumerate() {
            let digest = trimmed_digest(&mut trimmed, index, prev_txs)?;
            if !verify_digest(&vin.pubkey, &digest, &vin.signature) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn check_prev_txs(&self, prev_txs: &HashMap<Vec<u8>, Transaction>) -> Result<()> {
        for vin in &self.vin {
            if !prev_txs.contains_key(&vin.prev_tx_id) {
                return Err(ChainError::InvalidTransaction(format!(
                    "referenced transaction {} is missing",
                    hex::encode(&vin.prev_tx_id)
                )));
            }
        }
        Ok(())
    }
}

/// The per-input signing digest: the trimmed copy's hash with vin[index]
/// carrying the referenced output's pubkey hash. Restores the trimmed copy
/// before returning.
fn trimmed_digest(
    trimmed: &mut Transaction,
    index: usize,
    prev_txs: &HashMap<Vec<u8>, Transaction>,
) -> Result<Vec<u8>> {
    let prev_tx = &prev_txs[&trimmed.vin[index].prev_tx_id];
    let out_index = trimmed.vin[index].out_index;
    let referenced = prev_tx
        .vout
        .get(usize::try_from(out_index).map_err(|_| bad_out_index(out_index))?)
        .ok_or_else(|| bad_out_index(out_index))?;

    trimmed.vin[index].signature = Vec::new();
    trimmed.vin[index].pubkey = referenced.pubkey_hash.clone();

    let digest = trimmed.hash();
    trimmed.id = digest.clone();
    trimmed.vin[index].pubkey = Vec::new();

    Ok(digest)
}

fn bad_out_index(out_index: i64) -> ChainError {
    ChainError::InvalidTransaction(format!("referenced output index {} out of range", out_index))
}

impl Serializable for Transaction {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, &self.id);

        write_varint(&mut buf, self.vin.len() as u64);
        for vin in &self.vin {
            write_var_bytes(&mut buf, &vin.prev_tx_id);
            write_int_be(&mut buf, vin.out_index);
            write_var_bytes(&mut buf, &vin.signature);
            write_var_bytes(&mut buf, &vin.pubkey);
        }

        write_varint(&mut buf, self.vout.len() as u64);
        for vout in &self.vout {
            write_int_be(&mut buf, vout.value);
            write_var_bytes(&mut buf, &vout.pubkey_hash);
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let id = read_var_bytes(&mut cursor).map_err(corrupt)?;

        let vin_count = read_varint(&mut cursor).map_err(corrupt)? as usize;
        let mut vin = Vec::with_capacity(vin_count);
        for _ in 0..vin_count {
            vin.push(TxInput {
                prev_tx_id: read_var_bytes(&mut cursor).map_err(corrupt)?,
                out_index: read_int_be(&mut cursor).map_err(corrupt)?,
                signature: read_var_bytes(&mut cursor).map_err(corrupt)?,
                pubkey: read_var_bytes(&mut cursor).map_err(corrupt)?,
            });
        }

        let vout_count = read_varint(&mut cursor).map_err(corrupt)? as usize;
        let mut vout = Vec::with_capacity(vout_count);
        for _ in 0..vout_count {
            vout.push(TxOutput {
                value: read_int_be(&mut cursor).map_err(corrupt)?,
                pubkey_hash: read_var_bytes(&mut cursor).map_err(corrupt)?,
            });
        }

        Ok(Self { id, vin, vout })
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "--- Transaction {}:", hex::encode(&self.id))?;
        for (i, vin) in self.vin.iter().enumerate() {
            writeln!(f, "     Input {}:", i)?;
            writeln!(f, "       TXID:      {}", hex::encode(&vin.prev_tx_id))?;
            writeln!(f, "       Out:       {}", vin.out_index)?;
            writeln!(f, "       Signature: {}", hex::encode(&vin.signature))?;
            writeln!(f, "       PubKey:    {}", hex::encode(&vin.pubkey))?;
        }
        for (i, vout) in self.vout.iter().enumerate() {
            writeln!(f, "     Output {}:", i)?;
            writeln!(f, "       Value:  {}", vout.value)?;
            writeln!(f, "       Script: {}", hex::encode(&vout.pubkey_hash))?;
        }
        Ok(())
    }
}
