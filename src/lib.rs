// Educational proof-of-work blockchain: an append-only ledger of signed
// transactions with a persistent UTXO index.

pub mod cli;
pub mod consensus;
pub mod core;
pub mod error;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use crate::cli::{Cli, CliHandler, Commands};
pub use crate::consensus::{ProofOfWork, TARGET_BITS};
pub use crate::core::{Block, MerkleTree, Serializable, Transaction, TxInput, TxOutput, TxOutputs, SUBSIDY};
pub use crate::error::{ChainError, Result};
pub use crate::storage::{Blockchain, UtxoSet};
pub use crate::wallet::{Wallet, Wallets};
