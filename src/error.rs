// Crate-wide error type

use thiserror::Error;

/// All failure kinds surfaced by the library.
///
/// Recoverable kinds (`InvalidAddress`, `NotFound`, `AlreadyExists`,
/// `InsufficientFunds`) propagate to the CLI, which prints a one-line
/// diagnostic and exits non-zero. `InvalidTransaction` during mining and
/// `CorruptStore` indicate a broken consensus invariant and are treated as
/// fatal by the caller rather than repaired.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("blockchain already exists at {0}")]
    AlreadyExists(String),

    #[error("insufficient funds: {available} available, {required} required")]
    InsufficientFunds { available: i64, required: i64 },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("corrupt store: {0}")]
    CorruptStore(String),

    #[error("proof-of-work nonce range exhausted without meeting the target")]
    MineExhausted,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("wallet file error: {0}")]
    WalletFile(#[from] serde_json::Error),

    #[error("system clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] sled::Error),
}

pub type Result<T> = std::result::Result<T, ChainError>;

// sled transactions abort with the crate error; unwrap it back out so `?`
// works at the call site.
impl From<sled::transaction::TransactionError<ChainError>> for ChainError {
    fn from(err: sled::transaction::TransactionError<ChainError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => ChainError::Store(e),
        }
    }
}
