// Wallets: key pairs, addresses, spend construction

mod keystore;
mod tx_builder;

pub use keystore::{
    hash_pubkey, pubkey_hash_from_address, validate_address, verify_digest, Wallet, Wallets,
    ADDRESS_CHECKSUM_LEN, VERSION,
};
pub use tx_builder::new_spend;
