// CLI commands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::consensus::ProofOfWork;
use crate::core::Transaction;
use crate::error::{ChainError, Result};
use crate::storage::{Blockchain, UtxoSet};
use crate::wallet::{self, Wallets};

#[derive(Parser)]
#[command(name = "tinychain")]
#[command(about = "Educational proof-of-work blockchain", long_about = None)]
pub struct Cli {
    /// Path of the blockchain database
    #[arg(long, default_value = "blockchain.db")]
    pub db: PathBuf,

    /// Path of the wallet file
    #[arg(long, default_value = "wallet.dat")]
    pub wallet_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a blockchain whose genesis subsidy pays ADDRESS
    Createblockchain {
        #[arg(long)]
        address: String,
    },

    /// Generate a new key pair and print its address
    Createwallet,

    /// List every address in the wallet file
    Listaddresses,

    /// Sum the unspent outputs locked to ADDRESS
    Getbalance {
        #[arg(long)]
        address: String,
    },

    /// Send AMOUNT from FROM to TO, mining the block immediately
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
    },

    /// Print every block from the tip back to genesis
    Printchain,

    /// Rebuild the UTXO index from the chain
    Reindexutxo,
}

/// Executes CLI commands against the configured database and wallet paths.
pub struct CliHandler {
    db_path: PathBuf,
    wallet_path: PathBuf,
}

impl CliHandler {
    pub fn new(db_path: PathBuf, wallet_path: PathBuf) -> Self {
        Self {
            db_path,
            wallet_path,
        }
    }

    pub fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Createblockchain { address } => self.create_blockchain(&address),
            Commands::Createwallet => self.create_wallet(),
            Commands::Listaddresses => self.list_addresses(),
            Commands::Getbalance { address } => self.get_balance(&address),
            Commands::Send { from, to, amount } => self.send(&from, &to, amount),
            Commands::Printchain => self.print_chain(),
            Commands::Reindexutxo => self.reindex_utxo(),
        }
    }

    fn create_blockchain(&self, address: &str) -> Result<()> {
        check_address(address)?;

        let chain = Blockchain::create(&self.db_path, address)?;
        UtxoSet::new(&chain).reindex()?;

        println!("Done! Genesis block: {}", hex::encode(chain.tip()));
        Ok(())
    }

    fn create_wallet(&self) -> Result<()> {
        let mut wallets = Wallets::load(&self.wallet_path)?;
        let address = wallets.create_wallet()?;

        println!("Your new address: {}", address);
        Ok(())
    }

    fn list_addresses(&self) -> Result<()> {
        let wallets = Wallets::load(&self.wallet_path)?;
        for address in wallets.addresses() {
            println!("{}", address);
        }
        Ok(())
    }

    fn get_balance(&self, address: &str) -> Result<()> {
        check_address(address)?;

        let chain = Blockchain::open(&self.db_path)?;
        let pubkey_hash = wallet::pubkey_hash_from_address(address)?;

        let balance: i64 = UtxoSet::new(&chain)
            .find_utxo(&pubkey_hash)?
            .iter()
            .map(|output| output.value)
            .sum();

        println!("Balance of '{}': {}", address, balance);
        Ok(())
    }

    fn send(&self, from: &str, to: &str, amount: i64) -> Result<()> {
        check_address(from)?;
        check_address(to)?;

        let mut chain = Blockchain::open(&self.db_path)?;
        let wallets = Wallets::load(&self.wallet_path)?;

        let spend = wallet::new_spend(from, to, amount, &UtxoSet::new(&chain), &wallets)?;
        // The miner claims the subsidy in the same block that carries the spend.
        let reward = Transaction::new_coinbase(from, "")?;

        let block = chain.mine_block(vec![reward, spend])?;
        UtxoSet::new(&chain).update(&block)?;

        println!("Success!");
        Ok(())
    }

    fn print_chain(&self) -> Result<()> {
        let chain = Blockchain::open(&self.db_path)?;

        for block in chain.iter() {
            let block = block?;

            println!("============ Block {} ============", hex::encode(&block.hash));
            println!("Prev. block: {}", hex::encode(&block.prev_block_hash));
            println!("Timestamp:   {}", block.timestamp);
            println!("Nonce:       {}", block.nonce);
            println!("PoW:         {}", ProofOfWork::new(&block).validate());
            for tx in &block.transactions {
                println!("{}", tx);
            }
            println!();
        }

        Ok(())
    }

    fn reindex_utxo(&self) -> Result<()> {
        let chain = Blockchain::open(&self.db_path)?;
        let utxo_set = UtxoSet::new(&chain);
        utxo_set.reindex()?;

        println!(
            "Done! There are {} transactions in the UTXO set.",
            utxo_set.count_transactions()
        );
        Ok(())
    }
}

fn check_address(address: &str) -> Result<()> {
    if !wallet::validate_address(address) {
        return Err(ChainError::InvalidAddress(address.to_owned()));
    }
    Ok(())
}
