// Spend transaction construction

use crate::core::{Transaction, TxInput, TxOutput};
use crate::error::{ChainError, Result};
use crate::storage::UtxoSet;
use crate::wallet::{hash_pubkey, Wallets};

/// Build and sign a transaction moving `amount` from `from` to `to`.
///
/// Inputs are chosen by the UTXO index's first-fit scan; the difference
/// between the accumulated inputs and `amount` returns to the sender as a
/// change output.
pub fn new_spend(
    from: &str,
    to: &str,
    amount: i64,
    utxo_set: &UtxoSet,
    wallets: &Wallets,
) -> Result<Transaction> {
    if amount <= 0 {
        return Err(ChainError::InvalidTransaction(format!(
            "amount {} must be positive",
            amount
        )));
    }

    let wallet = wallets
        .get_wallet(from)
        .ok_or_else(|| ChainError::NotFound(format!("wallet for address {}", from)))?;
    let pubkey_hash = hash_pubkey(wallet.public_key());

    let (accumulated, outputs) = utxo_set.find_spendable(&pubkey_hash, amount)?;
    if accumulated < amount {
        return Err(ChainError::InsufficientFunds {
            available: accumulated,
            required: amount,
        });
    }

    let mut vin = Vec::new();
    for (tx_id, indexes) in outputs {
        for out_index in indexes {
            vin.push(TxInput {
                prev_tx_id: tx_id.clone(),
                out_index,
                signature: Vec::new(),
                pubkey: wallet.public_key().to_vec(),
            });
        }
    }

    let mut vout = vec![TxOutput::new(amount, to)?];
    if accumulated > amount {
        vout.push(TxOutput::new(accumulated - amount, from)?);
    }

    let mut tx = Transaction {
        id: Vec::new(),
        vin,
        vout,
    };
    tx.id = tx.hash();
    utxo_set.chain().sign_transaction(&mut tx, wallet)?;

    log::debug!(
        "built spend {}: {} -> {} ({})",
        hex::encode(&tx.id),
        from,
        to,
        amount
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SUBSIDY;
    use crate::storage::Blockchain;

    struct Fixture {
        _dir: tempfile::TempDir,
        chain: Blockchain,
        wallets: Wallets,
        funded: String,
        other: String,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut wallets = Wallets::load(dir.path().join("wallet.dat")).unwrap();
        let funded = wallets.create_wallet().unwrap();
        let other = wallets.create_wallet().unwrap();

        let chain = Blockchain::create(dir.path().join("chain"), &funded).unwrap();
        UtxoSet::new(&chain).reindex().unwrap();

        Fixture {
            _dir: dir,
            chain,
            wallets,
            funded,
            other,
        }
    }

    #[test]
    fn spend_with_change() {
        let fx = fixture();
        let utxo_set = UtxoSet::new(&fx.chain);

        let tx = new_spend(&fx.funded, &fx.other, 4, &utxo_set, &fx.wallets).unwrap();

        assert_eq!(tx.vin.len(), 1);
        assert_eq!(tx.vout.len(), 2);
        assert_eq!(tx.vout[0].value, 4);
        assert_eq!(tx.vout[1].value, SUBSIDY - 4);
        assert!(fx.chain.verify_transaction(&tx).unwrap());
    }

    #[test]
    fn exact_spend_has_no_change_output() {
        let fx = fixture();
        let utxo_set = UtxoSet::new(&fx.chain);

        let tx = new_spend(&fx.funded, &fx.other, SUBSIDY, &utxo_set, &fx.wallets).unwrap();
        assert_eq!(tx.vout.len(), 1);
        assert_eq!(tx.vout[0].value, SUBSIDY);
    }

    #[test]
    fn overspend_is_insufficient_funds() {
        let fx = fixture();
        let utxo_set = UtxoSet::new(&fx.chain);

        let err = new_spend(&fx.funded, &fx.other, 100, &utxo_set, &fx.wallets).unwrap_err();
        assert!(matches!(
            err,
            ChainError::InsufficientFunds {
                available: SUBSIDY,
                required: 100
            }
        ));
    }

    #[test]
    fn unknown_sender_is_not_found() {
        let fx = fixture();
        let utxo_set = UtxoSet::new(&fx.chain);

        // A wallet file that has never seen the sender's address.
        let empty = Wallets::load(fx._dir.path().join("elsewhere.dat")).unwrap();

        let err = new_spend(&fx.funded, &fx.other, 1, &utxo_set, &empty).unwrap_err();
        assert!(matches!(err, ChainError::NotFound(_)));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let fx = fixture();
        let utxo_set = UtxoSet::new(&fx.chain);

        for amount in [0, -3] {
            let err = new_spend(&fx.funded, &fx.other, amount, &utxo_set, &fx.wallets).unwrap_err();
            assert!(matches!(err, ChainError::InvalidTransaction(_)));
        }
    }
}
