use std::collections::BTreeMap;

use quoria_core::{Hash, ModelData, Transaction, TransferTransaction};
use tracing::debug;

use crate::accounts::Accounts;
use crate::error::ChainError;

/// Acceptance check for a transfer against the committed ledger and the
/// current pending set
fn validate_transfer(
    tx: &TransferTransaction,
    accounts: &Accounts,
    pending: &BTreeMap<Hash, Transaction>,
) -> Result<(), ChainError> {
    if tx.amount <= 0 {
        return Err(ChainError::InvalidTransaction(format!(
            "non-positive amount {}",
            tx.amount
        )));
    }
    if tx.from.is_empty() || tx.to.is_empty() {
        return Err(ChainError::InvalidTransaction(
            "empty account key".to_string(),
        ));
    }

    let available = accounts.effective_balance(&tx.from, pending);
    if available < tx.amount {
        return Err(ChainError::InsufficientBalance {
            account: tx.from.clone(),
            available,
            required: tx.amount,
        });
    }
    Ok(())
}

/// Structural check for a model submission
fn validate_model(model: &ModelData) -> Result<(), ChainError> {
    if model.uid.is_empty() {
        return Err(ChainError::InvalidTransaction(
            "model submission without uid".to_string(),
        ));
    }
    if model.intervals_validity.is_empty() {
        return Err(ChainError::InvalidTransaction(
            "model submission without training intervals".to_string(),
        ));
    }
    Ok(())
}

/// Flavor-specific acceptance check applied before a transaction enters
/// the mempool
pub fn validate_transaction(
    tx: &Transaction,
    accounts: &Accounts,
    pending: &BTreeMap<Hash, Transaction>,
) -> Result<(), ChainError> {
    match tx {
        Transaction::Transfer(transfer) => validate_transfer(transfer, accounts, pending),
        Transaction::Model(model) => validate_model(model),
    }
}

/// Re-validate a candidate block set against the committed ledger,
/// returning the largest internally consistent subset.
///
/// The fast path accepts the whole set when its net deltas settle; the
/// fallback walks digests in key order, keeping each transfer only if the
/// accepted set still settles with it included.
pub fn consistent_block_set(
    txs: BTreeMap<Hash, Transaction>,
    accounts: &Accounts,
) -> BTreeMap<Hash, Transaction> {
    if accounts.settles(&txs) {
        return txs;
    }

    let mut accepted: BTreeMap<Hash, Transaction> = BTreeMap::new();
    for (digest, tx) in txs {
        accepted.insert(digest, tx);
        if !accounts.settles(&accepted) {
            let dropped = accepted
                .remove(&digest)
                .map(|tx| tx.uid().to_string())
                .unwrap_or_default();
            debug!("dropping conflicting transaction {dropped} from block set");
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, amount: i64, uid: &str) -> Transaction {
        Transaction::Transfer(TransferTransaction::new(from, to, amount, uid))
    }

    fn as_map(txs: Vec<Transaction>) -> BTreeMap<Hash, Transaction> {
        txs.into_iter().map(|tx| (tx.digest(), tx)).collect()
    }

    #[test]
    fn test_accepts_feasible_transfer() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let tx = transfer("a", "b", 5, "tx-1");
        assert!(validate_transaction(&tx, &accounts, &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_rejects_overdraft() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let tx = transfer("a", "b", 11, "tx-1");
        assert!(matches!(
            validate_transaction(&tx, &accounts, &BTreeMap::new()),
            Err(ChainError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_accepts_spend_of_pending_credit() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let pool = as_map(vec![transfer("a", "b", 5, "tx-1")]);
        let tx = transfer("b", "c", 3, "tx-2");
        assert!(validate_transaction(&tx, &accounts, &pool).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let tx = transfer("a", "b", 0, "tx-1");
        assert!(validate_transaction(&tx, &accounts, &BTreeMap::new()).is_err());
    }

    #[test]
    fn test_model_structural_checks() {
        let accounts = Accounts::new();
        let good = Transaction::Model(ModelData::new("model-1", vec![true, false]));
        assert!(validate_transaction(&good, &accounts, &BTreeMap::new()).is_ok());

        let no_intervals = Transaction::Model(ModelData::new("model-2", vec![]));
        assert!(validate_transaction(&no_intervals, &accounts, &BTreeMap::new()).is_err());
    }

    #[test]
    fn test_consistent_set_keeps_settling_chain() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let set = as_map(vec![
            transfer("a", "b", 5, "tx-1"),
            transfer("b", "c", 3, "tx-2"),
        ]);
        let kept = consistent_block_set(set.clone(), &accounts);
        assert_eq!(kept, set);
    }

    #[test]
    fn test_consistent_set_drops_overdraft() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let good = transfer("a", "b", 5, "tx-1");
        let bad = transfer("z", "b", 100, "tx-2");
        let set = as_map(vec![good.clone(), bad]);

        let kept = consistent_block_set(set, &accounts);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key(&good.digest()));
    }
}
