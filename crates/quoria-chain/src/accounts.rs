use std::collections::BTreeMap;

use quoria_core::{Hash, Transaction, TransferTransaction};

/// The financial account ledger: account key to integer balance.
///
/// Mutated only on block append (under the chain lock); feasibility
/// queries net the pending mempool deltas on top of committed balances so
/// a transfer can spend coins it receives in the same round.
#[derive(Debug, Clone, Default)]
pub struct Accounts {
    balances: BTreeMap<String, i64>,
}

impl Accounts {
    pub fn new() -> Self {
        Accounts::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Accounts {
            balances: entries.into_iter().collect(),
        }
    }

    /// Committed balance of an account; unknown accounts hold zero
    pub fn balance(&self, account: &str) -> i64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Apply one committed transfer
    pub fn apply(&mut self, tx: &TransferTransaction) {
        *self.balances.entry(tx.from.clone()).or_insert(0) -= tx.amount;
        *self.balances.entry(tx.to.clone()).or_insert(0) += tx.amount;
    }

    /// Balance of an account with the pending set's credits and debits
    /// netted in
    pub fn effective_balance(&self, account: &str, pending: &BTreeMap<Hash, Transaction>) -> i64 {
        let mut balance = self.balance(account);
        for tx in pending.values() {
            if let Transaction::Transfer(transfer) = tx {
                if transfer.from == account {
                    balance -= transfer.amount;
                }
                if transfer.to == account {
                    balance += transfer.amount;
                }
            }
        }
        balance
    }

    /// Whether applying every transfer in the set leaves no account
    /// negative. Order-independent: only the net deltas matter.
    pub fn settles(&self, txs: &BTreeMap<Hash, Transaction>) -> bool {
        let mut deltas: BTreeMap<&str, i64> = BTreeMap::new();
        for tx in txs.values() {
            if let Transaction::Transfer(transfer) = tx {
                *deltas.entry(transfer.from.as_str()).or_insert(0) -= transfer.amount;
                *deltas.entry(transfer.to.as_str()).or_insert(0) += transfer.amount;
            }
        }
        deltas
            .iter()
            .all(|(account, delta)| self.balance(account) + delta >= 0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.balances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, amount: i64, uid: &str) -> Transaction {
        Transaction::Transfer(TransferTransaction::new(from, to, amount, uid))
    }

    fn pending(txs: Vec<Transaction>) -> BTreeMap<Hash, Transaction> {
        txs.into_iter().map(|tx| (tx.digest(), tx)).collect()
    }

    #[test]
    fn test_apply_moves_balance() {
        let mut accounts = Accounts::from_entries([("a".to_string(), 10)]);
        accounts.apply(&TransferTransaction::new("a", "b", 4, "tx-1"));
        assert_eq!(accounts.balance("a"), 6);
        assert_eq!(accounts.balance("b"), 4);
    }

    #[test]
    fn test_effective_balance_nets_pending() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let pool = pending(vec![transfer("a", "b", 5, "tx-1")]);

        assert_eq!(accounts.effective_balance("a", &pool), 5);
        // b can spend coins it receives from the same pending set
        assert_eq!(accounts.effective_balance("b", &pool), 5);
    }

    #[test]
    fn test_settles_chained_transfers() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let set = pending(vec![
            transfer("a", "b", 5, "tx-1"),
            transfer("b", "c", 3, "tx-2"),
        ]);
        assert!(accounts.settles(&set));
    }

    #[test]
    fn test_settles_rejects_overdraft() {
        let accounts = Accounts::from_entries([("a".to_string(), 10)]);
        let set = pending(vec![transfer("a", "b", 11, "tx-1")]);
        assert!(!accounts.settles(&set));
    }
}
