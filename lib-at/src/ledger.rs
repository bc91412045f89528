//! Consumed ledger interfaces and an in-memory reference implementation.
//!
//! The account ledger and the transaction database belong to the
//! surrounding node; the engine only consumes these two contracts. Whether
//! a debit may drive a balance negative is the ledger's account-apply rule,
//! not the engine's: no sign special-casing happens here.

use std::collections::BTreeMap;
use std::sync::Mutex;

use lib_types::{AccountId, Amount, TxId};
use thiserror::Error;

use crate::transaction::AtPayment;

/// Ledger layer result type
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("balance overflow on account {0}")]
    BalanceOverflow(AccountId),

    #[error("transaction store error: {0}")]
    TransactionStore(String),
}

/// Account balance operations the settler needs.
pub trait AccountLedger: Send + Sync {
    /// Ensure `id` exists, creating it with a zero balance if unseen.
    fn get_or_create_account(&self, id: AccountId) -> LedgerResult<()>;

    /// Current balance; zero for an account that does not exist yet.
    fn balance(&self, id: AccountId) -> LedgerResult<Amount>;

    /// Apply a signed delta to an existing account.
    fn apply_balance_delta(&self, id: AccountId, delta: Amount) -> LedgerResult<()>;
}

/// Persisted-transaction lookups and batch insertion.
pub trait TransactionDb: Send + Sync {
    fn has_transaction(&self, id: TxId) -> LedgerResult<bool>;

    /// Persist a settlement batch in one call.
    fn save_batch(&self, transactions: &[AtPayment]) -> LedgerResult<()>;
}

// ============================================================================
// IN-MEMORY REFERENCE IMPLEMENTATION
// ============================================================================

/// Reference ledger for tests and integration harnesses.
///
/// `snapshot`/`restore` exist so tests can simulate the crash/replay and
/// reorg behavior of a real transactional ledger.
#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<BTreeMap<AccountId, Amount>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the full balance table.
    pub fn snapshot(&self) -> BTreeMap<AccountId, Amount> {
        self.accounts.lock().expect("ledger mutex poisoned").clone()
    }

    /// Replace the balance table (crash/reorg simulation in tests).
    pub fn restore(&self, snapshot: BTreeMap<AccountId, Amount>) {
        *self.accounts.lock().expect("ledger mutex poisoned") = snapshot;
    }

    pub fn set_balance(&self, id: AccountId, amount: Amount) {
        self.accounts
            .lock()
            .expect("ledger mutex poisoned")
            .insert(id, amount);
    }
}

impl AccountLedger for MemoryLedger {
    fn get_or_create_account(&self, id: AccountId) -> LedgerResult<()> {
        self.accounts
            .lock()
            .expect("ledger mutex poisoned")
            .entry(id)
            .or_insert(0);
        Ok(())
    }

    fn balance(&self, id: AccountId) -> LedgerResult<Amount> {
        Ok(self
            .accounts
            .lock()
            .expect("ledger mutex poisoned")
            .get(&id)
            .copied()
            .unwrap_or(0))
    }

    fn apply_balance_delta(&self, id: AccountId, delta: Amount) -> LedgerResult<()> {
        let mut accounts = self.accounts.lock().expect("ledger mutex poisoned");
        let balance = accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        *balance = balance
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow(id))?;
        Ok(())
    }
}

/// Reference transaction database for tests and integration harnesses.
#[derive(Default)]
pub struct MemoryTransactionDb {
    transactions: Mutex<BTreeMap<TxId, AtPayment>>,
}

impl MemoryTransactionDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions
            .lock()
            .expect("txdb mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: TxId) -> Option<AtPayment> {
        self.transactions
            .lock()
            .expect("txdb mutex poisoned")
            .get(&id)
            .cloned()
    }
}

impl TransactionDb for MemoryTransactionDb {
    fn has_transaction(&self, id: TxId) -> LedgerResult<bool> {
        Ok(self
            .transactions
            .lock()
            .expect("txdb mutex poisoned")
            .contains_key(&id))
    }

    fn save_batch(&self, transactions: &[AtPayment]) -> LedgerResult<()> {
        let mut store = self.transactions.lock().expect("txdb mutex poisoned");
        for tx in transactions {
            store.insert(tx.id, tx.clone());
        }
        Ok(())
    }
}
