//! Canonical Primitive Types for Consensus
//!
//! Rule: No String identifiers in consensus state. Ever.
//!
//! These types are the foundational building blocks for all consensus-critical
//! data structures. They are designed to be:
//! - Fixed-size (no dynamic allocation)
//! - Deterministically serializable
//! - Efficient to copy and compare

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Block height in the chain (0-indexed)
pub type BlockHeight = u64;

/// Token amounts in the smallest unit.
///
/// Signed: settlement debits may drive a balance negative where the ledger's
/// account-apply rules permit it, and balance deltas are naturally signed.
pub type Amount = i64;

// ============================================================================
// IDENTIFIER TYPES
// ============================================================================

/// Identifier of a deployed automated-transaction contract.
///
/// Derived from the deployment transaction. Globally unique among all
/// contracts ever deployed; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AtId(pub u64);

impl AtId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The account that holds the contract's balance shares its id.
    pub const fn account(&self) -> AccountId {
        AccountId(self.0)
    }
}

impl fmt::Display for AtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AtId> for AccountId {
    fn from(id: AtId) -> Self {
        id.account()
    }
}

/// Deterministic transaction identifier (first 8 bytes of the content hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl TxId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Derive an id from the leading bytes of a 32-byte content hash.
    pub fn from_hash_bytes(hash: &[u8; 32]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&hash[..8]);
        Self(u64::from_le_bytes(raw))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_account_shares_id() {
        let at = AtId::new(42);
        assert_eq!(at.account(), AccountId::new(42));
        assert_eq!(AccountId::from(at).as_u64(), 42);
    }

    #[test]
    fn tx_id_from_hash_is_deterministic() {
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&1234u64.to_le_bytes());
        assert_eq!(TxId::from_hash_bytes(&hash), TxId::new(1234));
    }

    #[test]
    fn ids_order_numerically() {
        let mut ids = vec![AtId::new(7), AtId::new(3), AtId::new(11)];
        ids.sort();
        assert_eq!(ids, vec![AtId::new(3), AtId::new(7), AtId::new(11)]);
    }
}
