//! Engine error taxonomy.
//!
//! Three classes matter for block processing:
//!
//! - `Validation`: rejected before any engine state is mutated (deployment
//!   parameter checks). Surfaced to the caller, never fatal.
//! - `Consistency` / `MachineHalt` / `InvalidTransaction`: fatal for the
//!   block being processed. Continuing would risk consensus divergence, so
//!   the caller must abort block application and must not advance height.
//! - `Storage` / `Ledger`: propagated from collaborators; treated as fatal
//!   for the current block.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::machine::MachineError;
use crate::store::StorageError;

/// Engine result type
pub type AtResult<T> = Result<T, AtError>;

#[derive(Error, Debug)]
pub enum AtError {
    /// Deployment parameters rejected before any state was touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Engine invariant violated (double settlement, buffer reuse,
    /// non-monotonic block heights). Fatal for the block.
    #[error("consistency violation: {0}")]
    Consistency(String),

    /// The machine reported it cannot execute deterministically.
    /// Fatal: two nodes could disagree on state from here on.
    #[error("machine halt for contract {at_id}: {source}")]
    MachineHalt {
        at_id: lib_types::AtId,
        source: MachineError,
    },

    /// A synthesized settlement transaction failed construction.
    /// Fatal for the block; the transfer must not be dropped silently.
    #[error("invalid settlement transaction: {0}")]
    InvalidTransaction(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AtError {
    /// True when processing of the current block must abort and the node
    /// must not advance its height.
    pub fn is_fatal_for_block(&self) -> bool {
        !matches!(self, AtError::Validation(_))
    }
}
