//! Settlement: collecting contract-execution effects and converting them
//! into ledger transactions at block finalization.
//!
//! The buffer is owned by the block-processing context: created empty when
//! a block begins, drained exactly once by the settler, and discarded (not
//! replayed) when a block is rolled back. Nothing here touches the ledger
//! until the settler runs.

pub mod buffer;
pub mod settler;

pub use buffer::{PendingTransfer, SettlementBuffer};
pub use settler::Settler;
