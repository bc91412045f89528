//! Machine execution boundary.
//!
//! The bytecode interpreter is an external collaborator. It is pure with
//! respect to global state: every effect of a run flows back through
//! [`ExecutionOutcome`], never by mutating the ledger directly.
//!
//! Malformed programs are the machine's problem: it must absorb them as a
//! deterministic no-op-with-fee outcome. An `Err` from `execute` therefore
//! means the machine itself cannot proceed deterministically, which the
//! scheduler treats as fatal for block processing: two nodes could disagree
//! on state from here on, and that cannot be recovered from safely.

use lib_types::{AccountId, Amount, AtId, BlockHeight};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MachineError {
    #[error("machine cannot execute deterministically: {0}")]
    Halted(String),
}

/// Read-only block/account context handed to one execution.
#[derive(Debug, Clone)]
pub struct ExecutionEnv {
    pub at_id: AtId,
    pub block_height: BlockHeight,
    pub block_timestamp: u64,
    /// The contract account's balance entering this execution.
    pub balance: Amount,
    pub min_activation_balance: Amount,
}

/// A transfer the contract asked for during execution. Settled at block
/// finalization, in the order produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub recipient: AccountId,
    pub amount: Amount,
    pub message: Option<Vec<u8>>,
}

/// Everything one execution produced.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Updated memory image (decompressed form).
    pub new_image: Vec<u8>,
    /// Fee owed by the contract's account for this run.
    pub fee_charged: Amount,
    pub transfers: Vec<TransferRequest>,
}

/// The opaque "machine execution" capability.
pub trait MachineExecutor: Send + Sync {
    fn execute(
        &self,
        env: &ExecutionEnv,
        image: &[u8],
        step_budget: u32,
    ) -> Result<ExecutionOutcome, MachineError>;
}
