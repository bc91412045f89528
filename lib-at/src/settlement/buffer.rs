//! Per-block accumulator for contract-execution effects.

use std::collections::BTreeMap;

use lib_types::{AccountId, Amount, AtId, BlockHeight};

use crate::error::{AtError, AtResult};

/// A transfer recorded during contract execution, settled later in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub sender: AtId,
    pub recipient: AccountId,
    pub amount: Amount,
    pub message: Option<Vec<u8>>,
}

/// Collects every fee and transfer produced while executing contracts for
/// one block. No ledger side effects happen through this type.
///
/// A height guard makes misuse loud: heights must strictly increase, and a
/// new block may not begin until the previous block's contents were settled
/// (`clear`) or rolled back (`discard`). Violations are consistency errors,
/// fatal for block processing.
#[derive(Debug, Default)]
pub struct SettlementBuffer {
    fees: BTreeMap<AtId, Amount>,
    transfers: Vec<PendingTransfer>,
    current_height: Option<BlockHeight>,
    last_settled_height: Option<BlockHeight>,
}

impl SettlementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the buffer for one block's processing.
    pub fn begin_block(&mut self, height: BlockHeight) -> AtResult<()> {
        if let Some(open) = self.current_height {
            return Err(AtError::Consistency(format!(
                "block {height} began while block {open} is still being processed"
            )));
        }
        if !self.fees.is_empty() || !self.transfers.is_empty() {
            return Err(AtError::Consistency(format!(
                "block {height} began with an uncleared settlement buffer"
            )));
        }
        if let Some(last) = self.last_settled_height {
            if height <= last {
                return Err(AtError::Consistency(format!(
                    "block height {height} does not advance past settled height {last}"
                )));
            }
        }
        self.current_height = Some(height);
        Ok(())
    }

    /// Record the fee owed by a contract for this block's execution.
    /// Last write wins per contract per block: entries are overwritten,
    /// not summed (matching the buffer's map semantics).
    pub fn record_fee(&mut self, at_id: AtId, amount: Amount) -> AtResult<()> {
        self.require_open()?;
        self.fees.insert(at_id, amount);
        Ok(())
    }

    /// Append a transfer. Never merged; insertion order becomes the
    /// settlement transaction order.
    pub fn record_transfer(&mut self, transfer: PendingTransfer) -> AtResult<()> {
        self.require_open()?;
        self.transfers.push(transfer);
        Ok(())
    }

    pub fn fees(&self) -> &BTreeMap<AtId, Amount> {
        &self.fees
    }

    pub fn transfers(&self) -> &[PendingTransfer] {
        &self.transfers
    }

    pub fn current_height(&self) -> Option<BlockHeight> {
        self.current_height
    }

    pub fn is_empty(&self) -> bool {
        self.fees.is_empty() && self.transfers.is_empty()
    }

    /// Drain after settlement. Called exactly once per block, by the
    /// settler, after the ledger effects were applied.
    pub fn clear(&mut self) -> AtResult<()> {
        let height = self.current_height.take().ok_or_else(|| {
            AtError::Consistency("settlement buffer cleared outside block processing".to_string())
        })?;
        self.fees.clear();
        self.transfers.clear();
        self.last_settled_height = Some(height);
        Ok(())
    }

    /// Drop accumulated effects without settling them: the rollback path.
    /// The buffered values of a rolled-back block must never be replayed.
    pub fn discard(&mut self) {
        self.fees.clear();
        self.transfers.clear();
        self.current_height = None;
    }

    fn require_open(&self) -> AtResult<()> {
        if self.current_height.is_none() {
            return Err(AtError::Consistency(
                "settlement effect recorded outside block processing".to_string(),
            ));
        }
        Ok(())
    }
}
