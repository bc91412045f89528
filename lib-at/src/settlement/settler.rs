//! Conversion of buffered effects into irreversible ledger effects.

use lib_types::Amount;
use tracing::debug;

use crate::block::BlockContext;
use crate::error::{AtError, AtResult};
use crate::ledger::{AccountLedger, TransactionDb};
use crate::settlement::SettlementBuffer;
use crate::transaction::AtPayment;

/// Drains the settlement buffer into the ledger, exactly once per block.
///
/// Two-phase by construction: every synthesized transaction is built and
/// validated before the first balance is touched, so the fatal construction
/// path aborts with zero ledger effects. The caller wraps the whole block
/// in the store's begin/rollback bracket, which covers the remaining
/// mutation phase.
pub struct Settler<'a> {
    ledger: &'a dyn AccountLedger,
    txdb: &'a dyn TransactionDb,
}

impl<'a> Settler<'a> {
    pub fn new(ledger: &'a dyn AccountLedger, txdb: &'a dyn TransactionDb) -> Self {
        Self { ledger, txdb }
    }

    /// Settle the block's accumulated fees and transfers.
    ///
    /// Returns the newly persisted transactions (replayed duplicates are
    /// skipped, not re-inserted).
    pub fn settle(
        &self,
        block: &BlockContext,
        buffer: &mut SettlementBuffer,
    ) -> AtResult<Vec<AtPayment>> {
        match buffer.current_height() {
            Some(height) if height == block.height => {}
            Some(height) => {
                return Err(AtError::Consistency(format!(
                    "settling block {} against a buffer opened for block {height}",
                    block.height
                )))
            }
            None => {
                return Err(AtError::Consistency(format!(
                    "settling block {} without an open settlement buffer",
                    block.height
                )))
            }
        }

        // Phase 1: synthesize everything. Any failure here is fatal and
        // happens before the ledger is touched.
        let mut payments = Vec::with_capacity(buffer.transfers().len());
        for (index, transfer) in buffer.transfers().iter().enumerate() {
            payments.push(AtPayment::build(
                block,
                index as u32,
                transfer.sender,
                transfer.recipient,
                transfer.amount,
                transfer.message.clone(),
            )?);
        }

        // Idempotent replay: anything already persisted is applied to the
        // ledger again (the crash rolled those balances back) but not
        // re-inserted.
        let mut fresh = Vec::with_capacity(payments.len());
        for payment in payments {
            if !self.txdb.has_transaction(payment.id)? {
                fresh.push(payment);
            }
        }

        // Phase 2: debit execution fees. Each entry is an independent
        // debit; iteration order does not affect the result.
        let mut total_fees: Amount = 0;
        for (at_id, fee) in buffer.fees() {
            self.ledger.apply_balance_delta(at_id.account(), -*fee)?;
            total_fees += *fee;
        }

        // Phase 3: apply transfers in recorded order, auto-creating
        // recipients.
        for transfer in buffer.transfers() {
            self.ledger
                .apply_balance_delta(transfer.sender.account(), -transfer.amount)?;
            self.ledger.get_or_create_account(transfer.recipient)?;
            self.ledger
                .apply_balance_delta(transfer.recipient, transfer.amount)?;
        }

        // Phase 4: persist the batch in one call. Skipped entirely when
        // empty.
        if !fresh.is_empty() {
            self.txdb.save_batch(&fresh)?;
        }

        debug!(
            height = block.height,
            fees = total_fees,
            transfers = buffer.transfers().len(),
            persisted = fresh.len(),
            "settled block"
        );

        // Phase 5: the buffer is done for this block.
        buffer.clear()?;

        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, MemoryTransactionDb};
    use crate::settlement::PendingTransfer;
    use lib_types::{AccountId, AtId};

    fn funded_ledger() -> MemoryLedger {
        let ledger = MemoryLedger::new();
        ledger.set_balance(AtId::new(3).account(), 100);
        ledger.set_balance(AtId::new(7).account(), 100);
        ledger
    }

    fn open_buffer(height: u64) -> SettlementBuffer {
        let mut buffer = SettlementBuffer::new();
        buffer.begin_block(height).unwrap();
        buffer
    }

    #[test]
    fn settles_fees_transfers_and_batch() {
        let ledger = funded_ledger();
        let txdb = MemoryTransactionDb::new();
        let block = BlockContext::new(1, 100, 9000);

        let mut buffer = open_buffer(100);
        buffer.record_fee(AtId::new(3), 2).unwrap();
        buffer
            .record_transfer(PendingTransfer {
                sender: AtId::new(3),
                recipient: AccountId::new(55),
                amount: 5,
                message: Some(b"ping".to_vec()),
            })
            .unwrap();

        let txs = Settler::new(&ledger, &txdb).settle(&block, &mut buffer).unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(ledger.balance(AtId::new(3).account()).unwrap(), 100 - 2 - 5);
        assert_eq!(ledger.balance(AccountId::new(55)).unwrap(), 5);
        assert_eq!(txdb.len(), 1);
        assert!(buffer.is_empty());
        assert!(buffer.current_height().is_none());
    }

    #[test]
    fn synthesized_order_equals_insertion_order() {
        let ledger = funded_ledger();
        let txdb = MemoryTransactionDb::new();
        let block = BlockContext::new(1, 100, 9000);

        let mut buffer = open_buffer(100);
        for (sender, amount) in [(7u64, 1i64), (3, 2), (7, 3)] {
            buffer
                .record_transfer(PendingTransfer {
                    sender: AtId::new(sender),
                    recipient: AccountId::new(90),
                    amount,
                    message: None,
                })
                .unwrap();
        }

        let txs = Settler::new(&ledger, &txdb).settle(&block, &mut buffer).unwrap();
        let amounts: Vec<i64> = txs.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![1, 2, 3]);
    }

    #[test]
    fn replayed_transactions_are_not_reinserted() {
        let ledger = funded_ledger();
        let txdb = MemoryTransactionDb::new();
        let block = BlockContext::new(1, 100, 9000);

        let mut buffer = open_buffer(100);
        buffer
            .record_transfer(PendingTransfer {
                sender: AtId::new(3),
                recipient: AccountId::new(55),
                amount: 5,
                message: None,
            })
            .unwrap();
        let first = Settler::new(&ledger, &txdb).settle(&block, &mut buffer).unwrap();
        assert_eq!(first.len(), 1);

        // Crash simulation: ledger state is rolled back, the transaction
        // database survived, and the block is reprocessed from scratch.
        let replay_ledger = funded_ledger();
        let mut buffer = SettlementBuffer::new();
        buffer.begin_block(100).unwrap();
        buffer
            .record_transfer(PendingTransfer {
                sender: AtId::new(3),
                recipient: AccountId::new(55),
                amount: 5,
                message: None,
            })
            .unwrap();
        let second = Settler::new(&replay_ledger, &txdb)
            .settle(&block, &mut buffer)
            .unwrap();

        assert!(second.is_empty(), "replay must not duplicate transactions");
        assert_eq!(txdb.len(), 1);
        assert_eq!(
            replay_ledger.balance(AccountId::new(55)).unwrap(),
            ledger.balance(AccountId::new(55)).unwrap()
        );
    }

    #[test]
    fn negative_transfer_aborts_before_any_mutation() {
        let ledger = funded_ledger();
        let txdb = MemoryTransactionDb::new();
        let block = BlockContext::new(1, 100, 9000);

        let mut buffer = open_buffer(100);
        buffer.record_fee(AtId::new(3), 2).unwrap();
        buffer
            .record_transfer(PendingTransfer {
                sender: AtId::new(3),
                recipient: AccountId::new(55),
                amount: -5,
                message: None,
            })
            .unwrap();

        let err = Settler::new(&ledger, &txdb)
            .settle(&block, &mut buffer)
            .unwrap_err();
        assert!(matches!(err, AtError::InvalidTransaction(_)));
        // Nothing escaped into the ledger.
        assert_eq!(ledger.balance(AtId::new(3).account()).unwrap(), 100);
        assert!(txdb.is_empty());
    }

    #[test]
    fn settling_a_mismatched_height_is_a_consistency_error() {
        let ledger = funded_ledger();
        let txdb = MemoryTransactionDb::new();
        let mut buffer = open_buffer(100);
        let err = Settler::new(&ledger, &txdb)
            .settle(&BlockContext::new(1, 101, 9000), &mut buffer)
            .unwrap_err();
        assert!(matches!(err, AtError::Consistency(_)));
    }
}
