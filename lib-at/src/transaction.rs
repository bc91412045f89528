//! Synthesized settlement transactions.
//!
//! At block finalization every recorded contract transfer becomes one of
//! these, stamped from the finalizing block and carrying the same fixed
//! deadline as ordinary payments. The id is content-derived so that
//! reprocessing a block synthesizes byte-identical transactions: that is
//! what makes the duplicate check in the settler an exact replay filter.

use lib_types::{AccountId, Amount, AtId, BlockHeight, TxId};
use serde::{Deserialize, Serialize};

use crate::block::BlockContext;
use crate::constants::AT_PAYMENT_DEADLINE_MINUTES;
use crate::error::{AtError, AtResult};

/// A ledger payment produced by contract settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtPayment {
    pub id: TxId,
    /// The contract's linked account.
    pub sender: AccountId,
    pub recipient: AccountId,
    pub amount: Amount,
    pub message: Option<Vec<u8>>,
    pub block_id: u64,
    pub height: BlockHeight,
    pub block_timestamp: u64,
    pub deadline_minutes: u16,
}

impl AtPayment {
    /// Construct one settlement payment.
    ///
    /// `index` is the transfer's position within the block's settlement
    /// batch; it participates in the id so two otherwise identical
    /// transfers in one block settle as two distinct transactions while a
    /// replay of the same block reproduces the same ids.
    ///
    /// Construction failure is fatal for block processing: a dropped
    /// transfer would fork the ledger.
    pub fn build(
        block: &BlockContext,
        index: u32,
        sender: AtId,
        recipient: AccountId,
        amount: Amount,
        message: Option<Vec<u8>>,
    ) -> AtResult<Self> {
        if amount < 0 {
            return Err(AtError::InvalidTransaction(format!(
                "contract {sender} produced a negative transfer amount {amount}"
            )));
        }
        let id = Self::derive_id(block, index, sender, recipient, amount, message.as_deref());
        Ok(Self {
            id,
            sender: sender.account(),
            recipient,
            amount,
            message,
            block_id: block.block_id,
            height: block.height,
            block_timestamp: block.timestamp,
            deadline_minutes: AT_PAYMENT_DEADLINE_MINUTES,
        })
    }

    /// Deterministic id over the canonical little-endian field layout.
    fn derive_id(
        block: &BlockContext,
        index: u32,
        sender: AtId,
        recipient: AccountId,
        amount: Amount,
        message: Option<&[u8]>,
    ) -> TxId {
        let mut preimage = Vec::with_capacity(64 + message.map_or(0, <[u8]>::len));
        preimage.extend_from_slice(b"at-payment-v1");
        preimage.extend_from_slice(&block.block_id.to_le_bytes());
        preimage.extend_from_slice(&block.height.to_le_bytes());
        preimage.extend_from_slice(&index.to_le_bytes());
        preimage.extend_from_slice(&sender.as_u64().to_le_bytes());
        preimage.extend_from_slice(&recipient.as_u64().to_le_bytes());
        preimage.extend_from_slice(&amount.to_le_bytes());
        match message {
            Some(bytes) => {
                preimage.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                preimage.extend_from_slice(bytes);
            }
            None => preimage.extend_from_slice(&u32::MAX.to_le_bytes()),
        }
        TxId::from_hash_bytes(blake3::hash(&preimage).as_bytes())
    }
}
