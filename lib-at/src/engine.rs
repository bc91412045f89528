//! Per-block orchestration of the automated-transaction engine.
//!
//! # Execution Order (NON-NEGOTIABLE)
//!
//! ```text
//! buffer.begin_block
//!   scheduler: select due contracts → execute → record effects
//!   settler:   fees → transfers → synthesized batch → buffer.clear
//! notify block-settled listeners
//! ```
//!
//! **Any error → discard the buffer and roll the store back to the previous
//! height.** Block processing either completes or the node halts/rolls
//! back; a consistency error here means continuing would risk consensus
//! divergence.
//!
//! Block processing is strictly sequential and single-threaded: exactly one
//! block is scheduled/executed/settled at a time. The surrounding pipeline
//! enforces that boundary, which is why nothing in this module locks.

use std::sync::Arc;

use lib_types::{Amount, AtId, BlockHeight};
use tracing::{error, info, warn};

use crate::block::BlockContext;
use crate::config::EngineConfig;
use crate::error::{AtError, AtResult};
use crate::instance::{AtInstance, DeployParams};
use crate::ledger::{AccountLedger, TransactionDb};
use crate::machine::MachineExecutor;
use crate::scheduler::Scheduler;
use crate::settlement::{Settler, SettlementBuffer};
use crate::state::AtState;
use crate::store::AtStore;
use crate::transaction::AtPayment;

/// Callback invoked once per finalized block with the synthesized
/// settlement transactions, consumed by the block assembly pipeline.
pub type BlockSettledCallback = Box<dyn Fn(&BlockContext, &[AtPayment]) + Send + Sync>;

/// Result of processing one block.
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub height: BlockHeight,
    pub executed: Vec<AtId>,
    pub skipped: Vec<AtId>,
    pub total_fee: Amount,
    pub total_amount: Amount,
    /// Block payload consumed by the executed contracts.
    pub payload_bytes: usize,
    /// Newly persisted settlement transactions, in settlement order.
    pub transactions: Vec<AtPayment>,
}

/// The automated-transaction engine.
///
/// Owns the per-block settlement buffer; collaborators are explicit
/// capabilities passed at construction, never ambient globals.
pub struct AtEngine {
    store: Arc<dyn AtStore>,
    ledger: Arc<dyn AccountLedger>,
    txdb: Arc<dyn TransactionDb>,
    machine: Arc<dyn MachineExecutor>,
    config: EngineConfig,
    buffer: SettlementBuffer,
    listeners: Vec<BlockSettledCallback>,
}

impl AtEngine {
    pub fn new(
        store: Arc<dyn AtStore>,
        ledger: Arc<dyn AccountLedger>,
        txdb: Arc<dyn TransactionDb>,
        machine: Arc<dyn MachineExecutor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            txdb,
            machine,
            config,
            buffer: SettlementBuffer::new(),
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AtStore> {
        &self.store
    }

    /// Register a listener for the per-block synthesized transaction list.
    pub fn on_block_settled(&mut self, callback: BlockSettledCallback) {
        self.listeners.push(callback);
    }

    /// Deploy a new contract during the processing of the block at
    /// `height`.
    ///
    /// Validation runs before anything is mutated; a rejected deployment
    /// leaves no engine state behind. The contract's account is created
    /// alongside the instance and its initial state, all versioned at
    /// `height` so a reorg drops the whole deployment together.
    pub fn deploy(&self, params: DeployParams, height: BlockHeight) -> AtResult<AtInstance> {
        params.validate(&self.config)?;
        if self.store.has_instance(params.id)? {
            return Err(AtError::Validation(format!(
                "contract id {} already deployed; ids are never reused",
                params.id
            )));
        }

        let instance = params.instance_at(height);
        self.store.insert_instance(&instance)?;
        let state = AtState::initial(&instance, params.memory_image, height);
        self.store.insert_state(height, &state)?;
        self.ledger.get_or_create_account(instance.account())?;

        info!(id = %instance.id, creator = %instance.creator, height, "deployed contract");
        Ok(instance)
    }

    /// Process the automated-transaction side of one block: schedule and
    /// execute due contracts, then settle their accumulated effects.
    ///
    /// `free_payload` is the block payload still available for contract
    /// entries; scheduling stops when it is spent.
    pub fn process_block(
        &mut self,
        block: &BlockContext,
        free_payload: usize,
    ) -> AtResult<BlockOutcome> {
        self.buffer.begin_block(block.height)?;

        match self.process_block_inner(block, free_payload) {
            Ok(outcome) => {
                for listener in &self.listeners {
                    listener(block, &outcome.transactions);
                }
                Ok(outcome)
            }
            Err(e) => {
                // The buffered values of this block must never leak into a
                // later block, and any state version written at this height
                // must become invisible again.
                self.buffer.discard();
                let restore_to = block.height.saturating_sub(1);
                if let Err(rollback_err) = self.store.rollback_to(restore_to) {
                    error!(
                        height = block.height,
                        %rollback_err,
                        "rollback after failed block processing also failed"
                    );
                }
                error!(height = block.height, error = %e, "block processing aborted");
                Err(e)
            }
        }
    }

    fn process_block_inner(
        &mut self,
        block: &BlockContext,
        free_payload: usize,
    ) -> AtResult<BlockOutcome> {
        let scheduler = Scheduler::new(
            self.store.as_ref(),
            self.ledger.as_ref(),
            self.machine.as_ref(),
            &self.config,
        );
        let scheduled = scheduler.run(block, free_payload, &mut self.buffer)?;

        let settler = Settler::new(self.ledger.as_ref(), self.txdb.as_ref());
        let transactions = settler.settle(block, &mut self.buffer)?;

        Ok(BlockOutcome {
            height: block.height,
            executed: scheduled.executed,
            skipped: scheduled.skipped,
            total_fee: scheduled.total_fee,
            total_amount: scheduled.total_amount,
            payload_bytes: scheduled.payload_bytes,
            transactions,
        })
    }

    /// Chain reorganization: make `height` the new tip.
    ///
    /// Every state and instance version above `height` becomes invisible
    /// again, and any accumulated-but-unsettled buffer contents are
    /// discarded, not replayed.
    pub fn rollback_to(&mut self, height: BlockHeight) -> AtResult<()> {
        self.buffer.discard();
        self.store.rollback_to(height)?;
        warn!(height, "rolled back contract engine state");
        Ok(())
    }
}

impl std::fmt::Debug for AtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtEngine")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
