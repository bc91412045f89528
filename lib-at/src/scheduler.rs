//! Per-block contract scheduling.
//!
//! For the block being processed at height H, produce the set of contracts
//! due to execute, decide fire/skip under the freeze policy, run the due
//! ones through the machine, and record their effects into the settlement
//! buffer. Contracts are processed in ascending deployment-id order -
//! execution order affects balances and thus consensus, so the order must
//! be identical on every node.

use lib_types::{Amount, AtId};
use tracing::{debug, trace};

use crate::block::BlockContext;
use crate::config::EngineConfig;
use crate::error::{AtError, AtResult};
use crate::ledger::AccountLedger;
use crate::machine::{ExecutionEnv, MachineExecutor};
use crate::settlement::{PendingTransfer, SettlementBuffer};
use crate::state::AtState;
use crate::store::AtStore;

/// What one scheduling pass did.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    /// Contracts that executed, in execution order.
    pub executed: Vec<AtId>,
    /// Contracts skipped by the freeze policy (schedule still advanced).
    pub skipped: Vec<AtId>,
    /// Sum of fees recorded this pass.
    pub total_fee: Amount,
    /// Sum of transfer amounts recorded this pass.
    pub total_amount: Amount,
    /// Block payload consumed by the executed contracts.
    pub payload_bytes: usize,
}

/// Selects and runs due contracts for one block.
pub struct Scheduler<'a> {
    store: &'a dyn AtStore,
    ledger: &'a dyn AccountLedger,
    machine: &'a dyn MachineExecutor,
    config: &'a EngineConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        store: &'a dyn AtStore,
        ledger: &'a dyn AccountLedger,
        machine: &'a dyn MachineExecutor,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            machine,
            config,
        }
    }

    /// Run the scheduling pass for `block`, recording effects into
    /// `buffer`. `free_payload` bounds how many contracts fit the block.
    pub fn run(
        &self,
        block: &BlockContext,
        free_payload: usize,
        buffer: &mut SettlementBuffer,
    ) -> AtResult<ScheduleOutcome> {
        if buffer.current_height() != Some(block.height) {
            return Err(AtError::Consistency(format!(
                "scheduling block {} against a buffer opened for {:?}",
                block.height,
                buffer.current_height()
            )));
        }

        let height = block.height;
        let mut outcome = ScheduleOutcome::default();

        for at_id in self.store.ordered_at_ids(height)? {
            // The payload budget bounds the whole pass, not one contract:
            // once the block is full no further contract is examined.
            if outcome.payload_bytes + self.config.cost_per_at > free_payload {
                debug!(height, "block payload budget exhausted");
                break;
            }

            let mut state = self.load_or_init_state(at_id, height)?;
            if !state.is_due(height) {
                continue;
            }

            let balance = self.ledger.balance(at_id.account())?;

            // Freeze policy: a dormant contract below its activation floor
            // is skipped, but its schedule still advances: it must not be
            // re-examined every block.
            if state.freeze_on_unchanged_balance
                && balance == state.last_observed_balance
                && balance < state.min_activation_balance
            {
                trace!(%at_id, height, balance, "frozen: unchanged balance below activation");
                state.defer(height);
                self.store.insert_state(height, &state)?;
                outcome.skipped.push(at_id);
                continue;
            }

            let env = ExecutionEnv {
                at_id,
                block_height: height,
                block_timestamp: block.timestamp,
                balance,
                min_activation_balance: state.min_activation_balance,
            };
            let run = self
                .machine
                .execute(&env, state.memory_image(), self.config.step_budget)
                .map_err(|source| AtError::MachineHalt { at_id, source })?;

            buffer.record_fee(at_id, run.fee_charged)?;
            let mut sent: Amount = 0;
            for transfer in run.transfers {
                sent += transfer.amount;
                buffer.record_transfer(PendingTransfer {
                    sender: at_id,
                    recipient: transfer.recipient,
                    amount: transfer.amount,
                    message: transfer.message,
                })?;
            }

            state.set_memory_image(run.new_image);
            state.last_observed_balance = balance - run.fee_charged - sent;
            state.mark_executed(height);
            self.store.insert_state(height, &state)?;

            outcome.total_fee += run.fee_charged;
            outcome.total_amount += sent;
            outcome.payload_bytes += self.config.cost_per_at;
            outcome.executed.push(at_id);
        }

        debug!(
            height,
            executed = outcome.executed.len(),
            skipped = outcome.skipped.len(),
            total_fee = outcome.total_fee,
            total_amount = outcome.total_amount,
            "scheduling pass complete"
        );
        Ok(outcome)
    }

    /// Explicit lookup with fallback construction: a deployed contract
    /// whose state row is absent starts from its deployment data.
    fn load_or_init_state(&self, at_id: AtId, height: u64) -> AtResult<AtState> {
        if let Some(state) = self.store.get_state(at_id, height)? {
            return Ok(state);
        }
        let instance = self.store.get_instance(at_id, height)?.ok_or_else(|| {
            AtError::Consistency(format!(
                "contract {at_id} is indexed but has no instance at height {height}"
            ))
        })?;
        Ok(AtState::initial(
            &instance,
            Vec::new(),
            instance.created_at_height,
        ))
    }
}
