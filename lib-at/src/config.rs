//! Engine configuration.

use crate::constants::{
    COST_PER_AT, DEFAULT_STEP_BUDGET, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH,
};

/// Configuration for the automated-transaction engine.
///
/// All fields participate in consensus except `compress_state`, which only
/// changes the at-rest encoding (reads are transparent either way).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Machine step budget granted to each contract execution.
    pub step_budget: u32,
    /// Gzip the persisted memory image.
    pub compress_state: bool,
    /// Block-payload cost attributed to one scheduled contract.
    pub cost_per_at: usize,
    /// Maximum contract name length accepted at deployment, in bytes.
    pub max_name_length: usize,
    /// Maximum contract description length accepted at deployment, in bytes.
    pub max_description_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            compress_state: true,
            cost_per_at: COST_PER_AT,
            max_name_length: MAX_NAME_LENGTH,
            max_description_length: MAX_DESCRIPTION_LENGTH,
        }
    }
}

impl EngineConfig {
    /// Create config with a custom step budget
    pub fn with_step_budget(mut self, budget: u32) -> Self {
        self.step_budget = budget;
        self
    }

    /// Disable gzip of the persisted memory image
    pub fn without_compression(mut self) -> Self {
        self.compress_state = false;
        self
    }
}
