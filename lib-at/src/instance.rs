//! Deployed contract identity and metadata.

use lib_types::{AccountId, Amount, AtId, BlockHeight};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{AtError, AtResult};

/// Immutable identity of a deployed automated-transaction contract.
///
/// `name` and `description` are display metadata, not consensus state. The
/// scheduling parameters come from the deployment data and never change;
/// the contract's mutable execution snapshot lives in
/// [`crate::state::AtState`], versioned by height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtInstance {
    pub id: AtId,
    pub creator: AccountId,
    pub name: String,
    pub description: String,
    pub created_at_height: BlockHeight,
    /// Blocks to wait between scheduled runs.
    pub execution_interval: BlockHeight,
    pub freeze_on_unchanged_balance: bool,
    pub min_activation_balance: Amount,
}

impl AtInstance {
    /// The ledger account holding this contract's balance.
    pub fn account(&self) -> AccountId {
        self.id.account()
    }
}

/// Parameters for deploying a new contract.
///
/// `id` is derived from the deployment transaction by the caller; the
/// engine enforces that it has never been used before.
#[derive(Debug, Clone)]
pub struct DeployParams {
    pub id: AtId,
    pub creator: AccountId,
    pub name: String,
    pub description: String,
    /// Initial machine memory image. Opaque to the engine; empty means
    /// "no state".
    pub memory_image: Vec<u8>,
    pub execution_interval: BlockHeight,
    pub freeze_on_unchanged_balance: bool,
    pub min_activation_balance: Amount,
}

impl DeployParams {
    /// Validate against the configured limits.
    ///
    /// Runs before any engine state is mutated; failure leaves nothing to
    /// roll back.
    pub fn validate(&self, config: &EngineConfig) -> AtResult<()> {
        if self.name.len() > config.max_name_length {
            return Err(AtError::Validation(format!(
                "contract name is {} bytes, max is {}",
                self.name.len(),
                config.max_name_length
            )));
        }
        if self.description.len() > config.max_description_length {
            return Err(AtError::Validation(format!(
                "contract description is {} bytes, max is {}",
                self.description.len(),
                config.max_description_length
            )));
        }
        if self.execution_interval == 0 {
            return Err(AtError::Validation(
                "execution interval must be at least one block".to_string(),
            ));
        }
        Ok(())
    }

    /// The instance this deployment creates at `height`.
    pub fn instance_at(&self, height: BlockHeight) -> AtInstance {
        AtInstance {
            id: self.id,
            creator: self.creator,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at_height: height,
            execution_interval: self.execution_interval,
            freeze_on_unchanged_balance: self.freeze_on_unchanged_balance,
            min_activation_balance: self.min_activation_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DeployParams {
        DeployParams {
            id: AtId::new(1),
            creator: AccountId::new(9),
            name: "escrow".to_string(),
            description: "holds funds until release".to_string(),
            memory_image: vec![1, 2, 3],
            execution_interval: 10,
            freeze_on_unchanged_balance: false,
            min_activation_balance: 0,
        }
    }

    #[test]
    fn accepts_well_formed_params() {
        assert!(params().validate(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn rejects_oversized_name() {
        let mut p = params();
        p.name = "x".repeat(31);
        let err = p.validate(&EngineConfig::default()).unwrap_err();
        assert!(matches!(err, AtError::Validation(_)));
        assert!(!err.is_fatal_for_block());
    }

    #[test]
    fn rejects_zero_interval() {
        let mut p = params();
        p.execution_interval = 0;
        assert!(p.validate(&EngineConfig::default()).is_err());
    }

    #[test]
    fn instance_carries_deployment_data() {
        let inst = params().instance_at(120);
        assert_eq!(inst.account(), AccountId::new(1));
        assert_eq!(inst.created_at_height, 120);
        assert_eq!(inst.execution_interval, 10);
    }
}
