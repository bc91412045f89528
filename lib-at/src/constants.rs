//! Protocol constants for the automated-transaction engine.
//!
//! These values are consensus. Changing any of them is a hard fork.

/// Deadline stamped on every synthesized settlement payment, in minutes.
/// Mirrors the deadline used for ordinary payment transactions.
pub const AT_PAYMENT_DEADLINE_MINUTES: u16 = 1440;

/// Size of a contract id on the wire and in block payload accounting.
pub const AT_ID_SIZE: usize = 8;

/// Block-payload cost attributed to one scheduled contract:
/// its id plus a 16-byte state digest.
pub const COST_PER_AT: usize = AT_ID_SIZE + 16;

/// Maximum length of a contract's display name, in bytes.
pub const MAX_NAME_LENGTH: usize = 30;

/// Maximum length of a contract's description, in bytes.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Default machine step budget granted to one contract execution.
pub const DEFAULT_STEP_BUDGET: u32 = 2000;
