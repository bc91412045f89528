//! Block context handed to the engine by the block-processing pipeline.

use lib_types::BlockHeight;

/// Identity of the block currently being processed.
///
/// The engine never reads chain state itself; the surrounding pipeline
/// passes the finalizing block's identity in, and every synthesized
/// settlement transaction is stamped from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub block_id: u64,
    pub height: BlockHeight,
    pub timestamp: u64,
}

impl BlockContext {
    pub fn new(block_id: u64, height: BlockHeight, timestamp: u64) -> Self {
        Self {
            block_id,
            height,
            timestamp,
        }
    }
}
