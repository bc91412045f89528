//! Per-contract execution snapshot, versioned by block height.
//!
//! The memory image is opaque to the engine: only the machine executor
//! interprets it. At rest it may be gzip-compressed; callers always observe
//! the decompressed form. A zero-length image is the canonical encoding of
//! "no state" (never an absent/None ambiguity).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lib_types::{Amount, AtId, BlockHeight};
use serde::{Deserialize, Serialize};

use crate::instance::AtInstance;
use crate::store::{StorageError, StorageResult};

/// Mutable execution state of one contract.
///
/// Invariant: `next_execution_height >= prev_executed_height`. Exactly one
/// version is current per contract per height; history stays queryable
/// through the versioned store for reorg rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtState {
    pub at_id: AtId,
    memory_image: Vec<u8>,
    pub prev_executed_height: BlockHeight,
    pub next_execution_height: BlockHeight,
    /// Blocks to wait between scheduled runs.
    pub execution_interval: BlockHeight,
    /// Balance recorded after the last run; the freeze policy compares
    /// against this to detect a dormant account.
    pub last_observed_balance: Amount,
    pub freeze_on_unchanged_balance: bool,
    pub min_activation_balance: Amount,
}

/// At-rest encoding. The image field holds the (possibly gzipped) bytes.
#[derive(Serialize, Deserialize)]
struct AtStateRecord {
    at_id: u64,
    image: Vec<u8>,
    image_compressed: bool,
    prev_executed_height: u64,
    next_execution_height: u64,
    execution_interval: u64,
    last_observed_balance: i64,
    freeze_on_unchanged_balance: bool,
    min_activation_balance: i64,
}

impl AtState {
    /// State of a freshly deployed contract: due at its deployment height.
    pub fn initial(instance: &AtInstance, memory_image: Vec<u8>, height: BlockHeight) -> Self {
        Self {
            at_id: instance.id,
            memory_image,
            prev_executed_height: height,
            next_execution_height: height,
            execution_interval: instance.execution_interval,
            last_observed_balance: 0,
            freeze_on_unchanged_balance: instance.freeze_on_unchanged_balance,
            min_activation_balance: instance.min_activation_balance,
        }
    }

    /// Always the decompressed form.
    pub fn memory_image(&self) -> &[u8] {
        &self.memory_image
    }

    pub fn set_memory_image(&mut self, image: Vec<u8>) {
        self.memory_image = image;
    }

    /// Record an execution at `height`: the contract next runs one interval
    /// later.
    pub fn mark_executed(&mut self, height: BlockHeight) {
        self.prev_executed_height = height;
        self.next_execution_height = height + self.execution_interval;
        debug_assert!(self.next_execution_height >= self.prev_executed_height);
    }

    /// Advance the schedule without executing (freeze policy skip).
    /// `prev_executed_height` is untouched: nothing ran.
    pub fn defer(&mut self, height: BlockHeight) {
        self.next_execution_height = height + self.execution_interval;
        debug_assert!(self.next_execution_height >= self.prev_executed_height);
    }

    pub fn is_due(&self, height: BlockHeight) -> bool {
        self.next_execution_height <= height
    }

    /// Serialize for the versioned store.
    pub fn to_bytes(&self, compress: bool) -> StorageResult<Vec<u8>> {
        let image = if compress {
            compress_image(&self.memory_image)?
        } else {
            self.memory_image.clone()
        };
        let record = AtStateRecord {
            at_id: self.at_id.as_u64(),
            image,
            image_compressed: compress,
            prev_executed_height: self.prev_executed_height,
            next_execution_height: self.next_execution_height,
            execution_interval: self.execution_interval,
            last_observed_balance: self.last_observed_balance,
            freeze_on_unchanged_balance: self.freeze_on_unchanged_balance,
            min_activation_balance: self.min_activation_balance,
        };
        Ok(bincode::serialize(&record)?)
    }

    /// Deserialize from the versioned store, decompressing transparently.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        let record: AtStateRecord = bincode::deserialize(bytes)?;
        let memory_image = if record.image_compressed {
            decompress_image(&record.image)?
        } else {
            record.image
        };
        let state = Self {
            at_id: AtId::new(record.at_id),
            memory_image,
            prev_executed_height: record.prev_executed_height,
            next_execution_height: record.next_execution_height,
            execution_interval: record.execution_interval,
            last_observed_balance: record.last_observed_balance,
            freeze_on_unchanged_balance: record.freeze_on_unchanged_balance,
            min_activation_balance: record.min_activation_balance,
        };
        if state.next_execution_height < state.prev_executed_height {
            return Err(StorageError::Corruption(format!(
                "contract {} state has next height {} below prev height {}",
                state.at_id, state.next_execution_height, state.prev_executed_height
            )));
        }
        Ok(state)
    }
}

/// Gzip a memory image. The empty image maps to itself.
pub fn compress_image(image: &[u8]) -> StorageResult<Vec<u8>> {
    if image.is_empty() {
        return Ok(Vec::new());
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(image)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StorageError::Compression(e.to_string()))
}

/// Inverse of [`compress_image`]. Lossless; the empty stream decodes to the
/// empty image.
pub fn decompress_image(bytes: &[u8]) -> StorageResult<Vec<u8>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut image = Vec::new();
    decoder
        .read_to_end(&mut image)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::AccountId;

    fn test_instance() -> AtInstance {
        AtInstance {
            id: AtId::new(5),
            creator: AccountId::new(1),
            name: "t".to_string(),
            description: String::new(),
            created_at_height: 50,
            execution_interval: 10,
            freeze_on_unchanged_balance: true,
            min_activation_balance: 100,
        }
    }

    fn test_state(image: Vec<u8>) -> AtState {
        AtState::initial(&test_instance(), image, 50)
    }

    #[test]
    fn compression_round_trips() {
        let image: Vec<u8> = (0..1024u32).map(|i| (i % 7) as u8).collect();
        let packed = compress_image(&image).unwrap();
        assert!(packed.len() < image.len());
        assert_eq!(decompress_image(&packed).unwrap(), image);
    }

    #[test]
    fn empty_image_maps_to_itself() {
        assert_eq!(compress_image(&[]).unwrap(), Vec::<u8>::new());
        assert_eq!(decompress_image(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn state_round_trips_compressed_and_plain() {
        let state = test_state(vec![9u8; 300]);
        for compress in [true, false] {
            let bytes = state.to_bytes(compress).unwrap();
            assert_eq!(AtState::from_bytes(&bytes).unwrap(), state);
        }
    }

    #[test]
    fn empty_state_round_trips() {
        let state = test_state(Vec::new());
        let bytes = state.to_bytes(true).unwrap();
        let back = AtState::from_bytes(&bytes).unwrap();
        assert!(back.memory_image().is_empty());
    }

    #[test]
    fn schedule_advances_from_processing_height() {
        let mut state = test_state(Vec::new());
        assert!(state.is_due(50));
        state.mark_executed(50);
        assert_eq!(state.prev_executed_height, 50);
        assert_eq!(state.next_execution_height, 60);
        assert!(!state.is_due(59));

        state.defer(60);
        assert_eq!(state.next_execution_height, 70);
        assert_eq!(state.prev_executed_height, 50);
    }

    #[test]
    fn corrupt_schedule_is_rejected() {
        let mut state = test_state(Vec::new());
        state.prev_executed_height = 80;
        state.next_execution_height = 70;
        let bytes = state.to_bytes(false).unwrap();
        assert!(matches!(
            AtState::from_bytes(&bytes),
            Err(StorageError::Corruption(_))
        ));
    }
}
