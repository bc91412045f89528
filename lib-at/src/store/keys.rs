//! Key Encoding Helpers
//!
//! Key encoding is PROTOCOL. These functions define the canonical byte
//! layout for versioned storage keys. Never inline key construction in
//! business logic.
//!
//! # Format Conventions
//!
//! - Composite keys use fixed-width fields (no delimiters needed)
//! - Entity ids and heights are big-endian u64, so keys sort numerically
//!   by (entity, height): exactly the order "latest version at or before
//!   height H" range scans need

/// Key for a version tree: entity id (8 bytes BE) + height (8 bytes BE).
///
/// Layout: [entity: 8][height: 8] = 16 bytes total.
#[inline]
pub fn version_key(entity: u64, height: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&entity.to_be_bytes());
    key[8..].copy_from_slice(&height.to_be_bytes());
    key
}

/// Parse (entity, height) from a version key.
#[inline]
pub fn parse_version_key(key: &[u8]) -> Option<(u64, u64)> {
    if key.len() != 16 {
        return None;
    }
    let mut entity = [0u8; 8];
    let mut height = [0u8; 8];
    entity.copy_from_slice(&key[..8]);
    height.copy_from_slice(&key[8..]);
    Some((u64::from_be_bytes(entity), u64::from_be_bytes(height)))
}
