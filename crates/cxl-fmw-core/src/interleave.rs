//! Interleave ways/granularity register encodings.

use crate::ConfigError;

/// Smallest interleave granularity in bytes (encoding `0`).
pub const MIN_INTERLEAVE_GRANULARITY: u64 = 256;

/// Largest granularity encoding accepted by window configuration (16 KiB).
pub const MAX_GRANULARITY_ENCODING: u8 = 6;

/// Single source-of-truth `(ways, IW encoding)` table.
///
/// Ways counts not present here cannot be expressed by an HDM decoder.
pub const INTERLEAVE_WAYS_TABLE: &[(usize, u8)] = &[
    (1, 0),
    (2, 1),
    (4, 2),
    (8, 3),
    (16, 4),
    (3, 8),
    (6, 9),
    (12, 10),
];

/// Encodes a target count into the IW register encoding.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedWays`] for any count outside
/// [`INTERLEAVE_WAYS_TABLE`], including zero.
pub fn encode_ways(ways: usize) -> Result<u8, ConfigError> {
    INTERLEAVE_WAYS_TABLE
        .iter()
        .find_map(|(entry_ways, enc)| (*entry_ways == ways).then_some(*enc))
        .ok_or(ConfigError::UnsupportedWays { ways })
}

/// Decodes an IW register encoding into a target count.
///
/// `None` means the encoding is unassigned.
#[must_use]
pub fn decode_ways(enc: u8) -> Option<usize> {
    INTERLEAVE_WAYS_TABLE
        .iter()
        .find_map(|(ways, entry_enc)| (*entry_enc == enc).then_some(*ways))
}

/// Returns `true` when the IW encoding selects a 3/6/12-way interleave.
#[must_use]
pub const fn is_three_way_multiple(enc: u8) -> bool {
    matches!(enc, 8..=10)
}

/// Encodes an interleave granularity in bytes into the IG register encoding.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedGranularity`] unless `granularity` is a
/// power of two between 256 bytes and 16 KiB.
pub const fn encode_granularity(granularity: u64) -> Result<u8, ConfigError> {
    match granularity {
        256 => Ok(0),
        512 => Ok(1),
        1024 => Ok(2),
        2048 => Ok(3),
        4096 => Ok(4),
        8192 => Ok(5),
        16384 => Ok(6),
        _ => Err(ConfigError::UnsupportedGranularity { granularity }),
    }
}

/// Decodes an IG register encoding into a granularity in bytes.
#[must_use]
pub const fn decode_granularity(enc: u8) -> u64 {
    MIN_INTERLEAVE_GRANULARITY << enc
}
