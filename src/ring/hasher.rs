//! Key Hashing and Circular Interval Arithmetic
//!
//! Keys are mapped onto the identifier space with SHA-1 over their string
//! form. All interval checks on the ring go through the helpers below so
//! wrap-around is handled in one place.

use sha1::{Digest, Sha1};
use std::fmt::Display;

/// A location in the identifier space `[0, 2^bits)`
pub type Position = u64;

/// Largest supported bit width; keeps `ring_size` and `pos + 2^i` inside u64
pub const MAX_BIT_WIDTH: u32 = 63;

/// Maps keys to ring positions for a fixed bit width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingHasher {
    bits: u32,
}

impl RingHasher {
    /// Caller guarantees `1 <= bits <= MAX_BIT_WIDTH`
    pub fn new(bits: u32) -> Self {
        debug_assert!(bits >= 1 && bits <= MAX_BIT_WIDTH);
        RingHasher { bits }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn ring_size(&self) -> u64 {
        1u64 << self.bits
    }

    /// Position of `key` on this ring
    pub fn position<K: Display + ?Sized>(&self, key: &K) -> Position {
        hash_key(key, self.ring_size())
    }

    /// Start of finger `i` for a node at `position`: `(position + 2^i) mod ring_size`
    pub fn finger_start(&self, position: Position, i: u32) -> Position {
        (position + (1u64 << i)) & (self.ring_size() - 1)
    }
}

/// Hash a key to a position on a ring of `ring_size` slots.
///
/// The key is hashed through its `Display` form so `42` and `"42"` land on
/// the same position. The SHA-1 digest is read as a big-endian integer and
/// reduced modulo `ring_size`.
pub fn hash_key<K: Display + ?Sized>(key: &K, ring_size: u64) -> Position {
    let mut hasher = Sha1::new();
    hasher.update(key.to_string().as_bytes());
    let digest = hasher.finalize();

    if ring_size.is_power_of_two() {
        // Low bits of the digest are the trailing bytes
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[digest.len() - 8..]);
        return u64::from_be_bytes(tail) & (ring_size - 1);
    }

    digest
        .iter()
        .fold(0u128, |acc, b| ((acc << 8) | *b as u128) % ring_size as u128) as u64
}

/// `value` in `(start, end]` on the circle.
///
/// `start == end` covers the whole ring.
#[inline]
pub fn in_open_closed(value: Position, start: Position, end: Position) -> bool {
    if start == end {
        return true;
    }
    if start < end {
        start < value && value <= end
    } else {
        value > start || value <= end
    }
}

/// `value` in `(start, end)` on the circle.
///
/// `start == end` covers the whole ring.
#[inline]
pub fn in_open_open(value: Position, start: Position, end: Position) -> bool {
    if start == end {
        return true;
    }
    if start < end {
        start < value && value < end
    } else {
        value > start || value < end
    }
}

/// Clockwise distance from `from` to `to` on a ring of `ring_size` slots
#[inline]
pub fn clockwise_distance(from: Position, to: Position, ring_size: u64) -> u64 {
    if to >= from {
        to - from
    } else {
        ring_size - from + to
    }
}
