//! Content-defined chunking for tree nodes
//!
//! Where a node splits is decided by a deterministic predicate over entry
//! keys, not by fill factors. An entry closes its chunk when the low
//! `width` bits of `sha256(level || canonical-key-bytes)` are zero, giving
//! an expected branching factor of `2^width`.
//!
//! Two properties fall out of hashing the key alone:
//!
//! - the decision for an entry never depends on when it was inserted, so
//!   states that hold the same entries converge on identical blocks;
//! - branch boundaries survive child CID churn, because separators (not
//!   child addresses) are hashed.
//!
//! The level salt keeps upper levels from inheriting every lower-level
//! boundary, which would stall root growth.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Custom split predicate: `(level, canonical key bytes) -> close chunk?`
pub type SplitFn = dyn Fn(u32, &[u8]) -> bool + Send + Sync;

/// Deterministic split predicate for tree nodes.
#[derive(Clone)]
pub struct Chunker {
    width: u32,
    custom: Option<Arc<SplitFn>>,
}

impl Chunker {
    /// Default width: expected branching factor of `2^3 = 8`.
    pub const DEFAULT_WIDTH: u32 = 3;

    /// Hash-based chunker with the given width (clamped to `1..=16`).
    pub fn new(width: u32) -> Self {
        Self {
            width: width.clamp(1, 16),
            custom: None,
        }
    }

    /// Chunker driven by a caller-provided predicate.
    ///
    /// The predicate must be deterministic in its arguments; anything else
    /// breaks convergence of equal states onto equal CIDs.
    pub fn custom(split: Arc<SplitFn>) -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            custom: Some(split),
        }
    }

    /// Should the entry with this key close its chunk?
    ///
    /// `level` is the node's height above the leaves (leaves are 0).
    pub fn boundary(&self, level: u32, key_bytes: &[u8]) -> bool {
        if let Some(split) = &self.custom {
            return split(level, key_bytes);
        }

        let mut sha = Sha256::new();
        sha.update(level.to_le_bytes());
        sha.update(key_bytes);
        let digest = sha.finalize();

        let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        word & ((1 << self.width) - 1) == 0
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WIDTH)
    }
}

impl fmt::Debug for Chunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunker")
            .field("width", &self.width)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}
