//! Id generation
//!
//! Stores and the trip orchestrator never mint ids from global counters;
//! they are handed an [`IdGenerator`]. Tests use [`SequentialIds`] for
//! predictable output, the SQLite store uses [`HashedIds`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Source of fresh string ids
pub trait IdGenerator: Send + Sync {
    /// Next id, namespaced by `prefix` (e.g. "pantry", "decision")
    fn next_id(&self, prefix: &str) -> String;
}

/// `prefix-1`, `prefix-2`, ... shared across prefixes
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting after `n` (useful when seeding fixtures by hand)
    pub fn starting_after(n: u64) -> Self {
        Self {
            counter: AtomicU64::new(n),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }
}

/// Short hex ids derived from the clock, a per-instance seed and a counter
#[derive(Debug)]
pub struct HashedIds {
    seed: String,
    counter: AtomicU64,
}

impl HashedIds {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for HashedIds {
    fn default() -> Self {
        Self::new(std::process::id().to_string())
    }
}

impl IdGenerator for HashedIds {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update(prefix.as_bytes());
        hasher.update(n.to_le_bytes());
        hasher.update(nanos.to_le_bytes());
        let digest = hex::encode(hasher.finalize());

        format!("{}_{}", prefix, &digest[..12])
    }
}
