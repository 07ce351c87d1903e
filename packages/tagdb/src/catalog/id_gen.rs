//! File ID generation.
//!
//! IDs are the first 16 bytes of a BLAKE3 hash over a per-process seed, a
//! monotonically increasing counter and the display name. The counter makes
//! IDs unique within a process; the seed (time + pid) separates processes
//! sharing one snapshot. Callers still check the catalog for collisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::FileId;

pub struct IdGenerator {
    seed: [u8; 32],
    counter: AtomicU64,
}

impl IdGenerator {
    /// Generator seeded from the wall clock and process id.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        Self {
            seed: *hasher.finalize().as_bytes(),
            counter: AtomicU64::new(0),
        }
    }

    /// Generator with a fixed seed. Same seed, same ID sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: *blake3::hash(&seed.to_le_bytes()).as_bytes(),
            counter: AtomicU64::new(0),
        }
    }

    /// Next ID for a file named `name`.
    pub fn next_id(&self, name: &str) -> FileId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        compute_file_id(&self.seed, n, name)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// BLAKE3(seed || counter || name), truncated to 128 bits.
pub fn compute_file_id(seed: &[u8; 32], counter: u64, name: &str) -> FileId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed);
    hasher.update(&counter.to_le_bytes());
    hasher.update(name.as_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash.as_bytes()[0..16]);
    FileId(u128::from_le_bytes(bytes))
}
