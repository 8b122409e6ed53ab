//! Per-retrieval-call chunk id sequence.
//!
//! `chunk_id` must be stable and globally unique across a single retrieval call. Rather than a
//! shared mutable counter on the engine (the source pattern this replaces, §9), each call
//! reserves a disjoint range up front via `fetch_add`, so concurrent calls on the same engine
//! instance never collide.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct ChunkIdSequence {
    next: AtomicU64,
}

impl ChunkIdSequence {
    /// Seed from the user's total persisted chunk count so ids stay monotonic across process
    /// restarts, not just within one instance's lifetime.
    pub fn seeded(initial: u64) -> Self {
        Self {
            next: AtomicU64::new(initial),
        }
    }

    /// Reserve `count` consecutive ids and return the first one.
    pub fn reserve(&self, count: u64) -> u64 {
        self.next.fetch_add(count, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_reservations_are_disjoint() {
        let seq = Arc::new(ChunkIdSequence::seeded(0));
        let mut ranges = Vec::new();
        for _ in 0..8 {
            ranges.push(seq.reserve(10));
        }
        let mut sorted = ranges.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ranges.len());
    }
}
