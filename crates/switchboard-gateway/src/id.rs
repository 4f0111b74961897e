//! Process-unique request ids
//!
//! Ids are snowflake-shaped: milliseconds since [`EPOCH_MILLIS`] in the high
//! bits, then a node id, then a sequence. Every id is strictly greater than
//! the previous one handed out by the same generator, so ids stay unique
//! even when more than the sequence space is requested in one millisecond
//! or the wall clock steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 2024-01-01T00:00:00Z
pub const EPOCH_MILLIS: u64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const NODE_MASK: u64 = (1 << NODE_BITS) - 1;

/// Generator of strictly increasing request ids
#[derive(Debug)]
pub struct RequestIdGenerator {
    node: u64,
    last: AtomicU64,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RequestIdGenerator {
    /// Generator for `node`; only the low ten bits are used
    pub const fn new(node: u16) -> Self {
        Self {
            node: node as u64 & NODE_MASK,
            last: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> u64 {
        let floor = (now_millis().saturating_sub(EPOCH_MILLIS) << (NODE_BITS + SEQUENCE_BITS))
            | (self.node << SEQUENCE_BITS);
        let previous = self
            .last
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| Some(floor.max(last + 1)))
            .unwrap_or_else(|last| last);
        floor.max(previous + 1)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = RequestIdGenerator::new(1);
        let mut previous = 0;
        for _ in 0..10_000 {
            let id = ids.next_id();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn ids_carry_the_node() {
        let id = RequestIdGenerator::new(5).next_id();
        assert_eq!((id >> SEQUENCE_BITS) & NODE_MASK, 5);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let ids = Arc::new(RequestIdGenerator::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1_000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
    }
}
