// ID Generator - Snowflake-like IDs for posts, comments, groups and users
// 64-bit ID format: [timestamp:42][node_id:10][sequence:12]

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 42) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// IDs from one generator are strictly increasing, which gives posts created in
/// the same instant a deterministic order.
#[derive(Debug)]
pub struct IdGenerator {
    node_id: u16,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Node ids above 1023 are masked into range.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: node_id & MAX_NODE_ID,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // Never step backwards, even if the wall clock does
        let now = current_millis().max(state.last_timestamp);

        if now == state.last_timestamp {
            state.sequence += 1;
            if state.sequence > MAX_SEQUENCE {
                // Sequence exhausted for this millisecond: borrow the next one
                state.last_timestamp += 1;
                state.sequence = 0;
            }
        } else {
            state.last_timestamp = now;
            state.sequence = 0;
        }

        let id = ((state.last_timestamp & TIMESTAMP_MASK) << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | (state.sequence & MAX_SEQUENCE);

        id as i64
    }

    pub fn extract_node_id(id: i64) -> u16 {
        (((id as u64) >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16
    }

    pub fn extract_timestamp(id: i64) -> u64 {
        (id as u64) >> (NODE_BITS + SEQUENCE_BITS)
    }

    pub fn extract_sequence(id: i64) -> u16 {
        ((id as u64) & MAX_SEQUENCE) as u16
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let generator = IdGenerator::new(123);
        let ids: Vec<i64> = (0..10_000).map(|_| generator.next_id()).collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(ids.iter().all(|id| *id > 0));
    }

    #[test]
    fn test_node_extraction() {
        let generator = IdGenerator::new(500);
        let id = generator.next_id();

        assert_eq!(IdGenerator::extract_node_id(id), 500);
        assert_eq!(generator.node_id(), 500);
        assert!(IdGenerator::extract_timestamp(id) > 0);
    }

    #[test]
    fn test_sequence_within_same_millisecond() {
        let generator = IdGenerator::new(1);
        let first = generator.next_id();
        let second = generator.next_id();

        if IdGenerator::extract_timestamp(first) == IdGenerator::extract_timestamp(second) {
            assert_eq!(
                IdGenerator::extract_sequence(second),
                IdGenerator::extract_sequence(first) + 1
            );
        } else {
            assert_eq!(IdGenerator::extract_sequence(second), 0);
        }
    }
}
