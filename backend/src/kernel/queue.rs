//! Time-ordered wake-up queue
//!
//! `BinaryHeap` is a max-heap, so the ordering is reversed: the earliest
//! time comes out first, and among equal times the lowest sequence number.

use super::ProcessId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Wakeup {
    pub time: f64,
    pub seq: u64,
    pub process: ProcessId,
}

impl PartialEq for Wakeup {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Wakeup {}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub(crate) struct WakeupQueue {
    heap: BinaryHeap<Wakeup>,
    next_seq: u64,
}

impl WakeupQueue {
    pub fn push(&mut self, time: f64, process: ProcessId) {
        let seq = self.next_seq();
        self.heap.push(Wakeup { time, seq, process });
    }

    pub fn pop(&mut self) -> Option<Wakeup> {
        self.heap.pop()
    }

    /// Shared issue counter, also used to order resource requests
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
