//! Exclusive resources with priority-ordered waiting queues
//!
//! Every resource has capacity one and is non-preemptive. Waiters are
//! served by (priority, request order).

use super::ProcessId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// Arena index of a resource registered in the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(usize);

impl ResourceId {
    pub fn new(raw: usize) -> Self {
        ResourceId(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Request priority; lower values are served first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Extraordinary = 1,
    Urgent = 5,
    Medium = 7,
    #[default]
    Normal = 10,
    Low = 12,
}

impl Priority {
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Queue entry: `(priority level, request sequence, waiting process)`
type Waiter = Reverse<(u8, u64, ProcessId)>;

#[derive(Debug, Clone)]
pub(crate) struct Resource {
    name: String,
    holder: Option<ProcessId>,
    waiting: BinaryHeap<Waiter>,
    grants: u64,
}

impl Resource {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            holder: None,
            waiting: BinaryHeap::new(),
            grants: 0,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn holder(&self) -> Option<ProcessId> {
        self.holder
    }

    /// Number of times the resource was handed out
    pub(crate) fn grants(&self) -> u64 {
        self.grants
    }

    /// Users in service plus users queued
    pub(crate) fn congestion(&self) -> usize {
        usize::from(self.holder.is_some()) + self.waiting.len()
    }

    /// Grant immediately if free, otherwise enqueue. Returns whether the
    /// process now holds the resource.
    pub(crate) fn request(&mut self, process: ProcessId, priority: Priority, seq: u64) -> bool {
        if self.holder.is_none() {
            self.holder = Some(process);
            self.grants += 1;
            true
        } else {
            self.waiting.push(Reverse((priority.level(), seq, process)));
            false
        }
    }

    /// Free the resource and hand it to the best waiter, if any
    pub(crate) fn release(&mut self) -> Option<ProcessId> {
        self.holder = None;
        let Reverse((_, _, next)) = self.waiting.pop()?;
        self.holder = Some(next);
        self.grants += 1;
        Some(next)
    }
}
