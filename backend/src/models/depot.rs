//! Depot: where bundles enter and leave the warehouse
//!
//! A depot is a reporting sink. It keeps the FIFO of jobs currently in
//! flight through it and samples the queue length once per control
//! interval bucket (last sample in a bucket wins).

use crate::core::time::control_bucket;
use crate::models::job::{JobId, Point3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default control interval (seconds)
pub const DEFAULT_CONTROL_INTERVAL: f64 = 1000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    position: Point3,
    control_interval: f64,
    queue: VecDeque<JobId>,
    queue_report: BTreeMap<u64, usize>,
}

impl Depot {
    /// # Panics
    /// Panics if the control interval is not positive
    pub fn new(position: Point3, control_interval: f64) -> Self {
        assert!(control_interval > 0.0, "control interval must be positive");
        Self {
            position,
            control_interval,
            queue: VecDeque::new(),
            queue_report: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queue length sampled per control bucket
    pub fn queue_report(&self) -> &BTreeMap<u64, usize> {
        &self.queue_report
    }

    pub fn push(&mut self, job: JobId, time: f64) {
        self.queue.push_back(job);
        self.sample(time);
    }

    /// Remove the oldest job in flight
    pub fn pop(&mut self, time: f64) -> Option<JobId> {
        let job = self.queue.pop_front();
        self.sample(time);
        job
    }

    fn sample(&mut self, time: f64) {
        self.queue_report
            .insert(control_bucket(time, self.control_interval), self.queue.len());
    }
}
