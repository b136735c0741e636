//! Trial Report - what a finished trial leaves behind
//!
//! Collected once the kernel drains. Besides the makespan it carries the
//! per-job START/END history, depot queue reports, machine utilisation and
//! the full event log.
//!
//! # Critical Invariants
//!
//! - **Determinism**: same seed + config + biases produces the same
//!   [`TrialReport::fingerprint`]
//! - **Completeness**: every completed job appears exactly once, in
//!   completion order

use crate::models::event::EventLog;
use crate::models::job::{Job, JobId, JobKind, Milestone};
use crate::models::warehouse::{MachineUsage, Warehouse};
use crate::policy::Biases;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// Report Structures
// ============================================================================

/// One finished job or retrieval sub-job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedJob {
    pub job: JobId,
    pub kind: JobKind,
    pub depot: usize,
    pub arrival: f64,
    pub start: f64,
    pub end: f64,
}

impl CompletedJob {
    pub fn lead_time(&self) -> f64 {
        self.end - self.start
    }
}

impl From<&Job> for CompletedJob {
    fn from(job: &Job) -> Self {
        let at = |milestone| job.history().get(&milestone).copied().unwrap_or(f64::NAN);
        CompletedJob {
            job: job.id(),
            kind: job.kind(),
            depot: job.depot(),
            arrival: job.arrival(),
            start: at(Milestone::Start),
            end: at(Milestone::End),
        }
    }
}

/// Outcome of a feasible trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReport {
    /// Simulated time at which the last job finished
    pub makespan: f64,

    pub jobs_done: usize,

    /// Postponements over the whole trial
    pub postponed: usize,

    /// Clamped biases the trial ran with
    pub biases: Biases,

    /// Queue length per control bucket, by depot
    pub depot_reports: Vec<BTreeMap<u64, usize>>,

    pub machine_usage: Vec<MachineUsage>,

    /// Shelf units held when the trial ended
    pub occupied: u32,
    pub fill_ratio: f64,

    /// Completed jobs in completion order
    pub completed: Vec<CompletedJob>,

    pub event_log: EventLog,
}

impl TrialReport {
    pub fn collect(makespan: f64, biases: Biases, warehouse: &Warehouse) -> Self {
        let completed: Vec<CompletedJob> = warehouse.completed().iter().map(CompletedJob::from).collect();
        TrialReport {
            makespan,
            jobs_done: completed.len(),
            postponed: warehouse.event_log().events_of_type("Postponement").len(),
            biases,
            depot_reports: warehouse.depot_reports(),
            machine_usage: warehouse.machine_usage(),
            occupied: warehouse.occupied(),
            fill_ratio: warehouse.fill_ratio(),
            completed,
            event_log: warehouse.event_log().clone(),
        }
    }

    /// Mean START-to-END time over completed jobs
    pub fn mean_lead_time(&self) -> Option<f64> {
        if self.completed.is_empty() {
            return None;
        }
        let total: f64 = self.completed.iter().map(CompletedJob::lead_time).sum();
        Some(total / self.completed.len() as f64)
    }

    /// SHA256 over the makespan and every completion, in order
    ///
    /// Two trials with equal fingerprints completed the same jobs at
    /// bit-identical times.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.makespan.to_bits().to_le_bytes());
        for job in &self.completed {
            hasher.update(job.job.to_string().as_bytes());
            hasher.update(job.start.to_bits().to_le_bytes());
            hasher.update(job.end.to_bits().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
