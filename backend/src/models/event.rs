//! Event logging for trial auditing.
//!
//! Every significant state change of a trial is recorded as an [`Event`].
//! The log is the structured trace of a run:
//! - Debugging (what happened to a job, and when)
//! - Auditing (every placement and retrieval names its location)
//! - Analysis (postponement counts, lead times, unfreeze timing)
//!
//! # Event Types
//!
//! - **Demand**: a job reaches the dispatcher
//! - **Dispatch**: placement, retrieval, postponement, infeasibility
//! - **Execution**: job start and completion, location unfreeze
//!
//! # Example
//!
//! ```rust
//! use asrs_simulator_core_rs::models::{Event, EventLog, JobId, LocationId};
//!
//! let mut log = EventLog::new();
//! log.log(Event::LocationUnfrozen {
//!     time: 84.0,
//!     job: JobId::new(3),
//!     location: LocationId::new(1, 17),
//! });
//!
//! assert_eq!(log.events_for_job(JobId::new(3)).len(), 1);
//! assert_eq!(log.events()[0].event_type(), "LocationUnfrozen");
//! ```

use crate::models::job::{CodeId, JobId, JobKind};
use crate::models::location::LocationId;
use serde::{Deserialize, Serialize};

/// Trial event capturing a state change.
///
/// Events are logged in the order they happen; simultaneous events keep
/// the kernel's resumption order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A demand job reached the dispatcher
    JobArrival {
        time: f64,
        job: JobId,
        kind: JobKind,
        code: CodeId,
        depot: usize,
        quantity: u8,
    },

    /// INPUT job bound to a location
    Placement {
        time: f64,
        job: JobId,
        location: LocationId,
        depth: usize,
        start: u32,
    },

    /// OUTPUT sub-job bound to the bundles it will fetch
    Retrieval {
        time: f64,
        job: JobId,
        location: LocationId,
        bundles: usize,
        weight: f64,
    },

    /// Infeasible job moved behind a later job of the opposite kind
    Postponement {
        time: f64,
        job: JobId,
        behind: JobId,
    },

    /// Job admitted into execution
    JobStarted { time: f64, job: JobId, depot: usize },

    /// Job finished its last physical step
    JobCompleted {
        time: f64,
        job: JobId,
        lead_time: f64,
    },

    /// The crane transfer for a location ended
    LocationUnfrozen {
        time: f64,
        job: JobId,
        location: LocationId,
    },

    /// No choice and no postponement partner: the trial is lost
    Infeasible {
        time: f64,
        job: JobId,
        kind: JobKind,
        reason: String,
    },
}

impl Event {
    /// Simulated time of the event
    pub fn time(&self) -> f64 {
        match self {
            Event::JobArrival { time, .. } => *time,
            Event::Placement { time, .. } => *time,
            Event::Retrieval { time, .. } => *time,
            Event::Postponement { time, .. } => *time,
            Event::JobStarted { time, .. } => *time,
            Event::JobCompleted { time, .. } => *time,
            Event::LocationUnfrozen { time, .. } => *time,
            Event::Infeasible { time, .. } => *time,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::JobArrival { .. } => "JobArrival",
            Event::Placement { .. } => "Placement",
            Event::Retrieval { .. } => "Retrieval",
            Event::Postponement { .. } => "Postponement",
            Event::JobStarted { .. } => "JobStarted",
            Event::JobCompleted { .. } => "JobCompleted",
            Event::LocationUnfrozen { .. } => "LocationUnfrozen",
            Event::Infeasible { .. } => "Infeasible",
        }
    }

    /// Job the event is about
    ///
    /// Sub-job events carry the sub-job id, not the parent's.
    pub fn job_id(&self) -> JobId {
        match self {
            Event::JobArrival { job, .. }
            | Event::Placement { job, .. }
            | Event::Retrieval { job, .. }
            | Event::Postponement { job, .. }
            | Event::JobStarted { job, .. }
            | Event::JobCompleted { job, .. }
            | Event::LocationUnfrozen { job, .. }
            | Event::Infeasible { job, .. } => *job,
        }
    }

    /// Location involved, if any
    pub fn location(&self) -> Option<LocationId> {
        match self {
            Event::Placement { location, .. }
            | Event::Retrieval { location, .. }
            | Event::LocationUnfrozen { location, .. } => Some(*location),
            _ => None,
        }
    }
}

/// Event log for storing and querying trial events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events about one job; a parent id matches only itself, not its sub-jobs
    pub fn events_for_job(&self, job: JobId) -> Vec<&Event> {
        self.events.iter().filter(|e| e.job_id() == job).collect()
    }

    /// Events with `from <= time < to`
    pub fn events_between(&self, from: f64, to: f64) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.time() >= from && e.time() < to)
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
