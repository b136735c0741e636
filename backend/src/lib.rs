//! AS/RS Simulator Core - Rust Engine
//!
//! Discrete-event simulator of a multi-rack shuttle-lift-crane warehouse,
//! with a biased-randomized dispatch heuristic and a multistart search
//! over its biases.
//!
//! # Architecture
//!
//! - **core**: Simulated clock and control buckets
//! - **kernel**: Event queue, cooperative processes, capacity-one resources
//! - **models**: Domain types (Job, Bundle, Location, Rack, machines, Warehouse)
//! - **arrivals**: Demand generation from probability tables
//! - **policy**: Rack/location/bundle selection, aggregation, postponement
//! - **orchestrator**: One trial: warm-up, dispatcher, job state machines
//! - **search**: Multistart over sampled biases
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Every layer of every location tiles its length exactly
//! 2. All randomness is deterministic (seeded RNG, one per trial)
//! 3. Infeasibility is an outcome; invariant violations are fatal errors

// Module declarations
pub mod arrivals;
pub mod core;
pub mod kernel;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;
pub mod search;

// Re-exports for convenience
pub use arrivals::{generate_jobs, DemandConfig, DemandSource, ProbabilityTable};
pub use core::time::SimClock;
pub use kernel::{Kernel, KernelError, Priority, Process, ProcessId, ResourceId, Yield};
pub use models::{
    event::{Event, EventLog},
    job::{Bundle, Code, CodeId, Job, JobId, JobKind},
    location::{Location, LocationId, PackingError},
    warehouse::Warehouse,
};
pub use orchestrator::{Orchestrator, SearchConfig, SimulationError, TopologyConfig, TrialReport};
pub use policy::{Biases, DispatchHeuristic};
pub use rng::RngManager;
pub use search::{SearchDriver, SearchOutcome};
