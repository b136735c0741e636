//! Orchestrator - one trial of the warehouse
//!
//! Builds the plant, warms it up, and runs the dispatcher and job
//! processes on the event kernel until the demand sequence is done.
//!
//! See `engine.rs` for the trial driver and `process.rs` for the job
//! state machines.

pub mod config;
pub mod engine;
pub mod process;
pub mod report;

// Re-export main types for convenience
pub use config::{
    BiasConfig, ConfigError, CraneConfig, DepotConfig, LiftConfig, MachineConfig, NormalParams, RackConfig,
    RunConfig, SearchConfig, TopologyConfig, validate_jobs,
};
pub use engine::{Orchestrator, SimulationError};
pub use process::{Dispatcher, JobProcess, MachineRef, Preparation};
pub use report::{CompletedJob, TrialReport};
