//! Orchestrator Engine
//!
//! Runs one trial of the warehouse:
//! - Plant construction (racks, machines, depots, kernel resources)
//! - Warm-up (random INPUT placements up to the initial fill)
//! - Dispatch (one dispatcher process walking the demand sequence)
//! - Execution (one process per admitted job or retrieval sub-job)
//! - Reporting (makespan, completions, utilisation, event log)
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::new    validate configs, build Warehouse + Kernel resources
//! Orchestrator::warm_up
//!   loop until fill >= initial_fill:
//!     random rack, random location, random INPUT job, place or discard
//! Orchestrator::run
//!   spawn Dispatcher(jobs)
//!   kernel.run(warehouse)  -> final simulated time = makespan
//!   collect TrialReport
//! ```
//!
//! # Example
//!
//! ```rust
//! use asrs_simulator_core_rs::arrivals::{generate_jobs, DemandConfig};
//! use asrs_simulator_core_rs::orchestrator::{Orchestrator, RunConfig, TopologyConfig};
//! use asrs_simulator_core_rs::policy::Biases;
//! use asrs_simulator_core_rs::rng::RngManager;
//!
//! let mut demand = DemandConfig::reference();
//! demand.max_jobs = Some(20);
//! let jobs = generate_jobs(&demand, &mut RngManager::new(5));
//!
//! let biases = Biases { rack: 0.7, bundle: 0.9 };
//! let mut orchestrator = Orchestrator::new(
//!     &TopologyConfig::reference_plant(),
//!     RunConfig::default(),
//!     biases,
//!     RngManager::new(11),
//! )
//! .unwrap();
//! orchestrator.warm_up(&demand).unwrap();
//!
//! match orchestrator.run(jobs) {
//!     Ok(report) => assert!(report.makespan > 0.0),
//!     Err(e) => assert!(!e.is_fatal()),
//! }
//! ```

use crate::arrivals::{single_input, DemandConfig};
use crate::kernel::{Kernel, KernelError};
use crate::models::job::{Job, JobId, JobKind};
use crate::models::location::PackingError;
use crate::models::warehouse::Warehouse;
use crate::orchestrator::config::{validate_jobs, ConfigError, RunConfig, TopologyConfig};
use crate::orchestrator::process::Dispatcher;
use crate::orchestrator::report::TrialReport;
use crate::policy::{Biases, DispatchHeuristic};
use crate::rng::RngManager;
use thiserror::Error;

/// Serial range used by warm-up jobs, far above any demand serial
const WARMUP_SERIAL_BASE: u64 = 1 << 48;

// ============================================================================
// Errors
// ============================================================================

/// Trial failure
///
/// [`SimulationError::Infeasible`] is an outcome of the simulated system
/// (scored +∞ by the search). Every other variant is an invariant
/// violation or a configuration mistake and must not be scored.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("packing invariant violated: {0}")]
    Packing(#[from] PackingError),

    #[error("kernel misuse: {0}")]
    Kernel(#[from] KernelError),

    #[error("{kind} job {job} infeasible at t={time}: {reason}")]
    Infeasible {
        job: JobId,
        kind: JobKind,
        time: f64,
        reason: String,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),
}

impl SimulationError {
    /// Whether the error is a contradiction rather than a lost trial
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SimulationError::Infeasible { .. })
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// One trial: plant, kernel and dispatch policy
///
/// # Determinism
///
/// Warm-up and dispatch draw from the trial's own `RngManager`; the kernel
/// resumes processes in (time, issue order). Same seed + same biases +
/// same jobs = identical report.
pub struct Orchestrator {
    kernel: Kernel<Warehouse, SimulationError>,
    warehouse: Warehouse,
    run: RunConfig,
    biases: Biases,
    rng: RngManager,
}

impl Orchestrator {
    /// Validate the configuration and build the plant
    ///
    /// Biases are clamped into the open unit interval by the heuristic.
    pub fn new(
        topology: &TopologyConfig,
        run: RunConfig,
        biases: Biases,
        rng: RngManager,
    ) -> Result<Self, SimulationError> {
        run.validate()?;

        let mut kernel = Kernel::new();
        let warehouse = Warehouse::build(topology, &mut kernel)?;

        Ok(Self {
            kernel,
            warehouse,
            run,
            biases,
            rng,
        })
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    /// Pre-fill the plant with random INPUT jobs
    ///
    /// Picks a random rack, a random location and a random INPUT job until
    /// the fill ratio reaches `initial_fill`; jobs that do not fit are
    /// discarded. Warm-up placements do not freeze locations. Stops early
    /// after `warmup_attempts` attempts. Returns the number of jobs placed.
    pub fn warm_up(&mut self, demand: &DemandConfig) -> Result<usize, SimulationError> {
        let target = self.run.initial_fill;
        let racks = self.warehouse.racks().len();
        let mut placed = 0;
        let mut attempts = 0;

        while self.warehouse.fill_ratio() < target {
            if attempts >= self.run.warmup_attempts {
                log::warn!(
                    "warm-up stopped after {} attempts at fill {:.3} (target {:.3})",
                    attempts,
                    self.warehouse.fill_ratio(),
                    target
                );
                break;
            }
            let serial = WARMUP_SERIAL_BASE + attempts as u64;
            attempts += 1;

            let r = self.rng.index(racks);
            let Some(rack) = self.warehouse.rack_mut(r) else {
                continue;
            };
            let index = self.rng.index(rack.locations().len());
            let Some(mut job) = single_input(demand, JobId::new(serial), &mut self.rng) else {
                return Err(ConfigError::Missing("INPUT job tables").into());
            };
            let location = rack
                .location_mut(index)
                .ok_or_else(|| SimulationError::UnknownEntity(format!("location {} of rack {}", index, r)))?;
            if location.place(&mut job)? {
                placed += 1;
            }
        }

        log::debug!(
            "warm-up placed {} jobs in {} attempts, fill {:.3}",
            placed,
            attempts,
            self.warehouse.fill_ratio()
        );
        Ok(placed)
    }

    /// Run the demand sequence to completion
    ///
    /// Returns the trial report, or [`SimulationError::Infeasible`] when a
    /// job could neither be dispatched nor postponed. A sequence the plant
    /// cannot serve is rejected with [`SimulationError::InvalidConfig`]
    /// before simulated time starts.
    pub fn run(mut self, jobs: Vec<Job>) -> Result<TrialReport, SimulationError> {
        validate_jobs(&jobs, self.warehouse.depots().len())?;

        let heuristic = DispatchHeuristic::new(
            self.biases,
            self.run.weight_tolerance,
            self.run.location_order,
            self.rng,
        );
        let biases = heuristic.biases();
        let dispatcher = Dispatcher::new(
            jobs,
            heuristic,
            self.run.transfer_delay,
            self.run.postponement_limit,
        );
        self.kernel.spawn(Box::new(dispatcher));

        let makespan = self.kernel.run(&mut self.warehouse)?;
        Ok(TrialReport::collect(makespan, biases, &self.warehouse))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("now", &self.kernel.now())
            .field("racks", &self.warehouse.racks().len())
            .field("depots", &self.warehouse.depots().len())
            .field("fill_ratio", &self.warehouse.fill_ratio())
            .field("biases", &self.biases)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrivals::generate_jobs;
    use crate::models::job::{Code, CodeId};

    fn biases() -> Biases {
        Biases {
            rack: 0.7,
            bundle: 0.9,
        }
    }

    fn orchestrator(seed: u64) -> Orchestrator {
        Orchestrator::new(
            &TopologyConfig::reference_plant(),
            RunConfig::default(),
            biases(),
            RngManager::new(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_warm_up_reaches_target_fill() {
        let mut orchestrator = orchestrator(3);
        let placed = orchestrator.warm_up(&DemandConfig::reference()).unwrap();

        assert!(placed > 0);
        assert!(orchestrator.warehouse().fill_ratio() >= 0.5);
        assert!(orchestrator
            .warehouse()
            .racks()
            .iter()
            .flat_map(|r| r.locations())
            .all(|l| !l.is_frozen()));
    }

    #[test]
    fn test_warm_up_respects_attempt_cap() {
        let mut run = RunConfig::default();
        run.warmup_attempts = 10;
        let mut orchestrator =
            Orchestrator::new(&TopologyConfig::reference_plant(), run, biases(), RngManager::new(3)).unwrap();

        let placed = orchestrator.warm_up(&DemandConfig::reference()).unwrap();
        assert!(placed <= 10);
        assert!(orchestrator.warehouse().fill_ratio() < 0.5);
    }

    #[test]
    fn test_invalid_run_config_rejected() {
        let mut run = RunConfig::default();
        run.weight_tolerance = 1.5;
        let err = Orchestrator::new(&TopologyConfig::reference_plant(), run, biases(), RngManager::new(1)).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(ConfigError::Tolerance(_))));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_sequence_finishes_at_zero() {
        let report = orchestrator(1).run(Vec::new()).unwrap();
        assert_eq!(report.makespan, 0.0);
        assert_eq!(report.jobs_done, 0);
    }

    #[test]
    fn test_inputs_only_complete_on_empty_plant() {
        let mut demand = DemandConfig::reference();
        demand.max_jobs = Some(30);
        let jobs: Vec<Job> = generate_jobs(&demand, &mut RngManager::new(8))
            .into_iter()
            .filter(|j| j.kind() == JobKind::Input)
            .collect();
        let count = jobs.len();
        let last_arrival = jobs.iter().map(Job::arrival).fold(0.0, f64::max);

        let report = orchestrator(2).run(jobs).unwrap();
        assert_eq!(report.jobs_done, count);
        assert!(report.makespan > last_arrival);
        assert!(report.completed.iter().all(|c| c.end >= c.start));
    }

    #[test]
    fn test_sequence_checked_before_dispatch() {
        let code = Code::new(CodeId(0), 3, 500.0);
        let stray = vec![Job::new(JobId::new(0), 0.0, 9, JobKind::Input, code, 1, 1.0)];
        let err = orchestrator(1).run(stray).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InvalidConfig(ConfigError::JobDepot {
                job: JobId::new(0),
                depot: 9,
                depots: 4
            })
        );

        let mixed = vec![
            Job::new(JobId::new(0), 0.0, 1, JobKind::Input, code, 1, 1.0),
            Job::new(JobId::new(1), 5.0, 1, JobKind::Output, code, 1, 1.0),
        ];
        let err = orchestrator(1).run(mixed).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err, SimulationError::InvalidConfig(ConfigError::SharedDepot { depot: 1 }));
    }

    #[test]
    fn test_infeasible_is_not_fatal() {
        let err = SimulationError::Infeasible {
            job: JobId::new(4),
            kind: JobKind::Output,
            time: 12.0,
            reason: "no bundles".into(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("infeasible"));
    }
}
