//! Multistart search over dispatch biases
//!
//! A trial is one complete simulation of the demand sequence under freshly
//! sampled biases (Br, Bb). The search runs `maxiter + 1` independent
//! trials, each on its own copy of the sequence and its own forked RNG,
//! and keeps the smallest makespan.
//!
//! Infeasible trials score `f64::INFINITY` and never win. Any other
//! failure aborts the search: it means the model contradicted itself.
//!
//! # Example
//! ```
//! use asrs_simulator_core_rs::arrivals::DemandConfig;
//! use asrs_simulator_core_rs::orchestrator::{BiasConfig, RunConfig, SearchConfig, TopologyConfig};
//! use asrs_simulator_core_rs::search::SearchDriver;
//!
//! let mut demand = DemandConfig::reference();
//! demand.max_jobs = Some(15);
//! let config = SearchConfig {
//!     topology: TopologyConfig::reference_plant(),
//!     demand,
//!     run: RunConfig::default(),
//!     bias: BiasConfig::default(),
//!     maxiter: 2,
//!     seed: 42,
//! };
//!
//! let outcome = SearchDriver::new(config).unwrap().run().unwrap();
//! assert_eq!(outcome.trials.len(), 3);
//! assert!(outcome.trials.iter().all(|&t| outcome.best <= t));
//! ```

use crate::arrivals::generate_jobs;
use crate::models::job::Job;
use crate::orchestrator::config::validate_jobs;
use crate::orchestrator::{Orchestrator, SearchConfig, SimulationError, TrialReport};
use crate::policy::Biases;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Score and biases of one trial
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Makespan, or `f64::INFINITY` when infeasible
    pub makespan: f64,
    pub biases: Biases,
    /// Present for feasible trials
    pub report: Option<TrialReport>,
}

impl TrialOutcome {
    pub fn is_feasible(&self) -> bool {
        self.makespan.is_finite()
    }
}

/// Result of a multistart search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Smallest makespan seen, `f64::INFINITY` if every trial was infeasible
    pub best: f64,

    /// Makespan of every trial, in run order
    pub trials: Vec<f64>,

    /// Biases of the best trial
    pub best_biases: Option<Biases>,

    /// Full report of the best trial
    #[serde(skip)]
    pub best_report: Option<TrialReport>,

    /// [`SearchConfig::config_hash`] of the configuration searched
    pub config_hash: String,
}

impl SearchOutcome {
    pub fn feasible_trials(&self) -> usize {
        self.trials.iter().filter(|t| t.is_finite()).count()
    }
}

/// Runs trials for one validated [`SearchConfig`]
#[derive(Debug, Clone)]
pub struct SearchDriver {
    config: SearchConfig,
}

impl SearchDriver {
    pub fn new(config: SearchConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// One trial with fixed biases
    ///
    /// Builds the plant, warms it up, runs `jobs` to completion.
    pub fn trial(&self, jobs: Vec<Job>, biases: Biases, rng: RngManager) -> Result<TrialReport, SimulationError> {
        let mut orchestrator = Orchestrator::new(&self.config.topology, self.config.run.clone(), biases, rng)?;
        orchestrator.warm_up(&self.config.demand)?;
        orchestrator.run(jobs)
    }

    /// One trial with biases sampled from the configured distributions
    ///
    /// Infeasibility is folded into an infinite makespan; fatal errors
    /// propagate.
    pub fn heuristic(&self, jobs: Vec<Job>, rng: &mut RngManager) -> Result<TrialOutcome, SimulationError> {
        let biases = Biases::sample(&self.config.bias, rng);
        match self.trial(jobs, biases, rng.fork()) {
            Ok(report) => Ok(TrialOutcome {
                makespan: report.makespan,
                biases: report.biases,
                report: Some(report),
            }),
            Err(e) if !e.is_fatal() => {
                log::warn!("infeasible trial (Br={:.3}, Bb={:.3}): {}", biases.rack, biases.bundle, e);
                Ok(TrialOutcome {
                    makespan: f64::INFINITY,
                    biases,
                    report: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Run `maxiter + 1` trials on copies of `jobs`, keep the minimum
    ///
    /// The sequence is checked against the plant once, before the first
    /// trial.
    pub fn multistart(&self, jobs: &[Job], maxiter: usize, rng: &mut RngManager) -> Result<SearchOutcome, SimulationError> {
        validate_jobs(jobs, self.config.topology.depots.len())?;

        let mut outcome = SearchOutcome {
            best: f64::INFINITY,
            trials: Vec::with_capacity(maxiter + 1),
            best_biases: None,
            best_report: None,
            config_hash: self.config.config_hash()?,
        };

        for i in 0..=maxiter {
            let trial = self.heuristic(jobs.to_vec(), rng)?;
            log::debug!(
                "trial {}: makespan {} (Br={:.3}, Bb={:.3})",
                i,
                trial.makespan,
                trial.biases.rack,
                trial.biases.bundle
            );

            outcome.trials.push(trial.makespan);
            if trial.is_feasible() && trial.makespan < outcome.best {
                outcome.best = trial.makespan;
                outcome.best_biases = Some(trial.biases);
                outcome.best_report = trial.report;
            }
        }
        Ok(outcome)
    }

    /// Generate the demand sequence from the seed and search over it
    pub fn run(&self) -> Result<SearchOutcome, SimulationError> {
        let mut rng = RngManager::new(self.config.seed);
        let jobs = generate_jobs(&self.config.demand, &mut rng);
        log::debug!("generated {} jobs", jobs.len());
        self.multistart(&jobs, self.config.maxiter, &mut rng)
    }
}
