//! Demand generation for deterministic job sequences.
//!
//! This module turns probability tables into the job sequence a trial
//! consumes. All generation is deterministic given the RNG seed.
//!
//! # Key Principles
//!
//! 1. **Determinism**: Same seed + same config → same jobs
//! 2. **Lazy**: [`DemandSource`] is an iterator; restart it by re-creating
//!    it with the same seed
//! 3. **Exponential inter-arrival**: gaps are drawn with the configured mean
//! 4. **Bounded**: generation stops at the time horizon or the job cap,
//!    whichever binds first
//!
//! # Draw order
//!
//! Each job draws, in order: the gap, the code, the kind, then the depot,
//! quantity and quality from the tables of that kind.
//!
//! # Example
//!
//! ```
//! use asrs_simulator_core_rs::arrivals::{DemandConfig, DemandSource};
//! use asrs_simulator_core_rs::rng::RngManager;
//!
//! let mut config = DemandConfig::reference();
//! config.max_jobs = Some(10);
//!
//! let mut rng = RngManager::new(42);
//! let jobs: Vec<_> = DemandSource::new(&config, &mut rng).collect();
//! assert_eq!(jobs.len(), 10);
//! assert!(jobs.windows(2).all(|w| w[0].arrival() <= w[1].arrival()));
//! ```

use crate::models::job::{Code, CodeId, Job, JobId, JobKind};
use crate::orchestrator::config::ConfigError;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// One entry of a probability table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weighted<T> {
    pub value: T,
    pub weight: f64,
}

/// Categorical distribution over values of `T`
///
/// Weights need not sum to one; they are normalized when sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityTable<T> {
    entries: Vec<Weighted<T>>,
}

impl<T> ProbabilityTable<T> {
    pub fn new(entries: Vec<(T, f64)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(value, weight)| Weighted { value, weight })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[Weighted<T>] {
        &self.entries
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.value)
    }

    /// Reject empty tables, negative weights and non-positive totals
    pub fn validate(&self, table: &str) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::EmptyTable {
                table: table.to_string(),
            });
        }
        if let Some(bad) = self.entries.iter().find(|e| e.weight < 0.0 || e.weight.is_nan()) {
            return Err(ConfigError::NegativeWeight {
                table: table.to_string(),
                weight: bad.weight,
            });
        }
        if self.entries.iter().map(|e| e.weight).sum::<f64>() <= 0.0 {
            return Err(ConfigError::NonPositiveTotal {
                table: table.to_string(),
            });
        }
        Ok(())
    }

    /// Draw one value; `None` only for tables that fail validation
    pub fn sample(&self, rng: &mut RngManager) -> Option<&T> {
        let weights: Vec<f64> = self.entries.iter().map(|e| e.weight).collect();
        rng.choose_weighted(&weights).map(|i| &self.entries[i].value)
    }
}

/// A value per job kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerKind<T> {
    pub input: T,
    pub output: T,
}

impl<T> PerKind<T> {
    pub fn get(&self, kind: JobKind) -> &T {
        match kind {
            JobKind::Input => &self.input,
            JobKind::Output => &self.output,
        }
    }
}

/// Demand generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandConfig {
    /// Mean of the exponential inter-arrival gap (seconds)
    pub mean_interarrival: f64,

    /// No job is generated once the clock reaches this time
    pub horizon: f64,

    /// Cap on the number of jobs (`None` = horizon only)
    #[serde(default)]
    pub max_jobs: Option<usize>,

    pub codes: ProbabilityTable<Code>,
    pub kinds: ProbabilityTable<JobKind>,
    pub depots: PerKind<ProbabilityTable<usize>>,
    pub quantities: PerKind<ProbabilityTable<u8>>,
    pub qualities: PerKind<ProbabilityTable<u32>>,
}

impl DemandConfig {
    /// Reference demand: one job every 120 s on average over 140 000 s,
    /// inputs at depots 0 and 2, outputs at depots 1 and 3
    pub fn reference() -> Self {
        let quality = || ProbabilityTable::new(vec![(1, 0.33), (2, 0.33), (3, 0.34)]);
        let quantity = || ProbabilityTable::new(vec![(1, 0.5), (2, 0.5)]);
        Self {
            mean_interarrival: 120.0,
            horizon: 140_000.0,
            max_jobs: None,
            codes: ProbabilityTable::new(vec![
                (Code::new(CodeId(0), 6, 1000.0), 0.5),
                (Code::new(CodeId(1), 3, 500.0), 0.2),
                (Code::new(CodeId(2), 5, 600.0), 0.1),
                (Code::new(CodeId(3), 3, 1000.0), 0.05),
                (Code::new(CodeId(4), 6, 500.0), 0.05),
            ]),
            kinds: ProbabilityTable::new(vec![(JobKind::Input, 0.5), (JobKind::Output, 0.5)]),
            depots: PerKind {
                input: ProbabilityTable::new(vec![(0, 0.25), (2, 0.25)]),
                output: ProbabilityTable::new(vec![(1, 0.25), (3, 0.25)]),
            },
            quantities: PerKind {
                input: quantity(),
                output: quantity(),
            },
            qualities: PerKind {
                input: quality(),
                output: quality(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("mean inter-arrival", self.mean_interarrival),
            ("horizon", self.horizon),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::NonPositive {
                    field: field.to_string(),
                    value,
                });
            }
        }

        self.codes.validate("codes")?;
        for code in self.codes.values() {
            if code.length == 0 || code.weight <= 0.0 {
                return Err(ConfigError::NonPositive {
                    field: format!("code {} length/weight", code.id),
                    value: f64::from(code.length).min(code.weight),
                });
            }
        }
        self.kinds.validate("kinds")?;

        for kind in [JobKind::Input, JobKind::Output] {
            self.depots.get(kind).validate(&format!("{} depots", kind))?;
            let quantities = self.quantities.get(kind);
            quantities.validate(&format!("{} quantities", kind))?;
            if let Some(&quantity) = quantities.values().find(|&&q| q != 1 && q != 2) {
                return Err(ConfigError::Quantity {
                    table: format!("{} quantities", kind),
                    quantity,
                });
            }
            self.qualities.get(kind).validate(&format!("{} qualities", kind))?;
        }

        // opposite lock orders: one depot serving both kinds can deadlock
        if let Some(&depot) = self
            .depots
            .input
            .values()
            .find(|d| self.depots.output.values().any(|o| o == *d))
        {
            return Err(ConfigError::SharedDepot { depot });
        }
        Ok(())
    }

    /// Highest depot index any table can draw
    pub fn max_depot(&self) -> Option<usize> {
        self.depots
            .input
            .values()
            .chain(self.depots.output.values())
            .copied()
            .max()
    }

    /// Draw the attributes of a job of known kind
    fn draw(&self, kind: JobKind, rng: &mut RngManager) -> Option<(usize, u8, u32)> {
        let depot = *self.depots.get(kind).sample(rng)?;
        let quantity = *self.quantities.get(kind).sample(rng)?;
        let quality = *self.qualities.get(kind).sample(rng)?;
        Some((depot, quantity, quality))
    }
}

/// Lazy generator of the demand sequence
pub struct DemandSource<'a> {
    config: &'a DemandConfig,
    rng: &'a mut RngManager,
    time: f64,
    generated: usize,
}

impl<'a> DemandSource<'a> {
    pub fn new(config: &'a DemandConfig, rng: &'a mut RngManager) -> Self {
        Self {
            config,
            rng,
            time: 0.0,
            generated: 0,
        }
    }
}

impl Iterator for DemandSource<'_> {
    type Item = Job;

    fn next(&mut self) -> Option<Job> {
        let capped = self
            .config
            .max_jobs
            .is_some_and(|max| self.generated >= max);
        if self.time >= self.config.horizon || capped {
            return None;
        }

        self.time += self.rng.exponential(self.config.mean_interarrival);
        let code = *self.config.codes.sample(self.rng)?;
        let kind = *self.config.kinds.sample(self.rng)?;
        let (depot, quantity, quality) = self.config.draw(kind, self.rng)?;

        let id = JobId::new(self.generated as u64);
        self.generated += 1;
        Some(Job::new(id, self.time, depot, kind, code, quantity, f64::from(quality)))
    }
}

/// Materialize the whole demand sequence
pub fn generate_jobs(config: &DemandConfig, rng: &mut RngManager) -> Vec<Job> {
    DemandSource::new(config, rng).collect()
}

/// One INPUT job at time zero, used to pre-fill the warehouse
pub fn single_input(config: &DemandConfig, id: JobId, rng: &mut RngManager) -> Option<Job> {
    let code = *config.codes.sample(rng)?;
    let (depot, quantity, quality) = config.draw(JobKind::Input, rng)?;
    Some(Job::new(id, 0.0, depot, JobKind::Input, code, quantity, f64::from(quality)))
}
