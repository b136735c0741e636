//! Configuration types
//!
//! Everything a trial needs before simulated time starts: the plant
//! topology, the run parameters, the bias distributions and the search
//! settings. All types load from JSON and are validated before any
//! simulation object is built.

use crate::arrivals::DemandConfig;
use crate::models::depot::DEFAULT_CONTROL_INTERVAL;
use crate::models::job::{Job, JobId, JobKind, Point3};
use crate::policy::LocationOrder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

/// Configuration rejected at construction
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("table '{table}' is empty")]
    EmptyTable { table: String },

    #[error("table '{table}' has negative weight {weight}")]
    NegativeWeight { table: String, weight: f64 },

    #[error("table '{table}' has non-positive total weight")]
    NonPositiveTotal { table: String },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: String, value: f64 },

    #[error("{field} standard deviation must be non-negative, got {value}")]
    NegativeStd { field: String, value: f64 },

    #[error("weight tolerance must lie in [0, 1), got {0}")]
    Tolerance(f64),

    #[error("initial fill must lie in [0, 1), got {0}")]
    InitialFill(f64),

    #[error("rack {rack} has {lifts} lifts for {depots} depots")]
    LiftCount {
        rack: usize,
        lifts: usize,
        depots: usize,
    },

    #[error("rack {rack}: location depth must be 1 or 2, got {depth}")]
    Depth { rack: usize, depth: usize },

    #[error("topology has no {0}")]
    Missing(&'static str),

    #[error("demand references depot {depot}, plant has {depots}")]
    UnknownDepot { depot: usize, depots: usize },

    #[error("demand table '{table}' has quantity {quantity}; only 1 or 2 bundles move together")]
    Quantity { table: String, quantity: u8 },

    #[error("depot {depot} serves both INPUT and OUTPUT demand")]
    SharedDepot { depot: usize },

    #[error("job {job} targets depot {depot}, plant has {depots}")]
    JobDepot { job: JobId, depot: usize, depots: usize },

    #[error("job {job} moves {quantity} bundles; only 1 or 2 move together")]
    JobQuantity { job: JobId, quantity: u8 },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}

fn positive(field: impl Into<String>, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            field: field.into(),
            value,
        })
    }
}

// ============================================================================
// Topology
// ============================================================================

/// Kinematics of a single-axis machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub speed: f64,
    pub acceleration: f64,
    pub position: Point3,
}

impl MachineConfig {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        positive(format!("{} speed", field), self.speed)?;
        positive(format!("{} acceleration", field), self.acceleration)
    }
}

/// Crane: per-axis speeds and accelerations (x, y, z)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraneConfig {
    pub speeds: [f64; 3],
    pub accelerations: [f64; 3],
    pub position: Point3,
}

/// Lift serving one depot: starts at `position`, meets the crane at
/// `upper` and the shuttle at `lower`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftConfig {
    pub speed: f64,
    pub acceleration: f64,
    pub position: Point3,
    pub upper: Point3,
    pub lower: Point3,
}

/// Depot plus the shuttle serving it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotConfig {
    pub position: Point3,
    pub shuttle: MachineConfig,

    /// Bucket width of the queue-length report (seconds)
    #[serde(default = "default_control_interval")]
    pub control_interval: f64,
}

fn default_control_interval() -> f64 {
    DEFAULT_CONTROL_INTERVAL
}

/// One storage rack laid out as a corridor × level grid
///
/// Location `(corridor, level, k)` sits at
/// `position + (corridor · corridor_pitch, level · level_pitch, 0)`;
/// locations are numbered level-major, then corridor, then `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackConfig {
    pub position: Point3,
    pub corridors: usize,
    pub levels: usize,
    pub corridor_pitch: f64,
    pub level_pitch: f64,
    pub locations_per_cell: usize,
    pub location_length: u32,
    pub location_depth: usize,
    pub shelf_pitch: f64,
    pub crane: CraneConfig,

    /// One lift per depot, in depot order
    pub lifts: Vec<LiftConfig>,
}

impl RackConfig {
    pub fn location_count(&self) -> usize {
        self.corridors * self.levels * self.locations_per_cell
    }

    /// Shelf units of the whole rack
    pub fn capacity(&self) -> u64 {
        self.location_count() as u64 * u64::from(self.location_length) * self.location_depth as u64
    }

    /// Positions of every location in numbering order
    pub fn location_positions(&self) -> Vec<Point3> {
        let mut positions = Vec::with_capacity(self.location_count());
        for level in 0..self.levels {
            for corridor in 0..self.corridors {
                let position = [
                    self.position[0] + corridor as f64 * self.corridor_pitch,
                    self.position[1] + level as f64 * self.level_pitch,
                    self.position[2],
                ];
                positions.extend(std::iter::repeat(position).take(self.locations_per_cell));
            }
        }
        positions
    }
}

/// The whole plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub racks: Vec<RackConfig>,
    pub depots: Vec<DepotConfig>,
}

impl TopologyConfig {
    /// Validate geometry, kinematics and lift/depot pairing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.racks.is_empty() {
            return Err(ConfigError::Missing("racks"));
        }
        if self.depots.is_empty() {
            return Err(ConfigError::Missing("depots"));
        }

        for (i, depot) in self.depots.iter().enumerate() {
            depot.shuttle.validate(&format!("depot {} shuttle", i))?;
            positive(format!("depot {} control interval", i), depot.control_interval)?;
        }

        for (i, rack) in self.racks.iter().enumerate() {
            if rack.location_count() == 0 {
                return Err(ConfigError::Missing("locations"));
            }
            positive(format!("rack {} location length", i), f64::from(rack.location_length))?;
            positive(format!("rack {} shelf pitch", i), rack.shelf_pitch)?;
            if rack.location_depth != 1 && rack.location_depth != 2 {
                return Err(ConfigError::Depth {
                    rack: i,
                    depth: rack.location_depth,
                });
            }
            for (&speed, &acceleration) in rack.crane.speeds.iter().zip(&rack.crane.accelerations) {
                positive(format!("rack {} crane speed", i), speed)?;
                positive(format!("rack {} crane acceleration", i), acceleration)?;
            }
            if rack.lifts.len() != self.depots.len() {
                return Err(ConfigError::LiftCount {
                    rack: i,
                    lifts: rack.lifts.len(),
                    depots: self.depots.len(),
                });
            }
            for (j, lift) in rack.lifts.iter().enumerate() {
                positive(format!("rack {} lift {} speed", i, j), lift.speed)?;
                positive(format!("rack {} lift {} acceleration", i, j), lift.acceleration)?;
            }
        }
        Ok(())
    }

    /// Shelf units of the whole plant
    pub fn capacity(&self) -> u64 {
        self.racks.iter().map(RackConfig::capacity).sum()
    }

    /// The reference installation
    ///
    /// Three racks of 30 corridors × 10 levels, two 6-unit double-depth
    /// locations per cell, four depots spaced 30 m apart.
    ///
    /// # Example
    /// ```
    /// use asrs_simulator_core_rs::orchestrator::TopologyConfig;
    ///
    /// let plant = TopologyConfig::reference_plant();
    /// assert!(plant.validate().is_ok());
    /// assert_eq!(plant.racks.len(), 3);
    /// assert_eq!(plant.racks[0].location_count(), 600);
    /// assert_eq!(plant.capacity(), 3 * 600 * 12);
    /// ```
    pub fn reference_plant() -> Self {
        let depots: Vec<DepotConfig> = (0..4)
            .map(|i| {
                let position = [i as f64 * 30.0, 0.0, 0.0];
                DepotConfig {
                    position,
                    shuttle: MachineConfig {
                        speed: 2.0,
                        acceleration: 0.5,
                        position,
                    },
                    control_interval: DEFAULT_CONTROL_INTERVAL,
                }
            })
            .collect();

        let racks = (0..3)
            .map(|i| {
                let z = i as f64 * 12.0;
                RackConfig {
                    position: [0.0, 0.0, z],
                    corridors: 30,
                    levels: 10,
                    corridor_pitch: 4.0,
                    level_pitch: 1.0,
                    locations_per_cell: 2,
                    location_length: 6,
                    location_depth: 2,
                    shelf_pitch: 2.0,
                    crane: CraneConfig {
                        speeds: [1.3; 3],
                        accelerations: [0.3; 3],
                        position: [0.0, 10.0, z],
                    },
                    lifts: (0..depots.len())
                        .map(|j| {
                            let x = j as f64 * 30.0;
                            LiftConfig {
                                speed: 0.6,
                                acceleration: 0.3,
                                position: [x, 0.0, z],
                                upper: [x, 10.0, z],
                                lower: [x, 0.0, z],
                            }
                        })
                        .collect(),
                }
            })
            .collect();

        Self { racks, depots }
    }
}

// ============================================================================
// Run parameters
// ============================================================================

/// Per-trial execution parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Duration of every load/unload handover (seconds)
    #[serde(default = "default_transfer_delay")]
    pub transfer_delay: f64,

    /// Fraction of capacity filled before the trial starts
    #[serde(default = "default_initial_fill")]
    pub initial_fill: f64,

    /// Relative weight error accepted on retrievals
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,

    /// How a chosen rack's locations are tried for INPUT jobs
    #[serde(default)]
    pub location_order: LocationOrder,

    /// Postponements of one job after which the trial is declared infeasible
    #[serde(default = "default_postponement_limit")]
    pub postponement_limit: u32,

    /// Warm-up placement attempts before giving up on the target fill
    #[serde(default = "default_warmup_attempts")]
    pub warmup_attempts: usize,
}

fn default_transfer_delay() -> f64 {
    20.0
}

fn default_initial_fill() -> f64 {
    0.5
}

fn default_weight_tolerance() -> f64 {
    0.2
}

fn default_postponement_limit() -> u32 {
    100
}

fn default_warmup_attempts() -> usize {
    1_000_000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            transfer_delay: default_transfer_delay(),
            initial_fill: default_initial_fill(),
            weight_tolerance: default_weight_tolerance(),
            location_order: LocationOrder::default(),
            postponement_limit: default_postponement_limit(),
            warmup_attempts: default_warmup_attempts(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer_delay < 0.0 || !self.transfer_delay.is_finite() {
            return Err(ConfigError::NonPositive {
                field: "transfer delay".into(),
                value: self.transfer_delay,
            });
        }
        if !(0.0..1.0).contains(&self.initial_fill) {
            return Err(ConfigError::InitialFill(self.initial_fill));
        }
        if !(0.0..1.0).contains(&self.weight_tolerance) {
            return Err(ConfigError::Tolerance(self.weight_tolerance));
        }
        Ok(())
    }
}

// ============================================================================
// Biases
// ============================================================================

/// Normal distribution parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalParams {
    pub mean: f64,
    pub std: f64,
}

/// Distributions the per-trial rack (Br) and bundle (Bb) biases are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasConfig {
    pub rack: NormalParams,
    pub bundle: NormalParams,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            rack: NormalParams {
                mean: 0.7,
                std: 0.05,
            },
            bundle: NormalParams {
                mean: 0.9,
                std: 0.05,
            },
        }
    }
}

impl BiasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, params) in [("rack bias", self.rack), ("bundle bias", self.bundle)] {
            if params.std < 0.0 || params.std.is_nan() {
                return Err(ConfigError::NegativeStd {
                    field: field.into(),
                    value: params.std,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Search
// ============================================================================

/// Everything a multistart search needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub topology: TopologyConfig,
    pub demand: DemandConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub bias: BiasConfig,

    /// Trials beyond the first
    pub maxiter: usize,
    pub seed: u64,
}

impl SearchConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.topology.validate()?;
        self.demand.validate()?;
        self.run.validate()?;
        self.bias.validate()?;

        let depots = self.topology.depots.len();
        if let Some(depot) = self.demand.max_depot().filter(|&d| d >= depots) {
            return Err(ConfigError::UnknownDepot { depot, depots });
        }
        Ok(())
    }

    /// SHA256 of the canonical JSON form
    ///
    /// `serde_json::Value` keeps object keys sorted, so the digest does not
    /// depend on the key order of the document the config was read from.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let value = serde_json::to_value(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let bytes = serde_json::to_vec(&value).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

/// Check a demand sequence against a plant with `depots` depots
///
/// Every job must target an existing depot and move one or two bundles,
/// and no depot may receive both INPUT and OUTPUT jobs. INPUT and OUTPUT
/// jobs lock shuttle, lift and crane in opposite orders, so two jobs of
/// different kinds on one depot can wait on each other forever.
pub fn validate_jobs(jobs: &[Job], depots: usize) -> Result<(), ConfigError> {
    let mut inputs = BTreeSet::new();
    let mut outputs = BTreeSet::new();

    for job in jobs {
        if job.depot() >= depots {
            return Err(ConfigError::JobDepot {
                job: job.id(),
                depot: job.depot(),
                depots,
            });
        }
        if !matches!(job.quantity(), 1 | 2) {
            return Err(ConfigError::JobQuantity {
                job: job.id(),
                quantity: job.quantity(),
            });
        }
        match job.kind() {
            JobKind::Input => inputs.insert(job.depot()),
            JobKind::Output => outputs.insert(job.depot()),
        };
    }

    match inputs.intersection(&outputs).next() {
        Some(&depot) => Err(ConfigError::SharedDepot { depot }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_plant_layout() {
        let plant = TopologyConfig::reference_plant();
        let rack = &plant.racks[2];
        let positions = rack.location_positions();

        assert_eq!(positions.len(), 600);
        assert_eq!(positions[0], [0.0, 0.0, 24.0]);
        assert_eq!(positions[1], [0.0, 0.0, 24.0]);
        assert_eq!(positions[2], [4.0, 0.0, 24.0]);
        assert_eq!(positions[60], [0.0, 1.0, 24.0]);
        assert_eq!(rack.lifts[3].upper, [90.0, 10.0, 24.0]);
    }

    #[test]
    fn test_lift_count_must_match_depots() {
        let mut plant = TopologyConfig::reference_plant();
        plant.racks[1].lifts.pop();
        assert_eq!(
            plant.validate(),
            Err(ConfigError::LiftCount {
                rack: 1,
                lifts: 3,
                depots: 4
            })
        );
    }

    #[test]
    fn test_non_positive_speed_rejected() {
        let mut plant = TopologyConfig::reference_plant();
        plant.depots[0].shuttle.speed = 0.0;
        assert!(matches!(
            plant.validate(),
            Err(ConfigError::NonPositive { .. })
        ));
    }

    #[test]
    fn test_run_config_bounds() {
        let mut run = RunConfig::default();
        assert!(run.validate().is_ok());
        run.weight_tolerance = 1.0;
        assert_eq!(run.validate(), Err(ConfigError::Tolerance(1.0)));
    }

    #[test]
    fn test_negative_bias_std_rejected() {
        let mut bias = BiasConfig::default();
        bias.bundle.std = -0.1;
        assert!(matches!(
            bias.validate(),
            Err(ConfigError::NegativeStd { .. })
        ));
    }

    #[test]
    fn test_run_config_defaults_from_empty_json() {
        let run: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(run, RunConfig::default());
        assert_eq!(run.location_order, LocationOrder::Shuffled);
    }
}
