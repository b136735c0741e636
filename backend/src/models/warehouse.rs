//! Warehouse State
//!
//! The complete physical state of one trial: racks with their locations,
//! cranes and lifts, the depot shuttles, the depots, the jobs in flight
//! and the jobs already done. This is the world the event kernel's
//! processes act upon.
//!
//! # Critical Invariants
//!
//! 1. **Arena ownership**: racks, locations, machines and depots live in
//!    indexed collections; every cross-reference is an index
//! 2. **One lift per depot per rack**: `racks[r].lifts[d]` serves depot `d`
//! 3. **Job uniqueness**: a job id is either in flight or completed, never both
//! 4. **Occupancy accounting**: `occupied()` always equals the sum of
//!    stored bundle lengths over all locations

use crate::kernel::Kernel;
use crate::models::depot::Depot;
use crate::models::event::{Event, EventLog};
use crate::models::job::{Job, JobId, Milestone};
use crate::models::location::{Location, LocationId};
use crate::models::machine::{Crane, Lift, Shuttle};
use crate::models::rack::Rack;
use crate::orchestrator::config::{ConfigError, TopologyConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cumulative moving time of one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineUsage {
    pub name: String,
    pub moving_time: f64,
}

/// Complete warehouse state
///
/// # Example
///
/// ```rust
/// use asrs_simulator_core_rs::kernel::{Kernel, KernelError};
/// use asrs_simulator_core_rs::models::Warehouse;
/// use asrs_simulator_core_rs::orchestrator::TopologyConfig;
///
/// let mut kernel: Kernel<Warehouse, KernelError> = Kernel::new();
/// let warehouse = Warehouse::build(&TopologyConfig::reference_plant(), &mut kernel).unwrap();
///
/// assert_eq!(warehouse.racks().len(), 3);
/// assert_eq!(warehouse.depots().len(), 4);
/// assert_eq!(warehouse.occupied(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Warehouse {
    racks: Vec<Rack>,
    shuttles: Vec<Shuttle>,
    depots: Vec<Depot>,

    /// Jobs admitted for execution and not finished yet
    active: BTreeMap<JobId, Job>,

    /// Finished jobs in completion order
    completed: Vec<Job>,

    event_log: EventLog,
}

impl Warehouse {
    /// Build the plant and register one kernel resource per machine lock
    ///
    /// Resources are registered depot shuttles first, then per rack the
    /// crane followed by its lifts.
    pub fn build<W, E>(topology: &TopologyConfig, kernel: &mut Kernel<W, E>) -> Result<Self, ConfigError> {
        topology.validate()?;

        let shuttles = topology
            .depots
            .iter()
            .enumerate()
            .map(|(i, depot)| {
                let resource = kernel.add_resource(format!("shuttle {}", i));
                Shuttle::new(
                    depot.shuttle.speed,
                    depot.shuttle.acceleration,
                    depot.shuttle.position,
                    resource,
                )
            })
            .collect();

        let depots = topology
            .depots
            .iter()
            .map(|depot| Depot::new(depot.position, depot.control_interval))
            .collect();

        let racks = topology
            .racks
            .iter()
            .enumerate()
            .map(|(r, config)| {
                let crane_resource = kernel.add_resource(format!("rack {} crane", r));
                let crane = Crane::new(
                    config.crane.speeds,
                    config.crane.accelerations,
                    config.crane.position,
                    crane_resource,
                );
                let lifts = config
                    .lifts
                    .iter()
                    .enumerate()
                    .map(|(d, lift)| {
                        let resource = kernel.add_resource(format!("rack {} lift {}", r, d));
                        Lift::new(
                            lift.speed,
                            lift.acceleration,
                            lift.position,
                            lift.upper,
                            lift.lower,
                            resource,
                        )
                    })
                    .collect();
                let locations = config
                    .location_positions()
                    .into_iter()
                    .enumerate()
                    .map(|(i, position)| {
                        Location::new(
                            LocationId::new(r, i),
                            position,
                            config.location_length,
                            config.location_depth,
                            config.shelf_pitch,
                        )
                    })
                    .collect();
                Rack::new(r, config.position, locations, crane, lifts)
            })
            .collect();

        Ok(Self {
            racks,
            shuttles,
            depots,
            active: BTreeMap::new(),
            completed: Vec::new(),
            event_log: EventLog::new(),
        })
    }

    pub fn racks(&self) -> &[Rack] {
        &self.racks
    }

    pub fn racks_mut(&mut self) -> &mut [Rack] {
        &mut self.racks
    }

    pub fn rack(&self, index: usize) -> Option<&Rack> {
        self.racks.get(index)
    }

    pub fn rack_mut(&mut self, index: usize) -> Option<&mut Rack> {
        self.racks.get_mut(index)
    }

    pub fn shuttles(&self) -> &[Shuttle] {
        &self.shuttles
    }

    pub fn shuttle_mut(&mut self, depot: usize) -> Option<&mut Shuttle> {
        self.shuttles.get_mut(depot)
    }

    pub fn depots(&self) -> &[Depot] {
        &self.depots
    }

    pub fn depot_mut(&mut self, depot: usize) -> Option<&mut Depot> {
        self.depots.get_mut(depot)
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.racks.get(id.rack)?.location(id.index)
    }

    pub fn location_mut(&mut self, id: LocationId) -> Option<&mut Location> {
        self.racks.get_mut(id.rack)?.location_mut(id.index)
    }

    /// Shelf units over all racks
    pub fn capacity(&self) -> u32 {
        self.racks.iter().map(Rack::capacity).sum()
    }

    /// Shelf units held by stored bundles
    pub fn occupied(&self) -> u32 {
        self.racks.iter().map(Rack::occupied).sum()
    }

    pub fn fill_ratio(&self) -> f64 {
        f64::from(self.occupied()) / f64::from(self.capacity())
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Hand a dispatched job over to execution
    ///
    /// # Panics
    /// Panics if a job with the same id is already in flight
    pub fn admit(&mut self, job: Job) {
        let id = job.id();
        let previous = self.active.insert(id, job);
        assert!(previous.is_none(), "job {} admitted twice", id);
    }

    pub fn active(&self, id: JobId) -> Option<&Job> {
        self.active.get(&id)
    }

    pub fn active_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.active.get_mut(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Record END and move the job to the completed list
    ///
    /// Returns the job's lead time, or `None` if it was not in flight.
    pub fn complete(&mut self, id: JobId, time: f64) -> Option<f64> {
        let mut job = self.active.remove(&id)?;
        job.record(Milestone::End, time);
        let lead_time = job.lead_time().unwrap_or(0.0);
        self.event_log.log(Event::JobCompleted {
            time,
            job: id,
            lead_time,
        });
        self.completed.push(job);
        Some(lead_time)
    }

    pub fn completed(&self) -> &[Job] {
        &self.completed
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    pub fn log(&mut self, event: Event) {
        self.event_log.log(event);
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Queue-length report of every depot, by depot index
    pub fn depot_reports(&self) -> Vec<BTreeMap<u64, usize>> {
        self.depots.iter().map(|d| d.queue_report().clone()).collect()
    }

    /// Cumulative moving time of every machine
    pub fn machine_usage(&self) -> Vec<MachineUsage> {
        let shuttles = self.shuttles.iter().enumerate().map(|(i, s)| MachineUsage {
            name: format!("shuttle {}", i),
            moving_time: s.machine.moving_time(),
        });
        let racks = self.racks.iter().flat_map(|rack| {
            let crane = std::iter::once(MachineUsage {
                name: format!("rack {} crane", rack.id()),
                moving_time: rack.crane.moving_time(),
            });
            let lifts = rack.lifts.iter().enumerate().map(move |(d, lift)| MachineUsage {
                name: format!("rack {} lift {}", rack.id(), d),
                moving_time: lift.machine.moving_time(),
            });
            crane.chain(lifts)
        });
        shuttles.chain(racks).collect()
    }
}
