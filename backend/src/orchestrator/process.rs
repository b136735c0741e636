//! Trial processes
//!
//! Every piece of activity in a trial is a kernel [`Process`] over the
//! [`Warehouse`]:
//!
//! - [`Dispatcher`]: walks the demand sequence, binds jobs, postpones or
//!   gives up, spawns executions
//! - [`JobProcess`]: drives one job or retrieval sub-job through shuttle,
//!   lift and crane
//! - [`Preparation`]: acquires one machine and moves it into position,
//!   run concurrently with the job that spawned it
//!
//! All acquisitions use [`Priority::Normal`].

use crate::kernel::{Kernel, Priority, Process, ProcessId, ResourceId, Yield};
use crate::models::event::Event;
use crate::models::job::{Job, JobId, JobKind, Milestone, Point3};
use crate::models::location::LocationId;
use crate::models::machine::Lift;
use crate::models::warehouse::Warehouse;
use crate::orchestrator::engine::SimulationError;
use crate::policy::{postpone, DispatchHeuristic};
use std::collections::VecDeque;

type TrialKernel = Kernel<Warehouse, SimulationError>;

fn acquire(resource: ResourceId) -> Yield {
    Yield::Acquire {
        resource,
        priority: Priority::Normal,
    }
}

// ============================================================================
// Machine access
// ============================================================================

/// A movable machine of the plant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineRef {
    Shuttle { depot: usize },
    Lift { rack: usize, depot: usize },
    /// Crane reaching a pick-up point (Y, then X and Z together)
    Crane { rack: usize },
}

fn missing(what: String) -> SimulationError {
    SimulationError::UnknownEntity(what)
}

fn lift_of(world: &Warehouse, rack: usize, depot: usize) -> Result<&Lift, SimulationError> {
    world
        .rack(rack)
        .and_then(|r| r.lift(depot))
        .ok_or_else(|| missing(format!("lift {} of rack {}", depot, rack)))
}

impl MachineRef {
    pub fn resource(self, world: &Warehouse) -> Result<ResourceId, SimulationError> {
        match self {
            MachineRef::Shuttle { depot } => world
                .shuttles()
                .get(depot)
                .map(|s| s.resource)
                .ok_or_else(|| missing(format!("shuttle {}", depot))),
            MachineRef::Lift { rack, depot } => Ok(lift_of(world, rack, depot)?.resource),
            MachineRef::Crane { rack } => world
                .rack(rack)
                .map(|r| r.crane.resource)
                .ok_or_else(|| missing(format!("rack {}", rack))),
        }
    }

    /// Start a move to `target`; returns its duration
    pub fn move_to(self, world: &mut Warehouse, target: Point3) -> Result<f64, SimulationError> {
        match self {
            MachineRef::Shuttle { depot } => world
                .shuttle_mut(depot)
                .map(|s| s.machine.move_to(target))
                .ok_or_else(|| missing(format!("shuttle {}", depot))),
            MachineRef::Lift { rack, depot } => world
                .rack_mut(rack)
                .and_then(|r| r.lifts.get_mut(depot))
                .map(|l| l.machine.move_to(target))
                .ok_or_else(|| missing(format!("lift {} of rack {}", depot, rack))),
            MachineRef::Crane { rack } => world
                .rack_mut(rack)
                .map(|r| r.crane.prepare_in(target))
                .ok_or_else(|| missing(format!("rack {}", rack))),
        }
    }
}

// ============================================================================
// Preparation
// ============================================================================

/// Acquire a machine, then move it to `target`
///
/// The lock stays held when the process finishes; the job that spawned it
/// releases it later.
#[derive(Debug)]
pub struct Preparation {
    machine: MachineRef,
    target: Point3,
    step: u8,
}

impl Preparation {
    pub fn new(machine: MachineRef, target: Point3) -> Self {
        Self {
            machine,
            target,
            step: 0,
        }
    }
}

impl Process<Warehouse, SimulationError> for Preparation {
    fn resume(&mut self, world: &mut Warehouse, _kernel: &mut TrialKernel) -> Result<Yield, SimulationError> {
        self.step += 1;
        match self.step {
            1 => Ok(acquire(self.machine.resource(world)?)),
            2 => Ok(Yield::Timeout(self.machine.move_to(world, self.target)?)),
            _ => Ok(Yield::Finish),
        }
    }
}

// ============================================================================
// Job execution
// ============================================================================

/// Execution of one admitted job
///
/// INPUT: shuttle fetches at the depot, hands over to the lift, the lift
/// hands over to the crane, the crane stores. OUTPUT runs the chain
/// backwards. Each handover costs one transfer delay; the next machine is
/// prepared concurrently while the previous one is still busy.
#[derive(Debug)]
pub struct JobProcess {
    job: JobId,
    kind: JobKind,
    depot: usize,
    location: LocationId,
    destination: Point3,
    transfer: f64,
    step: u8,
    helper: Option<ProcessId>,
}

impl JobProcess {
    /// Build from a job already bound to its location
    pub fn new(job: &Job, transfer: f64) -> Result<Self, SimulationError> {
        let location = job
            .bundles()
            .first()
            .and_then(|b| b.location())
            .ok_or_else(|| missing(format!("location of job {}", job.id())))?;
        let destination = job
            .destination()
            .ok_or_else(|| missing(format!("destination of job {}", job.id())))?;
        Ok(Self {
            job: job.id(),
            kind: job.kind(),
            depot: job.depot(),
            location,
            destination,
            transfer,
            step: 0,
            helper: None,
        })
    }

    fn shuttle(&self) -> MachineRef {
        MachineRef::Shuttle { depot: self.depot }
    }

    fn lift(&self) -> MachineRef {
        MachineRef::Lift {
            rack: self.location.rack,
            depot: self.depot,
        }
    }

    fn crane(&self) -> MachineRef {
        MachineRef::Crane {
            rack: self.location.rack,
        }
    }

    fn spawn_helper(&mut self, kernel: &mut TrialKernel, machine: MachineRef, target: Point3) {
        self.helper = Some(kernel.spawn(Box::new(Preparation::new(machine, target))));
    }

    fn join_helper(&mut self) -> Result<Yield, SimulationError> {
        self.helper
            .take()
            .map(Yield::Join)
            .ok_or_else(|| missing(format!("preparation of job {}", self.job)))
    }

    fn start(&self, world: &mut Warehouse, now: f64) -> Result<(), SimulationError> {
        let job = world
            .active_mut(self.job)
            .ok_or_else(|| missing(format!("active job {}", self.job)))?;
        job.record(Milestone::Start, now);
        world
            .depot_mut(self.depot)
            .ok_or_else(|| missing(format!("depot {}", self.depot)))?
            .push(self.job, now);
        world.log(Event::JobStarted {
            time: now,
            job: self.job,
            depot: self.depot,
        });
        Ok(())
    }

    fn pop_depot(&self, world: &mut Warehouse, now: f64) -> Result<(), SimulationError> {
        world
            .depot_mut(self.depot)
            .ok_or_else(|| missing(format!("depot {}", self.depot)))?
            .pop(now);
        Ok(())
    }

    fn unfreeze(&self, world: &mut Warehouse, now: f64) -> Result<(), SimulationError> {
        world
            .location_mut(self.location)
            .ok_or_else(|| missing(format!("location {}", self.location)))?
            .unfreeze();
        world.log(Event::LocationUnfrozen {
            time: now,
            job: self.job,
            location: self.location,
        });
        Ok(())
    }

    fn finish(&self, world: &mut Warehouse, now: f64) -> Result<Yield, SimulationError> {
        world
            .complete(self.job, now)
            .ok_or_else(|| missing(format!("active job {}", self.job)))?;
        Ok(Yield::Finish)
    }

    fn lift_points(&self, world: &Warehouse) -> Result<(Point3, Point3), SimulationError> {
        let lift = lift_of(world, self.location.rack, self.depot)?;
        Ok((lift.upper, lift.lower))
    }

    fn depot_position(&self, world: &Warehouse) -> Result<Point3, SimulationError> {
        world
            .depots()
            .get(self.depot)
            .map(|d| d.position())
            .ok_or_else(|| missing(format!("depot {}", self.depot)))
    }

    fn resume_input(&mut self, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<Yield, SimulationError> {
        let now = kernel.now();
        let (upper, lower) = self.lift_points(world)?;
        match self.step {
            1 => {
                self.start(world, now)?;
                Ok(acquire(self.shuttle().resource(world)?))
            }
            2 => {
                let depot = self.depot_position(world)?;
                Ok(Yield::Timeout(self.shuttle().move_to(world, depot)?))
            }
            3 => {
                self.spawn_helper(kernel, self.lift(), lower);
                Ok(Yield::Timeout(self.transfer))
            }
            4 => {
                self.pop_depot(world, now)?;
                Ok(Yield::Timeout(self.shuttle().move_to(world, lower)?))
            }
            5 => self.join_helper(),
            6 => {
                self.spawn_helper(kernel, self.crane(), upper);
                Ok(Yield::Timeout(self.transfer))
            }
            7 => {
                kernel.release(self.shuttle().resource(world)?)?;
                Ok(Yield::Timeout(self.lift().move_to(world, upper)?))
            }
            8 => self.join_helper(),
            9 => Ok(Yield::Timeout(self.transfer)),
            10 => {
                kernel.release(self.lift().resource(world)?)?;
                let rack = world
                    .rack_mut(self.location.rack)
                    .ok_or_else(|| missing(format!("rack {}", self.location.rack)))?;
                Ok(Yield::Timeout(rack.crane.take_in(self.destination, self.transfer)))
            }
            _ => {
                kernel.release(self.crane().resource(world)?)?;
                self.unfreeze(world, now)?;
                self.finish(world, now)
            }
        }
    }

    fn resume_output(&mut self, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<Yield, SimulationError> {
        let now = kernel.now();
        let (upper, lower) = self.lift_points(world)?;
        match self.step {
            1 => {
                self.start(world, now)?;
                Ok(acquire(self.crane().resource(world)?))
            }
            2 => {
                self.spawn_helper(kernel, self.lift(), upper);
                let rack = world
                    .rack_mut(self.location.rack)
                    .ok_or_else(|| missing(format!("rack {}", self.location.rack)))?;
                Ok(Yield::Timeout(rack.crane.take_out(upper, self.destination, self.transfer)))
            }
            3 => {
                self.unfreeze(world, now)?;
                self.join_helper()
            }
            4 => {
                self.spawn_helper(kernel, self.shuttle(), lower);
                Ok(Yield::Timeout(self.transfer))
            }
            5 => {
                kernel.release(self.crane().resource(world)?)?;
                Ok(Yield::Timeout(self.lift().move_to(world, lower)?))
            }
            6 => self.join_helper(),
            7 => Ok(Yield::Timeout(self.transfer)),
            8 => {
                kernel.release(self.lift().resource(world)?)?;
                let depot = self.depot_position(world)?;
                Ok(Yield::Timeout(self.shuttle().move_to(world, depot)?))
            }
            9 => Ok(Yield::Timeout(self.transfer)),
            _ => {
                self.pop_depot(world, now)?;
                kernel.release(self.shuttle().resource(world)?)?;
                self.finish(world, now)
            }
        }
    }
}

impl Process<Warehouse, SimulationError> for JobProcess {
    fn resume(&mut self, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<Yield, SimulationError> {
        self.step += 1;
        match self.kind {
            JobKind::Input => self.resume_input(world, kernel),
            JobKind::Output => self.resume_output(world, kernel),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Debug)]
enum DispatchState {
    /// Wait for the head of the sequence to arrive
    Next,
    /// The head has arrived; bind it
    Arrived,
    /// Retrieval sub-jobs still to start, one per resumption
    Spawning(VecDeque<Job>),
}

/// Walks the demand sequence in order
///
/// Waits until each job's arrival (not at all if already past), asks the
/// heuristic for a binding, and either starts execution or postpones the
/// job behind a later job that could unblock it. A job with no partner, or
/// postponed too often, makes the trial infeasible.
pub struct Dispatcher {
    pending: VecDeque<Job>,
    heuristic: DispatchHeuristic,
    transfer: f64,
    postponement_limit: u32,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(jobs: Vec<Job>, heuristic: DispatchHeuristic, transfer: f64, postponement_limit: u32) -> Self {
        Self {
            pending: jobs.into(),
            heuristic,
            transfer,
            postponement_limit,
            state: DispatchState::Next,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn congestion(world: &Warehouse, kernel: &TrialKernel) -> Result<Vec<usize>, SimulationError> {
        world
            .racks()
            .iter()
            .map(|rack| kernel.congestion(rack.crane.resource).map_err(SimulationError::from))
            .collect()
    }

    fn start(&self, job: Job, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<(), SimulationError> {
        let process = JobProcess::new(&job, self.transfer)?;
        world.admit(job);
        kernel.spawn(Box::new(process));
        Ok(())
    }

    /// Bind the head of the sequence; returns whether it left the sequence
    fn dispatch(&mut self, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<bool, SimulationError> {
        let now = kernel.now();
        let congestion = Self::congestion(world, kernel)?;
        let Some(job) = self.pending.front_mut() else {
            return Ok(true);
        };

        if job.postponements() == 0 {
            world.log(Event::JobArrival {
                time: now,
                job: job.id(),
                kind: job.kind(),
                code: job.code().id,
                depot: job.depot(),
                quantity: job.quantity(),
            });
        }

        match job.kind() {
            JobKind::Input => {
                let Some(location) = self.heuristic.dispatch_input(job, world, &congestion)? else {
                    return Ok(false);
                };
                for bundle in job.bundles() {
                    world.log(Event::Placement {
                        time: now,
                        job: job.id(),
                        location,
                        depth: bundle.depth(),
                        start: bundle.start(),
                    });
                }
                if let Some(job) = self.pending.pop_front() {
                    self.start(job, world, kernel)?;
                }
                Ok(true)
            }
            JobKind::Output => {
                let Some(parts) = self.heuristic.dispatch_output(job, world, &congestion) else {
                    return Ok(false);
                };
                self.pending.pop_front();
                self.state = DispatchState::Spawning(parts.into());
                Ok(true)
            }
        }
    }

    /// Postpone the head, or declare the trial infeasible
    fn postpone_head(&mut self, world: &mut Warehouse, now: f64) -> Result<(), SimulationError> {
        let Some(job) = self.pending.front() else {
            return Ok(());
        };
        let (id, kind, postponements) = (job.id(), job.kind(), job.postponements());

        let reason = if postponements >= self.postponement_limit {
            format!("postponed {} times", postponements)
        } else if let Some(behind) = postpone(&mut self.pending, 0) {
            world.log(Event::Postponement { time: now, job: id, behind });
            return Ok(());
        } else {
            match kind {
                JobKind::Input => "no room and no later retrieval to wait for".to_string(),
                JobKind::Output => "no bundles and no later storage to wait for".to_string(),
            }
        };

        world.log(Event::Infeasible {
            time: now,
            job: id,
            kind,
            reason: reason.clone(),
        });
        Err(SimulationError::Infeasible {
            job: id,
            kind,
            time: now,
            reason,
        })
    }

    /// Take the sub-job's bundles out of its location and start it
    fn spawn_retrieval(&self, mut part: Job, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<(), SimulationError> {
        let location = part
            .bundles()
            .first()
            .and_then(|b| b.location())
            .ok_or_else(|| missing(format!("location of job {}", part.id())))?;
        world
            .location_mut(location)
            .ok_or_else(|| missing(format!("location {}", location)))?
            .take(&mut part)?;
        world.log(Event::Retrieval {
            time: kernel.now(),
            job: part.id(),
            location,
            bundles: part.bundles().len(),
            weight: part.weight(),
        });
        self.start(part, world, kernel)
    }
}

impl Process<Warehouse, SimulationError> for Dispatcher {
    fn resume(&mut self, world: &mut Warehouse, kernel: &mut TrialKernel) -> Result<Yield, SimulationError> {
        loop {
            match std::mem::replace(&mut self.state, DispatchState::Next) {
                DispatchState::Next => {
                    let Some(job) = self.pending.front() else {
                        return Ok(Yield::Finish);
                    };
                    self.state = DispatchState::Arrived;
                    return Ok(Yield::Timeout((job.arrival() - kernel.now()).max(0.0)));
                }
                DispatchState::Arrived => {
                    if !self.dispatch(world, kernel)? {
                        self.postpone_head(world, kernel.now())?;
                    }
                }
                DispatchState::Spawning(mut parts) => {
                    let Some(part) = parts.pop_front() else {
                        continue;
                    };
                    self.spawn_retrieval(part, world, kernel)?;
                    self.state = DispatchState::Spawning(parts);
                    return Ok(Yield::Timeout(0.0));
                }
            }
        }
    }
}
