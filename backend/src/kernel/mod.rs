//! Discrete-event kernel
//!
//! Single-threaded cooperative scheduling over one time-ordered queue.
//! A process is a resumable state machine: each call to
//! [`Process::resume`] runs it until its next suspension point, which it
//! reports as a [`Yield`]. Processes suspend only on:
//!
//! - a timed delay ([`Yield::Timeout`]),
//! - an acquisition wait on an exclusive resource ([`Yield::Acquire`]),
//! - a join on another process ([`Yield::Join`]).
//!
//! # Ordering
//!
//! Wake-ups come out by time, then by issue order. Resource grants follow
//! (priority, request order). Two runs that issue the same calls therefore
//! resume processes in exactly the same order.
//!
//! # Example
//! ```
//! use asrs_simulator_core_rs::kernel::{Kernel, KernelError, Process, Yield};
//!
//! struct Sleeper {
//!     done: bool,
//! }
//!
//! impl Process<Vec<f64>, KernelError> for Sleeper {
//!     fn resume(
//!         &mut self,
//!         log: &mut Vec<f64>,
//!         kernel: &mut Kernel<Vec<f64>, KernelError>,
//!     ) -> Result<Yield, KernelError> {
//!         log.push(kernel.now());
//!         if self.done {
//!             return Ok(Yield::Finish);
//!         }
//!         self.done = true;
//!         Ok(Yield::Timeout(2.5))
//!     }
//! }
//!
//! let mut kernel: Kernel<Vec<f64>, KernelError> = Kernel::new();
//! kernel.spawn(Box::new(Sleeper { done: false }));
//! let mut log = Vec::new();
//! assert_eq!(kernel.run(&mut log).unwrap(), 2.5);
//! assert_eq!(log, vec![0.0, 2.5]);
//! ```

mod queue;
mod resource;

pub use resource::{Priority, ResourceId};

use crate::core::time::SimClock;
use queue::WakeupQueue;
use resource::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Arena index of a spawned process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub(crate) usize);

impl ProcessId {
    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc#{}", self.0)
    }
}

/// Kernel misuse
///
/// All variants are invariant violations of the caller, never outcomes
/// of the simulated system.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    #[error("invalid delay {delay} requested by {process}")]
    InvalidDelay { process: ProcessId, delay: f64 },

    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),

    #[error("release of {resource} ({name}) which nobody holds")]
    NotHeld { resource: ResourceId, name: String },

    #[error("event queue drained with {pending} process(es) still suspended")]
    Stalled { pending: usize },
}

/// Suspension point reported by a process
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Yield {
    /// Resume after the given number of seconds (zero is allowed)
    Timeout(f64),
    /// Resume once the resource is granted
    Acquire {
        resource: ResourceId,
        priority: Priority,
    },
    /// Resume once the other process has finished
    Join(ProcessId),
    /// The process is done
    Finish,
}

/// A resumable process over a shared world `W`
pub trait Process<W, E> {
    fn resume(&mut self, world: &mut W, kernel: &mut Kernel<W, E>) -> Result<Yield, E>;
}

struct ProcessEntry<W, E> {
    /// `None` while the process is running or after it finished
    body: Option<Box<dyn Process<W, E>>>,
    finished: bool,
    joiners: Vec<ProcessId>,
}

/// The event kernel
pub struct Kernel<W, E> {
    clock: SimClock,
    queue: WakeupQueue,
    processes: Vec<ProcessEntry<W, E>>,
    resources: Vec<Resource>,
    current: Option<ProcessId>,
}

impl<W, E> Default for Kernel<W, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W, E> Kernel<W, E> {
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            queue: WakeupQueue::default(),
            processes: Vec::new(),
            resources: Vec::new(),
            current: None,
        }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Process being resumed, if called from inside `resume`
    pub fn current(&self) -> Option<ProcessId> {
        self.current
    }

    /// Number of processes spawned so far
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn is_finished(&self, process: ProcessId) -> bool {
        self.processes
            .get(process.0)
            .map(|entry| entry.finished)
            .unwrap_or(false)
    }

    /// Register a capacity-one resource
    pub fn add_resource(&mut self, name: impl Into<String>) -> ResourceId {
        self.resources.push(Resource::new(name.into()));
        ResourceId::new(self.resources.len() - 1)
    }

    pub fn resource_name(&self, resource: ResourceId) -> Result<&str, KernelError> {
        Ok(self.resource(resource)?.name())
    }

    pub fn holder(&self, resource: ResourceId) -> Result<Option<ProcessId>, KernelError> {
        Ok(self.resource(resource)?.holder())
    }

    /// Users in service plus users queued
    pub fn congestion(&self, resource: ResourceId) -> Result<usize, KernelError> {
        Ok(self.resource(resource)?.congestion())
    }

    /// Number of grants the resource has handed out
    pub fn grants(&self, resource: ResourceId) -> Result<u64, KernelError> {
        Ok(self.resource(resource)?.grants())
    }

    /// Start a process; its first resumption happens at the current time
    pub fn spawn(&mut self, body: Box<dyn Process<W, E>>) -> ProcessId {
        let id = ProcessId(self.processes.len());
        self.processes.push(ProcessEntry {
            body: Some(body),
            finished: false,
            joiners: Vec::new(),
        });
        self.queue.push(self.clock.now(), id);
        id
    }

    /// Free a resource; the best waiter, if any, is granted it and woken now
    ///
    /// A lock may be released by a different process than the one that
    /// acquired it.
    pub fn release(&mut self, resource: ResourceId) -> Result<(), KernelError> {
        let now = self.clock.now();
        let entry = self
            .resources
            .get_mut(resource.raw())
            .ok_or(KernelError::UnknownResource(resource))?;
        if entry.holder().is_none() {
            return Err(KernelError::NotHeld {
                resource,
                name: entry.name().to_string(),
            });
        }
        if let Some(next) = entry.release() {
            self.queue.push(now, next);
        }
        Ok(())
    }

    fn resource(&self, resource: ResourceId) -> Result<&Resource, KernelError> {
        self.resources
            .get(resource.raw())
            .ok_or(KernelError::UnknownResource(resource))
    }

    fn finish(&mut self, process: ProcessId) {
        let now = self.clock.now();
        let entry = &mut self.processes[process.0];
        entry.finished = true;
        for joiner in std::mem::take(&mut entry.joiners) {
            self.queue.push(now, joiner);
        }
    }
}

impl<W, E: From<KernelError>> Kernel<W, E> {
    /// Run until the event queue drains; returns the final simulated time
    ///
    /// Fails with [`KernelError::Stalled`] if some process is still
    /// suspended when nothing is left to wake it.
    pub fn run(&mut self, world: &mut W) -> Result<f64, E> {
        while let Some(wakeup) = self.queue.pop() {
            self.clock.advance_to(wakeup.time);
            self.step(wakeup.process, world)?;
        }

        let pending = self.processes.iter().filter(|p| !p.finished).count();
        if pending > 0 {
            return Err(KernelError::Stalled { pending }.into());
        }
        Ok(self.clock.now())
    }

    fn step(&mut self, process: ProcessId, world: &mut W) -> Result<(), E> {
        let mut body = self
            .processes
            .get_mut(process.0)
            .and_then(|entry| entry.body.take())
            .ok_or(KernelError::UnknownProcess(process))?;

        self.current = Some(process);
        let outcome = body.resume(world, self);
        self.current = None;

        match outcome? {
            Yield::Finish => {
                self.finish(process);
                return Ok(());
            }
            Yield::Timeout(delay) => {
                if !delay.is_finite() || delay < 0.0 {
                    return Err(KernelError::InvalidDelay { process, delay }.into());
                }
                self.queue.push(self.clock.now() + delay, process);
            }
            Yield::Acquire { resource, priority } => {
                let seq = self.queue.next_seq();
                let granted = self
                    .resources
                    .get_mut(resource.raw())
                    .ok_or(KernelError::UnknownResource(resource))?
                    .request(process, priority, seq);
                if granted {
                    self.queue.push(self.clock.now(), process);
                }
            }
            Yield::Join(target) => {
                let entry = self
                    .processes
                    .get_mut(target.0)
                    .ok_or(KernelError::UnknownProcess(target))?;
                if entry.finished {
                    self.queue.push(self.clock.now(), process);
                } else {
                    entry.joiners.push(process);
                }
            }
        }

        self.processes[process.0].body = Some(body);
        Ok(())
    }
}
