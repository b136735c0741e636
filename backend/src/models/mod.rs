//! Domain models for the warehouse simulator

pub mod depot;
pub mod event;
pub mod job;
pub mod location;
pub mod machine;
pub mod rack;
pub mod warehouse;

// Re-exports
pub use depot::Depot;
pub use event::{Event, EventLog};
pub use job::{Bundle, Code, CodeId, Job, JobId, JobKind, Milestone, Point3};
pub use location::{Location, LocationId, PackingError, Slot, Space};
pub use machine::{Crane, Lift, Machine, Shuttle};
pub use rack::Rack;
pub use warehouse::{MachineUsage, Warehouse};
