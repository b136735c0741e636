//! Job model
//!
//! A job is one handling operation of the warehouse:
//! - INPUT: one or two bundles enter from a depot and are stored in a location
//! - OUTPUT: bundles of a code are retrieved from storage and delivered to a depot
//!
//! Each job carries:
//! - Arrival time and depot
//! - Product code, bundle length, total weight, quality and quantity (1 or 2)
//! - The bundles it moves (INPUT: until placed; OUTPUT sub-jobs: the picked bundles)
//! - Destination coordinate once the location is known
//! - History of START/END timestamps

use crate::models::location::LocationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A point in warehouse space (x, y, z), metres
pub type Point3 = [f64; 3];

/// Identifier of a product code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeId(pub u32);

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Immutable product type
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::models::{Code, CodeId};
///
/// let code = Code::new(CodeId(1), 6, 1000.0);
/// assert_eq!(code.length, 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Code {
    /// Product identifier
    pub id: CodeId,

    /// Length of one bundle, in shelf units
    pub length: u32,

    /// Weight of one bundle
    pub weight: f64,
}

impl Code {
    /// Create a new code
    pub fn new(id: CodeId, length: u32, weight: f64) -> Self {
        Self { id, length, weight }
    }
}

/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Bundles enter the warehouse
    Input,
    /// Bundles leave the warehouse
    Output,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Input => write!(f, "INPUT"),
            JobKind::Output => write!(f, "OUTPUT"),
        }
    }
}

/// Named timestamps recorded in a job's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Milestone {
    /// The job was admitted into execution
    Start,
    /// The job finished its last physical step
    End,
}

/// Job identifier
///
/// Jobs from the demand sequence have `part == 0`. Retrieval sub-jobs
/// created by bundle aggregation share their parent's serial and are
/// numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId {
    pub serial: u64,
    pub part: u16,
}

impl JobId {
    /// Identifier of a demand job
    pub fn new(serial: u64) -> Self {
        Self { serial, part: 0 }
    }

    /// Identifier of the `part`-th sub-job of this job
    pub fn child(self, part: u16) -> Self {
        Self {
            serial: self.serial,
            part,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.part == 0 {
            write!(f, "J{}", self.serial)
        } else {
            write!(f, "J{}.{}", self.serial, self.part)
        }
    }
}

/// One physical unit of stored product
///
/// Placement fields are meaningful only while `location` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    code: CodeId,
    length: u32,
    weight: f64,
    quality: u32,
    start: u32,
    depth: usize,
    location: Option<LocationId>,
}

impl Bundle {
    /// Create an unplaced bundle
    pub fn new(code: &Code, weight: f64, quality: u32) -> Self {
        Self {
            code: code.id,
            length: code.length,
            weight,
            quality,
            start: 0,
            depth: 0,
            location: None,
        }
    }

    pub fn code(&self) -> CodeId {
        self.code
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// First occupied shelf offset
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last occupied shelf offset (inclusive)
    pub fn end(&self) -> u32 {
        self.start + self.length - 1
    }

    /// Depth layer (0 = front, 1 = rear)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Location currently holding this bundle
    pub fn location(&self) -> Option<LocationId> {
        self.location
    }

    pub fn is_placed(&self) -> bool {
        self.location.is_some()
    }

    /// Inclusive span overlap with another bundle
    pub fn overlaps(&self, other: &Bundle) -> bool {
        self.start <= other.end() && other.start <= self.end()
    }

    pub(crate) fn seat(&mut self, location: LocationId, depth: usize, start: u32) {
        self.location = Some(location);
        self.depth = depth;
        self.start = start;
    }
}

/// A warehouse operation
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::models::{Code, CodeId, Job, JobId, JobKind};
///
/// let code = Code::new(CodeId(1), 6, 1000.0);
/// let job = Job::new(JobId::new(0), 12.0, 0, JobKind::Input, code, 2, 3.0);
///
/// assert_eq!(job.quantity(), 2);
/// assert_eq!(job.weight(), 2000.0);
/// assert_eq!(job.bundles().len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    arrival: f64,
    depot: usize,
    kind: JobKind,
    code: Code,
    length: u32,
    weight: f64,
    quality: f64,
    quantity: u8,
    bundles: Vec<Bundle>,
    destination: Option<Point3>,
    history: BTreeMap<Milestone, f64>,
    postponements: u32,
}

impl Job {
    /// Create a job for `quantity` bundles of `code`
    ///
    /// INPUT jobs get their bundles immediately, each weighing
    /// `total weight / quantity`. OUTPUT jobs start empty.
    ///
    /// # Panics
    /// Panics if quantity is not 1 or 2, or if the code length is zero
    pub fn new(
        id: JobId,
        arrival: f64,
        depot: usize,
        kind: JobKind,
        code: Code,
        quantity: u8,
        quality: f64,
    ) -> Self {
        assert!(
            quantity == 1 || quantity == 2,
            "quantity must be 1 or 2"
        );
        assert!(code.length > 0, "code length must be positive");

        let weight = code.weight * f64::from(quantity);
        let bundles = match kind {
            JobKind::Input => (0..quantity)
                .map(|_| Bundle::new(&code, weight / f64::from(quantity), quality as u32))
                .collect(),
            JobKind::Output => Vec::new(),
        };

        Self {
            id,
            arrival,
            depot,
            kind,
            code,
            length: code.length,
            weight,
            quality,
            quantity,
            bundles,
            destination: None,
            history: BTreeMap::new(),
            postponements: 0,
        }
    }

    /// Create a retrieval sub-job carrying already-selected bundles
    ///
    /// Weight is the sum of the bundles' weights, quality their mean.
    /// Bundles are ordered front layer first.
    pub fn retrieval(parent: &Job, part: u16, mut bundles: Vec<Bundle>) -> Self {
        assert!(
            bundles.len() == 1 || bundles.len() == 2,
            "a retrieval moves one or two bundles"
        );
        bundles.sort_by_key(|b| b.depth());

        let weight = bundles.iter().map(Bundle::weight).sum();
        let quality = bundles.iter().map(|b| f64::from(b.quality())).sum::<f64>()
            / bundles.len() as f64;

        Self {
            id: parent.id.child(part),
            arrival: parent.arrival,
            depot: parent.depot,
            kind: JobKind::Output,
            code: parent.code,
            length: parent.length,
            weight,
            quality,
            quantity: bundles.len() as u8,
            bundles,
            destination: None,
            history: BTreeMap::new(),
            postponements: 0,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn arrival(&self) -> f64 {
        self.arrival
    }

    pub fn depot(&self) -> usize {
        self.depot
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    /// Bundle length in shelf units
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Total weight moved by the job
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Required (OUTPUT) or carried (INPUT) quality
    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn quantity(&self) -> u8 {
        self.quantity
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn destination(&self) -> Option<Point3> {
        self.destination
    }

    pub fn history(&self) -> &BTreeMap<Milestone, f64> {
        &self.history
    }

    /// Number of times the dispatcher moved this job later in the sequence
    pub fn postponements(&self) -> u32 {
        self.postponements
    }

    /// Time between START and END, once both are recorded
    pub fn lead_time(&self) -> Option<f64> {
        let start = self.history.get(&Milestone::Start)?;
        let end = self.history.get(&Milestone::End)?;
        Some(end - start)
    }

    /// A job is finalized once both START and END are recorded
    pub fn is_finalized(&self) -> bool {
        self.history.contains_key(&Milestone::Start) && self.history.contains_key(&Milestone::End)
    }

    pub fn record(&mut self, milestone: Milestone, time: f64) {
        self.history.insert(milestone, time);
    }

    pub(crate) fn bundles_mut(&mut self) -> &mut [Bundle] {
        &mut self.bundles
    }

    pub(crate) fn set_destination(&mut self, destination: Point3) {
        self.destination = Some(destination);
    }

    pub(crate) fn note_postponement(&mut self) {
        self.postponements += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> Code {
        Code::new(CodeId(3), 3, 500.0)
    }

    #[test]
    fn test_input_job_splits_weight_across_bundles() {
        let job = Job::new(JobId::new(1), 0.0, 0, JobKind::Input, code(), 2, 2.0);
        assert_eq!(job.weight(), 1000.0);
        assert!(job.bundles().iter().all(|b| b.weight() == 500.0));
        assert!(job.bundles().iter().all(|b| !b.is_placed()));
    }

    #[test]
    fn test_output_job_has_no_bundles() {
        let job = Job::new(JobId::new(1), 0.0, 1, JobKind::Output, code(), 2, 2.0);
        assert!(job.bundles().is_empty());
    }

    #[test]
    #[should_panic(expected = "quantity must be 1 or 2")]
    fn test_invalid_quantity_panics() {
        Job::new(JobId::new(1), 0.0, 0, JobKind::Input, code(), 3, 1.0);
    }

    #[test]
    fn test_bundle_end_is_inclusive() {
        let mut bundle = Bundle::new(&code(), 500.0, 1);
        bundle.seat(LocationId::new(0, 0), 0, 2);
        assert_eq!(bundle.start(), 2);
        assert_eq!(bundle.end(), 4);
    }

    #[test]
    fn test_retrieval_averages_quality_and_sorts_by_depth() {
        let parent = Job::new(JobId::new(9), 5.0, 1, JobKind::Output, code(), 2, 2.0);
        let mut rear = Bundle::new(&code(), 400.0, 3);
        rear.seat(LocationId::new(0, 0), 1, 0);
        let mut front = Bundle::new(&code(), 600.0, 1);
        front.seat(LocationId::new(0, 0), 0, 0);

        let sub = Job::retrieval(&parent, 1, vec![rear, front]);
        assert_eq!(sub.id(), JobId { serial: 9, part: 1 });
        assert_eq!(sub.weight(), 1000.0);
        assert_eq!(sub.quality(), 2.0);
        assert_eq!(sub.quantity(), 2);
        assert_eq!(sub.bundles()[0].depth(), 0);
        assert_eq!(sub.bundles()[1].depth(), 1);
    }

    #[test]
    fn test_lead_time_requires_both_milestones() {
        let mut job = Job::new(JobId::new(1), 0.0, 0, JobKind::Input, code(), 1, 1.0);
        job.record(Milestone::Start, 10.0);
        assert_eq!(job.lead_time(), None);
        assert!(!job.is_finalized());
        job.record(Milestone::End, 70.0);
        assert_eq!(job.lead_time(), Some(60.0));
        assert!(job.is_finalized());
    }

    #[test]
    fn test_job_id_display() {
        assert_eq!(JobId::new(4).to_string(), "J4");
        assert_eq!(JobId::new(4).child(2).to_string(), "J4.2");
    }
}
