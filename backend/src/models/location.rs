//! Storage location and free-space packing
//!
//! A location is a shelf of fixed `length` with one or two depth layers.
//! Each layer is kept as a list of slots sorted by start offset, where a slot
//! is either a free [`Space`] or a stored [`Bundle`]. Slots tile the layer
//! exactly: no gaps, no overlaps.
//!
//! # Critical Invariants
//!
//! 1. **Conservation**: for each layer, Σ free lengths + Σ bundle lengths == length
//! 2. **Order**: slots are sorted by start and contiguous from 0 to length
//! 3. **Atomic placement**: `place` seats all of a job's bundles or none
//! 4. **Coalescing**: after `take`, no two adjacent free spaces remain around
//!    the freed slot

use crate::models::job::{Bundle, CodeId, Job, JobKind, Point3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Arena index of a location: rack index plus position inside the rack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId {
    pub rack: usize,
    pub index: usize,
}

impl LocationId {
    pub fn new(rack: usize, index: usize) -> Self {
        Self { rack, index }
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}/L{}", self.rack, self.index)
    }
}

/// Geometry contradictions between the dispatcher and a location
///
/// These are programming-invariant violations: they stop the trial and
/// are never scored.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PackingError {
    #[error("job {job} expected {expected} bundles but carries {found}")]
    BundleCountMismatch {
        job: String,
        expected: u8,
        found: usize,
    },

    #[error("bundle of job {job} is already placed in {location}")]
    AlreadyPlaced { job: String, location: LocationId },

    #[error("bundle bound to {found:?} was taken from {expected}")]
    WrongLocation {
        expected: LocationId,
        found: Option<LocationId>,
    },

    #[error("no bundle of code {code} at depth {depth}, offset {start} in {location}")]
    BundleNotFound {
        location: LocationId,
        depth: usize,
        start: u32,
        code: CodeId,
    },

    #[error("{kind} job cannot be {operation} a location")]
    WrongKind {
        kind: JobKind,
        operation: &'static str,
    },

    #[error("layout of {location}, depth {depth} is broken: {reason}")]
    LayoutBroken {
        location: LocationId,
        depth: usize,
        reason: String,
    },
}

/// A free interval `[start, start + length)` of one depth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub start: u32,
    pub length: u32,
}

impl Space {
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// One past the last free offset
    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    /// Common part of two spaces, if any
    pub fn intersection(&self, other: &Space) -> Option<Space> {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        (end > start).then(|| Space::new(start, end - start))
    }
}

/// Entry of a depth layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    Free(Space),
    Stored(Bundle),
}

impl Slot {
    pub fn start(&self) -> u32 {
        match self {
            Slot::Free(space) => space.start,
            Slot::Stored(bundle) => bundle.start(),
        }
    }

    pub fn length(&self) -> u32 {
        match self {
            Slot::Free(space) => space.length,
            Slot::Stored(bundle) => bundle.length(),
        }
    }

    pub fn as_space(&self) -> Option<&Space> {
        match self {
            Slot::Free(space) => Some(space),
            Slot::Stored(_) => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            Slot::Free(_) => None,
            Slot::Stored(bundle) => Some(bundle),
        }
    }
}

/// Where the bundles of a job will go: one `(depth, start)` per bundle
type Seating = Vec<(usize, u32)>;

/// A storage location inside a rack
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::models::{Code, CodeId, Job, JobId, JobKind, Location, LocationId};
///
/// let mut location = Location::new(LocationId::new(0, 0), [0.0, 0.0, 0.0], 6, 1, 2.0);
/// let code = Code::new(CodeId(1), 4, 800.0);
/// let mut job = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code, 1, 1.0);
///
/// assert!(location.place(&mut job).unwrap());
/// assert_eq!(location.free_length(0), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    position: Point3,
    length: u32,
    depth: usize,
    shelf_pitch: f64,
    layers: Vec<Vec<Slot>>,
    codes: BTreeMap<CodeId, u32>,
    frozen: bool,
}

impl Location {
    /// Create an empty location
    ///
    /// # Panics
    /// Panics if length is zero or depth is not 1 or 2
    pub fn new(id: LocationId, position: Point3, length: u32, depth: usize, shelf_pitch: f64) -> Self {
        assert!(length > 0, "location length must be positive");
        assert!(depth == 1 || depth == 2, "location depth must be 1 or 2");

        Self {
            id,
            position,
            length,
            depth,
            shelf_pitch,
            layers: (0..depth)
                .map(|_| vec![Slot::Free(Space::new(0, length))])
                .collect(),
            codes: BTreeMap::new(),
            frozen: false,
        }
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    /// Owning rack (back-reference by index)
    pub fn rack(&self) -> usize {
        self.id.rack
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total shelf units over all layers
    pub fn capacity(&self) -> u32 {
        self.length * self.depth as u32
    }

    /// Shelf units held by bundles over all layers
    pub fn occupied(&self) -> u32 {
        self.bundles().map(Bundle::length).sum()
    }

    /// Slots of one depth layer, sorted by start
    pub fn layer(&self, depth: usize) -> &[Slot] {
        &self.layers[depth]
    }

    /// Free shelf units in one layer
    pub fn free_length(&self, depth: usize) -> u32 {
        self.spaces(depth).map(|s| s.length).sum()
    }

    /// Free spaces of one layer, sorted by start
    pub fn spaces(&self, depth: usize) -> impl Iterator<Item = &Space> {
        self.layers[depth].iter().filter_map(Slot::as_space)
    }

    /// Stored bundles, front layer first
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.layers.iter().flatten().filter_map(Slot::as_bundle)
    }

    /// Number of stored bundles of `code`
    pub fn count(&self, code: CodeId) -> u32 {
        self.codes.get(&code).copied().unwrap_or(0)
    }

    pub fn keeps_code(&self, code: CodeId) -> bool {
        self.count(code) > 0
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    /// Crane coordinate of a bundle of `length` seated at `start`
    pub fn coordinate(&self, length: u32, start: u32) -> Point3 {
        let offset = (f64::from(length) / 2.0 + f64::from(start)) * self.shelf_pitch;
        [self.position[0], self.position[1], self.position[2] + offset]
    }

    /// Seat all of the job's bundles in this location
    ///
    /// Returns `Ok(false)` when no depth/offset combination has room; nothing
    /// is modified in that case. On success the bundles move into the
    /// location, the per-code counter grows and the job's destination is set.
    pub fn place(&mut self, job: &mut Job) -> Result<bool, PackingError> {
        if job.kind() != JobKind::Input {
            return Err(PackingError::WrongKind {
                kind: job.kind(),
                operation: "placed into",
            });
        }
        if job.bundles().len() != usize::from(job.quantity()) {
            return Err(PackingError::BundleCountMismatch {
                job: job.id().to_string(),
                expected: job.quantity(),
                found: job.bundles().len(),
            });
        }
        if let Some(location) = job.bundles().iter().find_map(Bundle::location) {
            return Err(PackingError::AlreadyPlaced {
                job: job.id().to_string(),
                location,
            });
        }

        let length = job.length();
        let Some(seating) = self.find_seating(length, job.quantity()) else {
            return Ok(false);
        };

        for (bundle, &(depth, start)) in job.bundles_mut().iter_mut().zip(&seating) {
            bundle.seat(self.id, depth, start);
            self.carve(bundle.clone())?;
        }

        *self.codes.entry(job.code().id).or_insert(0) += u32::from(job.quantity());
        job.set_destination(self.coordinate(length, seating[0].1));

        debug_assert!(self.check_layout().is_ok());
        Ok(true)
    }

    /// Remove the job's selected bundles from this location
    ///
    /// Every bundle must reference this location and sit at its recorded
    /// depth and offset; anything else is an invariant violation.
    pub fn take(&mut self, job: &mut Job) -> Result<(), PackingError> {
        if job.kind() != JobKind::Output {
            return Err(PackingError::WrongKind {
                kind: job.kind(),
                operation: "taken from",
            });
        }
        if job.bundles().is_empty() {
            return Err(PackingError::BundleCountMismatch {
                job: job.id().to_string(),
                expected: job.quantity(),
                found: 0,
            });
        }

        for bundle in job.bundles() {
            if bundle.location() != Some(self.id) {
                return Err(PackingError::WrongLocation {
                    expected: self.id,
                    found: bundle.location(),
                });
            }
            self.release(bundle)?;
        }

        let first = &job.bundles()[0];
        let destination = self.coordinate(first.length(), first.start());
        job.set_destination(destination);

        debug_assert!(self.check_layout().is_ok());
        Ok(())
    }

    /// Verify that every layer tiles `[0, length)` exactly
    pub fn check_layout(&self) -> Result<(), PackingError> {
        for (depth, layer) in self.layers.iter().enumerate() {
            let broken = |reason: String| PackingError::LayoutBroken {
                location: self.id,
                depth,
                reason,
            };

            let mut cursor = 0;
            for slot in layer {
                if slot.start() != cursor {
                    return Err(broken(format!(
                        "slot starts at {} but previous ends at {}",
                        slot.start(),
                        cursor
                    )));
                }
                if slot.length() == 0 {
                    return Err(broken(format!("empty slot at {}", cursor)));
                }
                cursor += slot.length();
            }
            if cursor != self.length {
                return Err(broken(format!(
                    "slots cover {} of {} units",
                    cursor, self.length
                )));
            }
        }
        Ok(())
    }

    fn find_seating(&self, length: u32, quantity: u8) -> Option<Seating> {
        match (quantity, self.depth) {
            (1, 1) => self
                .spaces(0)
                .find(|s| s.length >= length)
                .map(|s| vec![(0, s.start)]),
            (1, 2) => {
                // The first front space that fits decides: prefer the rear
                // behind it, else use the front itself.
                let front = self.spaces(0).find(|s| s.length >= length)?;
                let rear = self
                    .spaces(1)
                    .filter(|s| s.length >= length)
                    .find_map(|s| front.intersection(s).filter(|i| i.length >= length));
                match rear {
                    Some(common) => Some(vec![(1, common.start)]),
                    None => Some(vec![(0, front.start)]),
                }
            }
            (2, 2) => self
                .spaces(0)
                .filter(|s| s.length >= length)
                .find_map(|front| {
                    self.spaces(1)
                        .filter(|s| s.length >= length)
                        .find_map(|rear| front.intersection(rear).filter(|i| i.length >= length))
                })
                .map(|common| vec![(0, common.start), (1, common.start)]),
            _ => None,
        }
    }

    /// Cut the bundle's span out of the free space containing it
    fn carve(&mut self, bundle: Bundle) -> Result<(), PackingError> {
        let depth = bundle.depth();
        let start = bundle.start();
        let end = start + bundle.length();
        let layer = &mut self.layers[depth];

        let (index, space) = layer
            .iter()
            .enumerate()
            .find_map(|(i, slot)| match slot {
                Slot::Free(space) if space.start <= start && end <= space.end() => Some((i, *space)),
                _ => None,
            })
            .ok_or_else(|| PackingError::LayoutBroken {
                location: self.id,
                depth,
                reason: format!("no free space covers [{}, {})", start, end),
            })?;

        let mut replacement = Vec::with_capacity(3);
        if space.start < start {
            replacement.push(Slot::Free(Space::new(space.start, start - space.start)));
        }
        replacement.push(Slot::Stored(bundle));
        if end < space.end() {
            replacement.push(Slot::Free(Space::new(end, space.end() - end)));
        }
        layer.splice(index..=index, replacement);
        Ok(())
    }

    /// Free a stored bundle's slot and coalesce neighbouring spaces
    fn release(&mut self, bundle: &Bundle) -> Result<(), PackingError> {
        let depth = bundle.depth();
        let not_found = PackingError::BundleNotFound {
            location: self.id,
            depth,
            start: bundle.start(),
            code: bundle.code(),
        };
        if depth >= self.depth {
            return Err(not_found);
        }

        let layer = &mut self.layers[depth];
        let mut index = layer
            .iter()
            .position(|slot| match slot {
                Slot::Stored(stored) => {
                    stored.start() == bundle.start() && stored.code() == bundle.code()
                }
                Slot::Free(_) => false,
            })
            .ok_or(not_found)?;

        let mut freed = Space::new(bundle.start(), bundle.length());

        if let Some(Slot::Free(after)) = layer.get(index + 1) {
            freed.length += after.length;
            layer.remove(index + 1);
        }
        if index > 0 {
            if let Slot::Free(before) = layer[index - 1] {
                freed = Space::new(before.start, before.length + freed.length);
                layer.remove(index - 1);
                index -= 1;
            }
        }
        layer[index] = Slot::Free(freed);

        if let Some(count) = self.codes.get_mut(&bundle.code()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.codes.remove(&bundle.code());
            }
        }
        Ok(())
    }
}
