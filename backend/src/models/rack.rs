//! Storage rack
//!
//! A rack owns its locations, one crane and one lift per depot. Locations
//! refer back to the rack by index only.

use crate::models::job::{Job, Point3};
use crate::models::location::{Location, LocationId, PackingError};
use crate::models::machine::{Crane, Lift};
use serde::{Deserialize, Serialize};

/// Sum of absolute per-axis offsets
pub fn manhattan(a: Point3, b: Point3) -> f64 {
    (0..3).map(|i| (a[i] - b[i]).abs()).sum()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rack {
    id: usize,
    position: Point3,
    locations: Vec<Location>,
    pub crane: Crane,
    pub lifts: Vec<Lift>,
}

impl Rack {
    /// # Panics
    /// Panics if a location does not belong to rack `id` or sits at the wrong index
    pub fn new(id: usize, position: Point3, locations: Vec<Location>, crane: Crane, lifts: Vec<Lift>) -> Self {
        for (index, location) in locations.iter().enumerate() {
            assert_eq!(
                location.id(),
                LocationId::new(id, index),
                "location registered at the wrong arena slot"
            );
        }
        Self {
            id,
            position,
            locations,
            crane,
            lifts,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    pub fn location_mut(&mut self, index: usize) -> Option<&mut Location> {
        self.locations.get_mut(index)
    }

    /// Lift serving `depot`
    pub fn lift(&self, depot: usize) -> Option<&Lift> {
        self.lifts.get(depot)
    }

    pub fn capacity(&self) -> u32 {
        self.locations.iter().map(Location::capacity).sum()
    }

    pub fn occupied(&self) -> u32 {
        self.locations.iter().map(Location::occupied).sum()
    }

    /// Location indices by ascending distance from `reference`
    ///
    /// Ties keep arena order.
    pub fn locations_by_distance(&self, reference: Point3) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.locations.len()).collect();
        order.sort_by(|&a, &b| {
            let da = manhattan(reference, self.locations[a].position());
            let db = manhattan(reference, self.locations[b].position());
            da.total_cmp(&db)
        });
        order
    }

    /// Place the job into the nearest non-frozen location that has room
    pub fn place_nearest(&mut self, job: &mut Job, reference: Point3) -> Result<Option<LocationId>, PackingError> {
        for index in self.locations_by_distance(reference) {
            let location = &mut self.locations[index];
            if !location.is_frozen() && location.place(job)? {
                return Ok(Some(location.id()));
            }
        }
        Ok(None)
    }
}
