//! Motion resources: shuttles, lifts and cranes
//!
//! Every machine moves along the axes enabled by its direction mask with a
//! trapezoidal velocity profile. The exclusive-use lock of each machine lives
//! in the event kernel; machines here only carry geometry and kinematics
//! plus the [`ResourceId`] of their lock.
//!
//! A crane is three single-axis machines behind one lock. Once acquired,
//! its axes can run concurrently; a concurrent leg lasts as long as its
//! slowest axis.

use crate::kernel::ResourceId;
use crate::models::job::Point3;
use serde::{Deserialize, Serialize};

/// Axis masks
pub const AXIS_X: [f64; 3] = [1.0, 0.0, 0.0];
pub const AXIS_Y: [f64; 3] = [0.0, 1.0, 0.0];
pub const AXIS_Z: [f64; 3] = [0.0, 0.0, 1.0];

/// Duration of a point-to-point move of length `distance`
///
/// Below the transitory distance `2v²/2a` the machine never reaches
/// cruise speed.
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::models::machine::trapezoidal_time;
///
/// // v = 1, a = 1: transitory distance is 1
/// assert_eq!(trapezoidal_time(0.0, 1.0, 1.0), 0.0);
/// assert_eq!(trapezoidal_time(1.0, 1.0, 1.0), 1.0);
/// assert_eq!(trapezoidal_time(3.0, 1.0, 1.0), 4.0);
/// ```
pub fn trapezoidal_time(distance: f64, speed: f64, acceleration: f64) -> f64 {
    if distance <= 0.0 {
        return 0.0;
    }
    let transitory = 2.0 * speed * speed / (2.0 * acceleration);
    if distance <= transitory {
        (distance * acceleration).sqrt() / acceleration
    } else {
        (distance - transitory) / speed + 2.0 * speed / acceleration
    }
}

/// A single machine moving on masked axes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    speed: f64,
    acceleration: f64,
    position: Point3,
    direction: [f64; 3],
    moving_time: f64,
}

impl Machine {
    /// Create a machine at `position`
    ///
    /// # Panics
    /// Panics if speed or acceleration is not positive
    pub fn new(speed: f64, acceleration: f64, position: Point3, direction: [f64; 3]) -> Self {
        assert!(speed > 0.0, "speed must be positive");
        assert!(acceleration > 0.0, "acceleration must be positive");
        Self {
            speed,
            acceleration,
            position,
            direction,
            moving_time: 0.0,
        }
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    /// Cumulative seconds spent moving
    pub fn moving_time(&self) -> f64 {
        self.moving_time
    }

    /// Distance to `target` along the enabled axes
    pub fn distance_to(&self, target: Point3) -> f64 {
        (0..3)
            .map(|i| (self.position[i] - target[i]).abs() * self.direction[i])
            .sum()
    }

    /// Duration of a move to `target`, without moving
    pub fn travel_time(&self, target: Point3) -> f64 {
        trapezoidal_time(self.distance_to(target), self.speed, self.acceleration)
    }

    /// Start a move to `target`: the position updates now, the returned
    /// duration is how long the caller must wait.
    pub fn move_to(&mut self, target: Point3) -> f64 {
        let time = self.travel_time(target);
        if time > 0.0 {
            self.moving_time += time;
            self.position = target;
        }
        time
    }
}

/// Shuttle serving one depot, moving along z
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shuttle {
    pub machine: Machine,
    pub resource: ResourceId,
}

impl Shuttle {
    pub fn new(speed: f64, acceleration: f64, position: Point3, resource: ResourceId) -> Self {
        Self {
            machine: Machine::new(speed, acceleration, position, AXIS_Z),
            resource,
        }
    }
}

/// Lift connecting a depot's shuttle level to a rack's crane level, moving along y
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lift {
    pub machine: Machine,
    pub upper: Point3,
    pub lower: Point3,
    pub resource: ResourceId,
}

impl Lift {
    pub fn new(
        speed: f64,
        acceleration: f64,
        position: Point3,
        upper: Point3,
        lower: Point3,
        resource: ResourceId,
    ) -> Self {
        Self {
            machine: Machine::new(speed, acceleration, position, AXIS_Y),
            upper,
            lower,
            resource,
        }
    }
}

/// Rack crane: three independent axes behind one lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crane {
    pub x: Machine,
    pub y: Machine,
    pub z: Machine,
    pub resource: ResourceId,
}

impl Crane {
    pub fn new(speeds: [f64; 3], accelerations: [f64; 3], position: Point3, resource: ResourceId) -> Self {
        Self {
            x: Machine::new(speeds[0], accelerations[0], position, AXIS_X),
            y: Machine::new(speeds[1], accelerations[1], position, AXIS_Y),
            z: Machine::new(speeds[2], accelerations[2], position, AXIS_Z),
            resource,
        }
    }

    /// Current position assembled from the three axes
    pub fn position(&self) -> Point3 {
        [self.x.position()[0], self.y.position()[1], self.z.position()[2]]
    }

    /// Cumulative moving time over all axes
    pub fn moving_time(&self) -> f64 {
        self.x.moving_time() + self.y.moving_time() + self.z.moving_time()
    }

    fn move_xz(&mut self, target: Point3) -> f64 {
        let x = self.x.move_to(target);
        let z = self.z.move_to(target);
        x.max(z)
    }

    /// Reach a pick-up point: y first, then x and z together
    pub fn prepare_in(&mut self, pickup: Point3) -> f64 {
        let y = self.y.move_to(pickup);
        y + self.move_xz(pickup)
    }

    /// Deliver to `destination`: x and z together, y, then the transfer
    pub fn take_in(&mut self, destination: Point3, transfer: f64) -> f64 {
        let xz = self.move_xz(destination);
        xz + self.y.move_to(destination) + transfer
    }

    /// Fetch from `destination` and come back to `dropoff`
    ///
    /// y to the drop-off level, x and z to the location, y to the location,
    /// transfer, then y back and x and z back.
    pub fn take_out(&mut self, dropoff: Point3, destination: Point3, transfer: f64) -> f64 {
        let mut total = self.y.move_to(dropoff);
        total += self.move_xz(destination);
        total += self.y.move_to(destination);
        total += transfer;
        total += self.y.move_to(dropoff);
        total + self.move_xz(dropoff)
    }
}
