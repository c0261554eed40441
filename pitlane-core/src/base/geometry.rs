//! Positions, orientations and vehicle controls.
use serde::{Deserialize, Serialize};

/// A 3D vector, used for locations, velocities and impulses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component.
    pub x: f64,

    /// Y component.
    pub y: f64,

    /// Z component.
    pub z: f64,
}

impl Vector3 {
    /// Constructs a vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Vector3) -> f64 {
        (*self - *other).norm()
    }

    /// Sum of the components.
    pub fn component_sum(&self) -> f64 {
        self.x + self.y + self.z
    }

    /// Components as an array `[x, y, z]`.
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl std::ops::Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    /// Pitch in degrees.
    pub pitch: f64,

    /// Yaw in degrees.
    pub yaw: f64,

    /// Roll in degrees.
    pub roll: f64,
}

/// Location and orientation of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Location in world coordinates, or relative to the parent for attached actors.
    pub location: Vector3,

    /// Orientation.
    pub rotation: Rotation,
}

impl Transform {
    /// Constructs a transform from a location and a yaw.
    pub fn from_location_yaw(location: Vector3, yaw: f64) -> Self {
        Self {
            location,
            rotation: Rotation {
                yaw,
                ..Rotation::default()
            },
        }
    }

    /// Flattens the transform as `[x, y, z, yaw, pitch, roll]`.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.location.x,
            self.location.y,
            self.location.z,
            self.rotation.yaw,
            self.rotation.pitch,
            self.rotation.roll,
        ]
    }
}

/// A point of a race track as provided by the map, `(x, y, z, yaw)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// X coordinate.
    pub x: f64,

    /// Y coordinate.
    pub y: f64,

    /// Z coordinate.
    pub z: f64,

    /// Heading in degrees.
    pub yaw: f64,
}

impl SpawnPoint {
    /// Constructs a spawn point.
    pub fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self { x, y, z, yaw }
    }

    /// Position without the heading.
    pub fn location(&self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Transform used for spawning a vehicle on this point.
    pub fn to_transform(&self) -> Transform {
        Transform::from_location_yaw(self.location(), self.yaw)
    }
}

/// Actuator values of a vehicle, as understood by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleControl {
    /// Throttle in `[0, 1]`.
    pub throttle: f64,

    /// Steering in `[-1, 1]`.
    pub steer: f64,

    /// Brake in `[0, 1]`.
    pub brake: f64,

    /// Hand brake.
    pub hand_brake: bool,

    /// Reverse gear.
    pub reverse: bool,

    /// Gear.
    pub gear: i32,
}

impl VehicleControl {
    /// Full brake in first gear, applied right after spawning.
    pub fn full_brake() -> Self {
        Self {
            brake: 1.0,
            gear: 1,
            ..Self::default()
        }
    }

    /// Zero throttle and brake in first gear, applied before stepping starts.
    pub fn released() -> Self {
        Self {
            gear: 1,
            ..Self::default()
        }
    }

    /// Throttle minus brake.
    pub fn gas_brake(&self) -> f64 {
        self.throttle - self.brake
    }
}
