//! Configuration of [`HeadlessSim`](crate::HeadlessSim).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`HeadlessSim`](crate::HeadlessSim).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeadlessSimConfig {
    /// Map loaded at startup.
    pub initial_map: String,

    /// Maps accepted by `load_world`. Any name is accepted if empty.
    pub maps: Vec<String>,

    /// Height above the spawn point at which vehicles are dropped, in meters.
    pub spawn_height: f64,

    /// Gravitational acceleration in m/s^2.
    pub gravity: f64,

    /// Steering angle at full lock in degrees.
    pub max_steer_deg: f64,

    /// Distance between the axles in meters.
    pub wheelbase: f64,

    /// Acceleration at full throttle in m/s^2.
    pub max_accel: f64,

    /// Deceleration at full brake in m/s^2.
    pub max_decel: f64,

    /// Linear drag coefficient in 1/s.
    pub drag: f64,

    /// Vehicles closer than this distance in meters are in contact.
    ///
    /// Spawning a vehicle in contact with another one fails.
    pub min_separation: f64,

    /// Mass of the vehicles in kg, scaling collision impulses.
    pub mass: f64,

    /// Time per tick in seconds when the world has no fixed step.
    ///
    /// The default value is 0.05.
    pub default_delta: f64,

    /// Number of spawn points of the circuit of every map.
    pub track_points: usize,

    /// Radius of the circuit of every map in meters.
    pub track_radius: f64,

    /// Seed of the noise of camera frames.
    pub seed: u64,
}

impl Default for HeadlessSimConfig {
    fn default() -> Self {
        Self {
            initial_map: "Town04".to_string(),
            maps: ["Town01", "Town02", "Town03", "Town04", "Town05", "Town06", "Town07"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            spawn_height: 0.5,
            gravity: 9.81,
            max_steer_deg: 35.0,
            wheelbase: 2.9,
            max_accel: 4.0,
            max_decel: 8.0,
            drag: 0.05,
            min_separation: 2.0,
            mass: 1500.0,
            default_delta: 0.05,
            track_points: 400,
            track_radius: 300.0,
            seed: 42,
        }
    }
}

impl HeadlessSimConfig {
    /// Sets the map loaded at startup.
    pub fn initial_map(mut self, v: impl Into<String>) -> Self {
        self.initial_map = v.into();
        self
    }

    /// Sets the maps accepted by `load_world`.
    pub fn maps(mut self, v: &[&str]) -> Self {
        self.maps = v.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Sets the drop height of spawned vehicles.
    pub fn spawn_height(mut self, v: f64) -> Self {
        self.spawn_height = v;
        self
    }

    /// Sets the minimum separation of vehicles.
    pub fn min_separation(mut self, v: f64) -> Self {
        self.min_separation = v;
        self
    }

    /// Sets the time per tick of a world without fixed step.
    pub fn default_delta(mut self, v: f64) -> Self {
        self.default_delta = v;
        self
    }

    /// Sets the shape of the circuit.
    pub fn track(mut self, points: usize, radius: f64) -> Self {
        self.track_points = points;
        self.track_radius = radius;
        self
    }

    /// Sets the seed of the frame noise.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
