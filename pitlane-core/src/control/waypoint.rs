//! Pure pursuit along the waypoint track.
use super::{Action, Controller};
use crate::{state::StateSnapshot, track::WaypointTrack};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    f64::consts::PI,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`WaypointController`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WaypointControllerConfig {
    /// Distance to the pursued waypoint in meters.
    pub lookahead: f64,

    /// Cruising speed in km/h.
    pub target_speed: f64,

    /// Gain from the speed error in km/h to `gas_brake`.
    pub speed_gain: f64,

    /// Wheelbase of the vehicle in meters.
    pub wheelbase: f64,

    /// Wheel angle at full steering in degrees.
    pub max_steer_deg: f64,
}

impl Default for WaypointControllerConfig {
    fn default() -> Self {
        Self {
            lookahead: 8.0,
            target_speed: 30.0,
            speed_gain: 0.1,
            wheelbase: 2.9,
            max_steer_deg: 35.0,
        }
    }
}

impl WaypointControllerConfig {
    /// Sets the lookahead distance.
    pub fn lookahead(mut self, v: f64) -> Self {
        self.lookahead = v;
        self
    }

    /// Sets the cruising speed.
    pub fn target_speed(mut self, v: f64) -> Self {
        self.target_speed = v;
        self
    }

    /// Sets the speed gain.
    pub fn speed_gain(mut self, v: f64) -> Self {
        self.speed_gain = v;
        self
    }

    /// Sets the wheelbase.
    pub fn wheelbase(mut self, v: f64) -> Self {
        self.wheelbase = v;
        self
    }

    /// Sets the wheel angle at full steering.
    pub fn max_steer_deg(mut self, v: f64) -> Self {
        self.max_steer_deg = v;
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

/// Follows the track by steering towards a point `lookahead` meters ahead.
///
/// The pursued point is the first track point after the nearest one lying at
/// least `lookahead` away, or the last point of the track. Speed is held around
/// `target_speed` with a proportional term.
#[derive(Debug, Clone, Default)]
pub struct WaypointController {
    config: WaypointControllerConfig,
}

impl WaypointController {
    /// Constructs the controller.
    pub fn new(config: WaypointControllerConfig) -> Self {
        Self { config }
    }

    fn target(&self, state: &StateSnapshot, waypoints: &WaypointTrack) -> usize {
        let (closest, dists) = waypoints.closest_point_and_distances(&state.location);
        (closest + 1..dists.len())
            .find(|&i| dists[i] >= self.config.lookahead)
            .unwrap_or(dists.len() - 1)
    }
}

impl Controller for WaypointController {
    fn control(&mut self, state: &StateSnapshot, waypoints: &WaypointTrack) -> Action {
        let target = waypoints.points()[self.target(state, waypoints)];
        let dx = target.x - state.location.x;
        let dy = target.y - state.location.y;
        let ld = (dx * dx + dy * dy).sqrt();

        let steer = if ld > f64::EPSILON {
            let mut alpha = dy.atan2(dx) - state.yaw.to_radians();
            while alpha > PI {
                alpha -= 2.0 * PI;
            }
            while alpha < -PI {
                alpha += 2.0 * PI;
            }
            let wheel = (2.0 * self.config.wheelbase * alpha.sin() / ld).atan();
            wheel / self.config.max_steer_deg.to_radians()
        } else {
            0.0
        };
        let gas_brake = self.config.speed_gain * (self.config.target_speed - state.velocity);

        Action::new(gas_brake, steer)
    }

    fn name(&self) -> &str {
        "WaypointController"
    }

    fn info(&self) -> serde_json::Value {
        json!({
            "type": self.name(),
            "lookahead": self.config.lookahead,
            "target_speed": self.config.target_speed,
            "speed_gain": self.config.speed_gain,
            "wheelbase": self.config.wheelbase,
            "max_steer_deg": self.config.max_steer_deg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{SpawnPoint, Vector3};
    use tempdir::TempDir;

    fn straight() -> WaypointTrack {
        let source: Vec<_> = (0..50)
            .map(|i| SpawnPoint::new(2.0 * i as f64, 0.0, 0.0, 0.0))
            .collect();
        WaypointTrack::new(&source, 0).unwrap()
    }

    fn state(x: f64, y: f64, yaw: f64, velocity: f64) -> StateSnapshot {
        StateSnapshot {
            location: Vector3::new(x, y, 0.0),
            yaw,
            velocity,
            ..Default::default()
        }
    }

    #[test_log::test]
    fn steers_back_onto_the_track() {
        let mut c = WaypointController::default();
        let track = straight();

        let a = c.control(&state(10.0, 0.0, 0.0, 30.0), &track);
        assert!(a.steer.abs() < 1e-9);
        assert!(a.gas_brake.abs() < 1e-9);

        // left of the track, heading along it: steer right
        let a = c.control(&state(10.0, 3.0, 0.0, 30.0), &track);
        assert!(a.steer < 0.0);

        let a = c.control(&state(10.0, -3.0, 0.0, 30.0), &track);
        assert!(a.steer > 0.0);
    }

    #[test_log::test]
    fn speed_is_held_around_target() {
        let mut c = WaypointController::new(WaypointControllerConfig::default().target_speed(20.0));
        let track = straight();
        assert_eq!(c.control(&state(0.0, 0.0, 0.0, 0.0), &track).gas_brake, 1.0);
        assert!(c.control(&state(0.0, 0.0, 0.0, 25.0), &track).gas_brake < 0.0);
    }

    #[test_log::test]
    fn test_serde_waypoint_controller_config() -> Result<()> {
        let config = WaypointControllerConfig::default()
            .lookahead(5.0)
            .wheelbase(2.5);
        let dir = TempDir::new("waypoint_controller")?;
        let path = dir.path().join("waypoint_controller.yaml");
        config.save(&path)?;
        assert_eq!(WaypointControllerConfig::load(&path)?, config);
        Ok(())
    }
}
