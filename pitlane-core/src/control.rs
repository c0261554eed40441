//! Controllers choosing the actions of agents.
mod manual;
mod policy;
mod waypoint;
use crate::{
    base::VehicleControl,
    record::{Record, RecordValue},
    state::StateSnapshot,
    track::WaypointTrack,
};
pub use manual::ManualController;
pub use policy::{ActionModel, PolicyController};
use serde::{Deserialize, Serialize};
pub use waypoint::{WaypointController, WaypointControllerConfig};

/// Actuator values chosen by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    /// Throttle if positive, brake if negative, in `[-1, 1]`.
    pub gas_brake: f64,

    /// Steering in `[-1, 1]`.
    pub steer: f64,
}

impl Action {
    /// Keys of the action in reports.
    pub const KEYS: [&'static str; 2] = ["gas_brake", "steer"];

    /// Constructs an action, clamping both values to `[-1, 1]`.
    pub fn new(gas_brake: f64, steer: f64) -> Self {
        Self {
            gas_brake: gas_brake.clamp(-1.0, 1.0),
            steer: steer.clamp(-1.0, 1.0),
        }
    }

    /// Flattens the action into a record.
    pub fn to_record(&self) -> Record {
        Record::from_slice(&[
            (Self::KEYS[0], RecordValue::Scalar(self.gas_brake)),
            (Self::KEYS[1], RecordValue::Scalar(self.steer)),
        ])
    }
}

impl From<&Action> for VehicleControl {
    fn from(action: &Action) -> Self {
        let (throttle, brake) = if action.gas_brake >= 0.0 {
            (action.gas_brake, 0.0)
        } else {
            (0.0, -action.gas_brake)
        };
        VehicleControl {
            throttle,
            brake,
            steer: action.steer,
            gear: 1,
            ..VehicleControl::default()
        }
    }
}

/// Chooses actions from states.
///
/// The controller is a black box to the agent owning it. It sees the state of
/// the agent and the track the agent follows.
pub trait Controller: Send {
    /// Chooses the action in `state`.
    fn control(&mut self, state: &StateSnapshot, waypoints: &WaypointTrack) -> Action;

    /// Name of the controller, part of the name of the agent.
    fn name(&self) -> &str;

    /// Descriptor of the controller, written to the metadata of the agent.
    fn info(&self) -> serde_json::Value;

    /// Returns `true` if the controller consumes sensor frames.
    ///
    /// Reporting then derives its schema from a state holding placeholder frames.
    fn requires_frames(&self) -> bool {
        false
    }
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn control(&mut self, state: &StateSnapshot, waypoints: &WaypointTrack) -> Action {
        (**self).control(state, waypoints)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn info(&self) -> serde_json::Value {
        (**self).info()
    }

    fn requires_frames(&self) -> bool {
        (**self).requires_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_to_vehicle_control() {
        let c = VehicleControl::from(&Action::new(0.7, -0.3));
        assert_eq!((c.throttle, c.brake, c.steer, c.gear), (0.7, 0.0, -0.3, 1));
        assert_eq!(c.gas_brake(), 0.7);

        let c = VehicleControl::from(&Action::new(-0.4, 0.0));
        assert_eq!((c.throttle, c.brake), (0.0, 0.4));
        assert_eq!(c.gas_brake(), -0.4);

        let c = VehicleControl::from(&Action::new(0.0, 0.0));
        assert_eq!((c.throttle, c.brake), (0.0, 0.0));
    }

    #[test]
    fn action_is_clamped_and_flattened() {
        let a = Action::new(3.0, -2.0);
        assert_eq!(a, Action { gas_brake: 1.0, steer: -1.0 });
        let keys: Vec<_> = a.to_record().keys().cloned().collect();
        assert_eq!(keys, Action::KEYS.to_vec());
    }
}
