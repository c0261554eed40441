//! Controller backed by a learned model.
use super::{Action, Controller};
use crate::{
    sensor::{SensorFrame, SensorKind},
    state::StateSnapshot,
    track::{WaypointTrack, PROGRESS_SCALE},
};
use serde_json::json;
use std::collections::BTreeMap;

/// A learned mapping from observations to `[gas_brake, steer]`.
///
/// How the model is trained is out of the scope of this crate.
pub trait ActionModel: Send {
    /// Computes `[gas_brake, steer]` from scalar features and camera frames.
    ///
    /// `frames` is empty unless [`ActionModel::requires_frames`] returns `true`
    /// and frames are retrieved during collection.
    fn forward(
        &mut self,
        features: &[f32],
        frames: &BTreeMap<SensorKind, Vec<SensorFrame>>,
    ) -> [f32; 2];

    /// Descriptor of the model.
    fn info(&self) -> serde_json::Value;

    /// Returns `true` if the model consumes camera frames.
    fn requires_frames(&self) -> bool {
        true
    }
}

/// Feeds the state of the agent to an [`ActionModel`].
///
/// Scalar features are, in this order: speed / 100, steering, `gas_brake`,
/// yaw / 180, normalized distance to finish in `[0, 1]`, collision flag, then
/// the positions of the next `n_waypoints` track points relative to the
/// vehicle, rotated into its heading frame and divided by 100.
pub struct PolicyController<M: ActionModel> {
    model: M,
    n_waypoints: usize,
}

impl<M: ActionModel> PolicyController<M> {
    /// Constructs the controller with 5 waypoint features.
    pub fn new(model: M) -> Self {
        Self {
            model,
            n_waypoints: 5,
        }
    }

    /// Sets the number of upcoming waypoints in the features.
    pub fn n_waypoints(mut self, n: usize) -> Self {
        self.n_waypoints = n;
        self
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Builds the scalar features of `state`.
    pub fn features(&self, state: &StateSnapshot, waypoints: &WaypointTrack) -> Vec<f32> {
        let mut features = vec![
            (state.velocity / 100.0) as f32,
            state.steer as f32,
            state.gas_brake as f32,
            (state.yaw / 180.0) as f32,
            (state.distance_to_finish / PROGRESS_SCALE) as f32,
            if state.collisions > 0.0 { 1.0 } else { 0.0 },
        ];

        let (closest, _) = waypoints.closest_point_and_distances(&state.location);
        let (sin, cos) = state.yaw.to_radians().sin_cos();
        let points = waypoints.points();
        for i in 1..=self.n_waypoints {
            let p = points[(closest + i).min(points.len() - 1)];
            let dx = p.x - state.location.x;
            let dy = p.y - state.location.y;
            features.push(((dx * cos + dy * sin) / 100.0) as f32);
            features.push(((-dx * sin + dy * cos) / 100.0) as f32);
        }
        features
    }
}

impl<M: ActionModel> Controller for PolicyController<M> {
    fn control(&mut self, state: &StateSnapshot, waypoints: &WaypointTrack) -> Action {
        let features = self.features(state, waypoints);
        let [gas_brake, steer] = self.model.forward(&features, &state.data);
        Action::new(gas_brake as f64, steer as f64)
    }

    fn name(&self) -> &str {
        "PolicyController"
    }

    fn info(&self) -> serde_json::Value {
        json!({
            "type": self.name(),
            "n_waypoints": self.n_waypoints,
            "model": self.model.info(),
        })
    }

    fn requires_frames(&self) -> bool {
        self.model.requires_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{SpawnPoint, Vector3};

    /// Steers by the lateral offset of the first waypoint.
    struct Linear {
        seen_frames: usize,
    }

    impl ActionModel for Linear {
        fn forward(
            &mut self,
            features: &[f32],
            frames: &BTreeMap<SensorKind, Vec<SensorFrame>>,
        ) -> [f32; 2] {
            self.seen_frames += frames.values().map(Vec::len).sum::<usize>();
            [0.5, features[7] * 10.0]
        }

        fn info(&self) -> serde_json::Value {
            json!({"type": "linear"})
        }
    }

    #[test]
    fn features_are_in_heading_frame() {
        let source: Vec<_> = (0..20)
            .map(|i| SpawnPoint::new(0.0, 5.0 * i as f64, 0.0, 90.0))
            .collect();
        let track = WaypointTrack::new(&source, 0).unwrap();
        let mut state = StateSnapshot {
            location: Vector3::new(0.0, 10.0, 0.0),
            yaw: 90.0,
            velocity: 50.0,
            distance_to_finish: 5000.0,
            ..Default::default()
        };
        state.data.insert(SensorKind::Rgb, vec![SensorFrame::blank(2, 2)]);

        let mut c = PolicyController::new(Linear { seen_frames: 0 }).n_waypoints(2);
        let f = c.features(&state, &track);
        assert_eq!(f.len(), 6 + 4);
        assert_eq!(f[0], 0.5);
        assert_eq!(f[4], 0.5);
        // next waypoint 5 m straight ahead
        assert!((f[6] - 0.05).abs() < 1e-6);
        assert!(f[7].abs() < 1e-6);

        let a = c.control(&state, &track);
        assert_eq!(a.gas_brake, 0.5);
        assert!(a.steer.abs() < 1e-5);
        assert_eq!(c.model().seen_frames, 1);
        assert!(c.requires_frames());
        assert_eq!(c.info()["model"]["type"], "linear");
    }
}
