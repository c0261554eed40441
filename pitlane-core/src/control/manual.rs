//! Controller fed with actions from another thread.
use super::{Action, Controller};
use crate::{state::StateSnapshot, track::WaypointTrack};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::json;

/// Applies the most recent action sent through its channel.
///
/// Useful for driving an agent from a keyboard or a remote process. Until the
/// first action arrives, the controller returns the neutral action.
pub struct ManualController {
    receiver: Receiver<Action>,
    last: Action,
}

impl ManualController {
    /// Constructs the controller and the sender feeding it.
    pub fn new() -> (Self, Sender<Action>) {
        let (sender, receiver) = unbounded();
        let controller = Self {
            receiver,
            last: Action::default(),
        };
        (controller, sender)
    }
}

impl Controller for ManualController {
    fn control(&mut self, _state: &StateSnapshot, _waypoints: &WaypointTrack) -> Action {
        if let Some(action) = self.receiver.try_iter().last() {
            self.last = action;
        }
        self.last
    }

    fn name(&self) -> &str {
        "ManualController"
    }

    fn info(&self) -> serde_json::Value {
        json!({ "type": self.name() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::SpawnPoint;

    #[test]
    fn keeps_latest_action() {
        let track = WaypointTrack::new(
            &[SpawnPoint::new(0.0, 0.0, 0.0, 0.0), SpawnPoint::new(1.0, 0.0, 0.0, 0.0)],
            0,
        )
        .unwrap();
        let state = StateSnapshot::default();
        let (mut c, tx) = ManualController::new();
        assert_eq!(c.control(&state, &track), Action::default());

        tx.send(Action::new(1.0, 0.0)).unwrap();
        tx.send(Action::new(-0.5, 0.2)).unwrap();
        assert_eq!(c.control(&state, &track), Action::new(-0.5, 0.2));

        drop(tx);
        assert_eq!(c.control(&state, &track), Action::new(-0.5, 0.2));
    }
}
