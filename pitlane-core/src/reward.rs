//! Rewards of transitions between consecutive states.
//!
//! Both formulas compare the remaining track length `d0` measured at the prior
//! location with `d1` measured at the next location. They are pure functions:
//! identical inputs give identical rewards.
mod config;
use crate::{state::StateSnapshot, track::WaypointTrack, PitlaneError};
pub use config::{RewardConfig, RewardKind};

/// Offset added to the prior velocity in the velocity-gated reward.
const VELOCITY_OFFSET: f64 = 0.2;

/// Floor subtracted from `d0` in the distance-ratio reward.
const DISTANCE_EPSILON: f64 = 1e-50;

fn discount(gamma: f64, step: usize) -> f64 {
    gamma.powf(step as f64)
}

/// Velocity-gated reward.
///
/// With progress (`d1 < d0`) the reward is
/// `next_velocity / (prior_velocity + 0.2) * gamma^step - punishment`, with
/// regression (`d1 > d0`) the ratio term is negated, and without any change of
/// the distance the reward is `-punishment`.
///
/// Returns [`PitlaneError::DivisionHazard`] if `prior_velocity` is exactly `-0.2`
/// while the distance changed.
pub fn velocity_gated_reward(
    d0: f64,
    d1: f64,
    prior_velocity: f64,
    next_velocity: f64,
    gamma: f64,
    step: usize,
    punishment: f64,
) -> Result<f64, PitlaneError> {
    if d1 == d0 {
        return Ok(-punishment);
    }
    let denom = prior_velocity + VELOCITY_OFFSET;
    if denom == 0.0 {
        return Err(PitlaneError::DivisionHazard("prior velocity + 0.2 == 0"));
    }
    let ratio = next_velocity / denom * discount(gamma, step);
    if d1 < d0 {
        Ok(ratio - punishment)
    } else {
        Ok(-ratio - punishment)
    }
}

/// Distance-ratio reward, `((d0 - 1e-50) / d1 - 1) * 100 * gamma^step - punishment`.
///
/// Returns [`PitlaneError::DivisionHazard`] if `d1` is zero, that is, the next
/// location projects onto the last point of the track.
pub fn distance_ratio_reward(
    d0: f64,
    d1: f64,
    gamma: f64,
    step: usize,
    punishment: f64,
) -> Result<f64, PitlaneError> {
    if d1 == 0.0 {
        return Err(PitlaneError::DivisionHazard("remaining distance == 0"));
    }
    Ok((((d0 - DISTANCE_EPSILON) / d1) - 1.0) * 100.0 * discount(gamma, step) - punishment)
}

/// Reward of a transition, parameterized by the discount and the punishment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewardModel {
    /// See [`velocity_gated_reward`].
    VelocityGated {
        /// Discount factor.
        gamma: f64,
        /// Constant punishment.
        punishment: f64,
    },

    /// See [`distance_ratio_reward`].
    DistanceRatio {
        /// Discount factor.
        gamma: f64,
        /// Constant punishment.
        punishment: f64,
    },
}

impl From<&RewardConfig> for RewardModel {
    fn from(config: &RewardConfig) -> Self {
        let (gamma, punishment) = (config.gamma, config.punishment);
        match config.kind {
            RewardKind::VelocityGated => Self::VelocityGated { gamma, punishment },
            RewardKind::DistanceRatio => Self::DistanceRatio { gamma, punishment },
        }
    }
}

impl Default for RewardModel {
    fn default() -> Self {
        (&RewardConfig::default()).into()
    }
}

impl RewardModel {
    /// Scores the transition from `prior` to `next` at `step`.
    ///
    /// Distances are the remaining lengths of `track` from the points nearest
    /// to the two locations.
    pub fn score(
        &self,
        prior: &StateSnapshot,
        next: &StateSnapshot,
        track: &WaypointTrack,
        step: usize,
    ) -> Result<f64, PitlaneError> {
        let d0 = track.remaining_length(&prior.location);
        let d1 = track.remaining_length(&next.location);
        match *self {
            Self::VelocityGated { gamma, punishment } => velocity_gated_reward(
                d0,
                d1,
                prior.velocity,
                next.velocity,
                gamma,
                step,
                punishment,
            ),
            Self::DistanceRatio { gamma, punishment } => {
                distance_ratio_reward(d0, d1, gamma, step, punishment)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{SpawnPoint, Vector3};

    #[test_log::test]
    fn velocity_gated_progress_and_regression() {
        let r = velocity_gated_reward(100.0, 90.0, 10.0, 15.0, 0.995, 0, 0.05).unwrap();
        assert!((r - (15.0 / 10.2 - 0.05)).abs() < 1e-12);
        assert!((r - 1.4207).abs() < 1e-3);

        let r = velocity_gated_reward(90.0, 100.0, 10.0, 15.0, 0.995, 0, 0.05).unwrap();
        assert!((r + 15.0 / 10.2 + 0.05).abs() < 1e-12);

        let r = velocity_gated_reward(100.0, 90.0, 10.0, 15.0, 0.5, 2, 0.0).unwrap();
        assert!((r - 15.0 / 10.2 * 0.25).abs() < 1e-12);
    }

    #[test_log::test]
    fn velocity_gated_without_progress_is_punishment() {
        for (v0, v1) in [(0.0, 0.0), (10.0, 15.0), (-0.2, 3.0)] {
            let r = velocity_gated_reward(50.0, 50.0, v0, v1, 0.995, 7, 0.05).unwrap();
            assert_eq!(r, -0.05);
        }
    }

    #[test_log::test]
    fn velocity_gated_division_hazard() {
        assert!(matches!(
            velocity_gated_reward(50.0, 40.0, -0.2, 3.0, 0.995, 0, 0.05),
            Err(PitlaneError::DivisionHazard(_))
        ));
    }

    #[test_log::test]
    fn discount_holds_for_long_runs() {
        let step = i32::MAX as usize + 2;
        let r = velocity_gated_reward(100.0, 90.0, 10.0, 15.0, 0.5, step, 0.0).unwrap();
        assert_eq!(r, 0.0);
        let r = distance_ratio_reward(100.0, 50.0, 1.0, step, 0.0).unwrap();
        assert!((r - 100.0).abs() < 1e-9);
    }

    #[test_log::test]
    fn distance_ratio() {
        let r = distance_ratio_reward(100.0, 50.0, 1.0, 0, 0.0).unwrap();
        assert!((r - 100.0).abs() < 1e-9);
        let r = distance_ratio_reward(50.0, 100.0, 1.0, 0, 0.05).unwrap();
        assert!((r + 50.05).abs() < 1e-9);
        assert!(matches!(
            distance_ratio_reward(10.0, 0.0, 1.0, 0, 0.0),
            Err(PitlaneError::DivisionHazard(_))
        ));
    }

    #[test_log::test]
    fn model_scores_with_track_distances() {
        let source: Vec<_> = (0..11)
            .map(|i| SpawnPoint::new(10.0 * i as f64, 0.0, 0.0, 0.0))
            .collect();
        let track = WaypointTrack::new(&source, 0).unwrap();
        let prior = StateSnapshot {
            location: Vector3::new(0.0, 0.0, 0.0),
            velocity: 10.0,
            ..Default::default()
        };
        let next = StateSnapshot {
            location: Vector3::new(51.0, 1.0, 0.0),
            velocity: 15.0,
            ..Default::default()
        };

        let model: RewardModel = (&RewardConfig::default()
            .kind(RewardKind::DistanceRatio)
            .gamma(1.0)
            .punishment(0.0))
            .into();
        let r = model.score(&prior, &next, &track, 0).unwrap();
        assert!((r - 100.0).abs() < 1e-9);

        let r = RewardModel::default().score(&prior, &next, &track, 0).unwrap();
        assert!((r - 1.4207).abs() < 1e-3);
    }
}
