#![warn(missing_docs)]
//! Orchestration of simulated vehicle agents for trajectory collection.
//!
//! The crate pairs asynchronously delivered sensor frames with simulation ticks,
//! measures progress along a waypoint track, scores transitions and drives the
//! lifecycle of agents from spawning to teardown.
//!
//! * [`WaypointTrack`] - cyclic track with nearest point lookup and progress metric.
//! * [`SensorChannel`] - per-sensor frame queue with a bounded retention window.
//! * [`RewardModel`] - velocity-gated and distance-ratio rewards.
//! * [`Agent`] - one controlled vehicle, its sensors and its reporting.
//! * [`Environment`] - owns the simulator handle and a pool of agents.
//! * [`Collector`] - per-tick loop producing state, action, reward and done rows.
//!
//! The simulation engine is abstracted by the traits in [`base`], controllers by
//! [`Controller`] and persistence by [`record::Storage`].
pub mod base;
pub mod error;
pub mod record;

mod agent;
mod collector;
mod control;
mod env;
mod reward;
mod sensor;
mod state;
mod track;

pub use agent::{Agent, AgentConfig, Lifecycle};
pub use collector::{collect_stats_fmt, CollectStat, Collector, CollectorConfig, Outcome};
pub use control::{
    Action, ActionModel, Controller, ManualController, PolicyController, WaypointController,
    WaypointControllerConfig,
};
pub use env::{spawn_indexes, Environment, EnvironmentConfig, Stabilization};
pub use error::PitlaneError;
pub use reward::{
    distance_ratio_reward, velocity_gated_reward, RewardConfig, RewardKind, RewardModel,
};
pub use sensor::{
    CollisionAccumulator, ColorConverter, FrameSink, SensorChannel, SensorConfig, SensorFrame,
    SensorKind, COLLISION_THRESHOLD,
};
pub use state::StateSnapshot;
pub use track::{WaypointTrack, DEFAULT_TAIL_CUT};
