//! Sensors of an agent and the buffers pairing their frames with simulation steps.
mod channel;
mod config;
pub use channel::{
    CollisionAccumulator, FrameSink, SensorChannel, SensorFrame, COLLISION_THRESHOLD,
};
pub use config::{ColorConverter, SensorConfig, SensorKind};
