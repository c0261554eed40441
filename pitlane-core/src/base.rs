//! Interface to the simulation engine.
//!
//! The engine itself (world, actor spawning, physics ticking) lives outside of
//! this crate. [`Simulator`], [`VehicleActor`] and [`SensorActor`] describe what
//! the orchestration layer consumes from it.
mod geometry;
mod sim;
pub use geometry::{Rotation, SpawnPoint, Transform, Vector3, VehicleControl};
pub use sim::{
    ActorId, CollisionEvent, RawImage, SensorActor, SensorCallback, SensorEvent, Simulator,
    VehicleActor, WorldSettings,
};
