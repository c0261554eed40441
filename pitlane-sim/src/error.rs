//! Errors of the headless simulator.
use pitlane_core::base::ActorId;
use thiserror::Error;

/// Errors of the headless simulator.
#[derive(Error, Debug)]
pub enum HeadlessSimError {
    /// The map is not among the configured maps.
    #[error("Unknown map: {0}")]
    UnknownMap(String),

    /// The blueprint does not name an actor of the requested category.
    #[error("Unknown blueprint: {0}")]
    UnknownBlueprint(String),

    /// Another vehicle is in contact with the spawn location.
    #[error("Spawn location occupied by vehicle {0}")]
    SpawnCollision(ActorId),

    /// The actor does not exist in the current world.
    #[error("Actor not found: {0}")]
    ActorNotFound(ActorId),

    /// The delivery thread stopped.
    #[error("Sensor delivery stopped")]
    DeliveryStopped,
}
