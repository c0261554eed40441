//! Errors in the library.
use crate::SensorKind;
use std::time::Duration;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum PitlaneError {
    /// The vehicle or one of its sensors could not be created by the simulator.
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// The vehicle of the agent was already spawned.
    #[error("Vehicle already spawned")]
    AlreadySpawned,

    /// The agent is already past the requested lifecycle stage.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(&'static str),

    /// The operation needs a spawned vehicle.
    #[error("Vehicle not spawned")]
    NotSpawned,

    /// The operation needs initialized sensors.
    #[error("Sensors not initialized")]
    SensorsNotInitialized,

    /// The operation needs initialized reporting.
    #[error("Reporting not initialized")]
    ReportingNotInitialized,

    /// A reward formula would divide by zero.
    #[error("Division hazard in reward: {0}")]
    DivisionHazard(&'static str),

    /// No frame arrived on a sensor channel within the timeout.
    #[error("No frame from sensor {kind} within {timeout:?}")]
    SensorTimeout {
        /// Sensor of the channel.
        kind: SensorKind,
        /// Waited time.
        timeout: Duration,
    },

    /// The producer side of a sensor channel was dropped.
    #[error("Sensor {0} disconnected")]
    SensorDisconnected(SensorKind),

    /// The retained buffer of a sensor channel is full.
    #[error("Retention window of sensor {kind} is full ({window} frames)")]
    RetentionExceeded {
        /// Sensor of the channel.
        kind: SensorKind,
        /// Size of the retention window.
        window: usize,
    },

    /// A waypoint track does not satisfy its invariants.
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Error reported by the simulator.
    #[error("Simulator error: {0}")]
    Simulator(String),
}
