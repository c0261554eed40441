//! Lifecycle of an agent.

/// Stage of an [`Agent`](super::Agent).
///
/// Stages only move forward, in declaration order. `Destroyed` can be reached
/// from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, nothing spawned.
    Uninitialized,

    /// The vehicle is spawned and braking.
    VehicleSpawned,

    /// Sensors are spawned and deliver data.
    SensorsInitialized,

    /// Report files are written, the agent is ready to step.
    ReportingInitialized,

    /// A state was taken after reporting was initialized.
    Running,

    /// All actors are destroyed.
    Destroyed {
        /// In-memory sensor state was kept.
        data_retained: bool,
    },
}

impl Lifecycle {
    /// Returns `true` if the agent was destroyed.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Lifecycle::Destroyed { .. })
    }

    /// Returns `true` if sensors are initialized and the agent is not destroyed.
    pub fn has_sensors(&self) -> bool {
        matches!(
            self,
            Lifecycle::SensorsInitialized | Lifecycle::ReportingInitialized | Lifecycle::Running
        )
    }

    /// Returns `true` if reports can be written.
    pub fn is_reporting(&self) -> bool {
        matches!(self, Lifecycle::ReportingInitialized | Lifecycle::Running)
    }
}
