//! Simulator, vehicle and sensor actors.
use super::{Transform, Vector3, VehicleControl};
use crate::{SensorConfig, SensorKind};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Identifier of an actor in the simulator.
pub type ActorId = u32;

/// Settings of the simulated world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSettings {
    /// If `true`, the world advances only when [`Simulator::tick`] is called.
    pub synchronous_mode: bool,

    /// Fixed simulation time per tick in seconds.
    pub fixed_delta_seconds: Option<f64>,
}

/// A raw camera frame as delivered by the simulator, in BGRA byte order.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Simulation frame in which the image was taken.
    pub frame: u64,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Pixel data, 4 bytes per pixel.
    pub bgra: Vec<u8>,
}

/// A collision reported by a collision sensor.
#[derive(Debug, Clone, Copy)]
pub struct CollisionEvent {
    /// Simulation frame of the collision.
    pub frame: u64,

    /// Normal impulse of the collision.
    pub normal_impulse: Vector3,
}

/// Data emitted by a sensor actor.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    /// Camera frame.
    Image(RawImage),

    /// Collision.
    Collision(CollisionEvent),
}

/// Callback registered with [`SensorActor::listen`].
///
/// The simulator invokes it on its own delivery thread, never on the thread
/// calling [`Simulator::tick`].
pub type SensorCallback = Box<dyn Fn(SensorEvent) + Send + Sync>;

/// Connection to a simulated world.
///
/// The handle is shared by the environment and its agents, hence all methods
/// take `&self`. Only the environment ticks the world or changes its settings.
pub trait Simulator: Send + Sync {
    /// Vehicle actor spawned by this simulator.
    type Vehicle: VehicleActor;

    /// Sensor actor spawned by this simulator.
    type Sensor: SensorActor;

    /// Name of the currently loaded map.
    fn map_name(&self) -> Result<String>;

    /// Loads a map, destroying all actors of the previous world.
    fn load_world(&self, map: &str) -> Result<()>;

    /// Reloads the current map, destroying all actors.
    fn reload_world(&self) -> Result<()>;

    /// Current world settings.
    fn settings(&self) -> Result<WorldSettings>;

    /// Applies world settings.
    fn apply_settings(&self, settings: &WorldSettings) -> Result<()>;

    /// Advances the world by one tick and returns the new frame number.
    fn tick(&self) -> Result<u64>;

    /// Spawns a vehicle from a blueprint at the given transform.
    fn spawn_vehicle(&self, blueprint: &str, transform: &Transform) -> Result<Self::Vehicle>;

    /// Spawns a sensor attached to `parent`.
    fn spawn_sensor(&self, config: &SensorConfig, parent: &Self::Vehicle) -> Result<Self::Sensor>;
}

/// A vehicle in the simulated world.
pub trait VehicleActor: Send {
    /// Actor id.
    fn id(&self) -> ActorId;

    /// Blueprint name of the vehicle.
    fn type_id(&self) -> String;

    /// Current transform.
    fn transform(&self) -> Transform;

    /// Current location.
    fn location(&self) -> Vector3 {
        self.transform().location
    }

    /// Current velocity in m/s.
    fn velocity(&self) -> Vector3;

    /// Control applied most recently.
    fn control(&self) -> VehicleControl;

    /// Applies a control, effective from the next tick.
    fn apply_control(&self, control: &VehicleControl) -> Result<()>;

    /// Removes the vehicle from the world.
    fn destroy(&mut self) -> Result<()>;
}

/// A sensor attached to a vehicle.
pub trait SensorActor: Send {
    /// Actor id.
    fn id(&self) -> ActorId;

    /// Kind of the sensor.
    fn kind(&self) -> SensorKind;

    /// Registers the callback receiving the data of the sensor.
    fn listen(&mut self, callback: SensorCallback) -> Result<()>;

    /// Stops delivering data.
    fn stop(&mut self) -> Result<()>;

    /// Removes the sensor from the world, dropping its callback.
    fn destroy(&mut self) -> Result<()>;
}
