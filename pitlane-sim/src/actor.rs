//! Handles of actors living in the headless world.
use crate::world::{lock, World};
use anyhow::Result;
use log::trace;
use pitlane_core::{
    base::{
        ActorId, SensorActor, SensorCallback, Transform, Vector3, VehicleActor, VehicleControl,
    },
    SensorKind,
};
use std::sync::{Arc, Mutex};

/// A vehicle of [`HeadlessSim`](crate::HeadlessSim).
///
/// After the vehicle was destroyed, or its world reloaded, queries return
/// default values and commands fail.
pub struct HeadlessVehicle {
    pub(crate) id: ActorId,
    pub(crate) blueprint: String,
    pub(crate) world: Arc<Mutex<World>>,
}

impl VehicleActor for HeadlessVehicle {
    fn id(&self) -> ActorId {
        self.id
    }

    fn type_id(&self) -> String {
        self.blueprint.clone()
    }

    fn transform(&self) -> Transform {
        lock(&self.world)
            .vehicles
            .get(&self.id)
            .map(|v| v.transform)
            .unwrap_or_default()
    }

    fn velocity(&self) -> Vector3 {
        lock(&self.world)
            .vehicles
            .get(&self.id)
            .map(|v| v.velocity())
            .unwrap_or_default()
    }

    fn control(&self) -> VehicleControl {
        lock(&self.world)
            .vehicles
            .get(&self.id)
            .map(|v| v.control)
            .unwrap_or_default()
    }

    fn apply_control(&self, control: &VehicleControl) -> Result<()> {
        lock(&self.world).vehicle_mut(self.id)?.control = *control;
        trace!("Vehicle {}: {:?}", self.id, control);
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        lock(&self.world).remove_vehicle(self.id)?;
        Ok(())
    }
}

/// A sensor of [`HeadlessSim`](crate::HeadlessSim).
pub struct HeadlessSensor {
    pub(crate) id: ActorId,
    pub(crate) kind: SensorKind,
    pub(crate) world: Arc<Mutex<World>>,
}

impl SensorActor for HeadlessSensor {
    fn id(&self) -> ActorId {
        self.id
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn listen(&mut self, callback: SensorCallback) -> Result<()> {
        lock(&self.world).sensor_mut(self.id)?.callback = Some(Arc::new(callback));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        lock(&self.world).sensor_mut(self.id)?.callback = None;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        lock(&self.world).remove_sensor(self.id)?;
        Ok(())
    }
}
