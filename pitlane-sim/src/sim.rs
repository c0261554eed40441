//! The headless simulator.
use crate::{
    circuit,
    world::{lock, Events, World},
    HeadlessSensor, HeadlessSimConfig, HeadlessSimError, HeadlessVehicle,
};
use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Sender};
use log::{debug, info, trace, warn};
use pitlane_core::{
    base::{Simulator, SpawnPoint, Transform, VehicleActor, WorldSettings},
    SensorConfig,
};
use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

struct Delivery {
    events: Events,
    ack: Sender<()>,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Simulator running in-process without rendering.
///
/// Sensor callbacks run on a delivery thread owned by the simulator.
/// [`Simulator::tick`] hands the events of the new frame to that thread and
/// returns once all of them were delivered:
///
/// ```mermaid
/// sequenceDiagram
///     participant S as stepping thread
///     participant W as world
///     participant D as delivery thread
///     S->>W: tick
///     W-->>S: events of the frame
///     S->>D: events
///     D->>D: invoke callbacks
///     D-->>S: ack
/// ```
pub struct HeadlessSim {
    world: Arc<Mutex<World>>,
    delivery: Option<Sender<Delivery>>,
    handle: Option<JoinHandle<()>>,
}

impl HeadlessSim {
    /// Starts the simulator with the initial map of `config` loaded.
    pub fn new(config: HeadlessSimConfig) -> Self {
        info!("Start headless simulator with map {}", config.initial_map);
        let world = Arc::new(Mutex::new(World::new(config)));
        let (sender, receiver) = unbounded::<Delivery>();
        let handle = std::thread::spawn(move || {
            for Delivery { events, ack } in receiver.iter() {
                for (callback, event) in events {
                    callback(event);
                }
                if ack.send(()).is_err() {
                    warn!("Tick returned before its delivery completed");
                }
            }
            debug!("Delivery thread stopped");
        });
        Self {
            world,
            delivery: Some(sender),
            handle: Some(handle),
        }
    }

    /// Configuration of the simulator.
    pub fn config(&self) -> HeadlessSimConfig {
        lock(&self.world).config.clone()
    }

    /// Spawn points of the circuit of the loaded map.
    pub fn spawn_points(&self) -> Vec<SpawnPoint> {
        let world = lock(&self.world);
        circuit(world.config.track_points, world.config.track_radius, 0.0)
    }

    /// Number of ticks since startup.
    pub fn frame(&self) -> u64 {
        lock(&self.world).frame
    }

    /// Number of vehicles in the world.
    pub fn vehicle_count(&self) -> usize {
        lock(&self.world).vehicles.len()
    }

    /// Number of sensors in the world.
    pub fn sensor_count(&self) -> usize {
        lock(&self.world).sensors.len()
    }

    /// Number of sensors with a registered callback.
    pub fn listening_sensor_count(&self) -> usize {
        lock(&self.world)
            .sensors
            .values()
            .filter(|s| s.callback.is_some())
            .count()
    }
}

impl Default for HeadlessSim {
    fn default() -> Self {
        Self::new(HeadlessSimConfig::default())
    }
}

impl Drop for HeadlessSim {
    fn drop(&mut self) {
        self.delivery.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Delivery thread panicked");
            }
        }
    }
}

impl Simulator for HeadlessSim {
    type Vehicle = HeadlessVehicle;
    type Sensor = HeadlessSensor;

    fn map_name(&self) -> Result<String> {
        Ok(lock(&self.world).map.clone())
    }

    fn load_world(&self, map: &str) -> Result<()> {
        let mut world = lock(&self.world);
        if !world.config.maps.is_empty() && !world.config.maps.iter().any(|m| m == map) {
            return Err(HeadlessSimError::UnknownMap(map.to_string()))?;
        }
        world.reset(map);
        Ok(())
    }

    fn reload_world(&self) -> Result<()> {
        let mut world = lock(&self.world);
        let map = world.map.clone();
        world.reset(&map);
        Ok(())
    }

    fn settings(&self) -> Result<WorldSettings> {
        Ok(lock(&self.world).settings)
    }

    fn apply_settings(&self, settings: &WorldSettings) -> Result<()> {
        debug!("Apply {:?}", settings);
        lock(&self.world).settings = *settings;
        Ok(())
    }

    fn tick(&self) -> Result<u64> {
        let (frame, events) = {
            let mut world = lock(&self.world);
            let events = world.step();
            (world.frame, events)
        };
        let delivery = self
            .delivery
            .as_ref()
            .ok_or(HeadlessSimError::DeliveryStopped)?;
        let (ack, done) = bounded(1);
        delivery
            .send(Delivery { events, ack })
            .map_err(|_| HeadlessSimError::DeliveryStopped)?;
        done.recv().map_err(|_| HeadlessSimError::DeliveryStopped)?;
        trace!("Tick {}", frame);
        Ok(frame)
    }

    fn spawn_vehicle(&self, blueprint: &str, transform: &Transform) -> Result<HeadlessVehicle> {
        let id = lock(&self.world).spawn_vehicle(blueprint, transform)?;
        debug!("Spawned {} as {}", blueprint, id);
        Ok(HeadlessVehicle {
            id,
            blueprint: blueprint.to_string(),
            world: self.world.clone(),
        })
    }

    fn spawn_sensor(
        &self,
        config: &SensorConfig,
        parent: &HeadlessVehicle,
    ) -> Result<HeadlessSensor> {
        let id = lock(&self.world).spawn_sensor(config, parent.id())?;
        debug!("Spawned {} as {} on {}", config.blueprint, id, parent.id());
        Ok(HeadlessSensor {
            id,
            kind: config.kind,
            world: self.world.clone(),
        })
    }
}
