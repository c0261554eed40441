//! State and physics of the headless world.
use crate::{HeadlessSimConfig, HeadlessSimError};
use log::{debug, trace};
use pitlane_core::{
    base::{
        ActorId, CollisionEvent, RawImage, SensorCallback, SensorEvent, Transform, Vector3,
        VehicleControl, WorldSettings,
    },
    ColorConverter, SensorConfig, SensorKind,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Events of one tick paired with the callbacks receiving them.
pub(crate) type Events = Vec<(Arc<SensorCallback>, SensorEvent)>;

pub(crate) struct VehicleState {
    pub transform: Transform,
    pub ground_z: f64,
    pub speed: f64,
    pub vertical_speed: f64,
    pub control: VehicleControl,
}

impl VehicleState {
    fn direction(&self) -> f64 {
        if self.control.reverse {
            -1.0
        } else {
            1.0
        }
    }

    pub fn velocity(&self) -> Vector3 {
        let (sin, cos) = self.transform.rotation.yaw.to_radians().sin_cos();
        let v = self.direction() * self.speed;
        Vector3::new(v * cos, v * sin, self.vertical_speed)
    }

    /// Falls onto the ground, then follows a kinematic bicycle model.
    fn integrate(&mut self, config: &HeadlessSimConfig, dt: f64) {
        let location = &mut self.transform.location;
        if location.z > self.ground_z || self.vertical_speed != 0.0 {
            self.vertical_speed -= config.gravity * dt;
            location.z += self.vertical_speed * dt;
            if location.z <= self.ground_z {
                location.z = self.ground_z;
                self.vertical_speed = 0.0;
            }
        }

        let control = &self.control;
        let brake = if control.hand_brake {
            1.0
        } else {
            control.brake.clamp(0.0, 1.0)
        };
        let accel = control.throttle.clamp(0.0, 1.0) * config.max_accel
            - brake * config.max_decel
            - config.drag * self.speed;
        // braking stops the vehicle exactly, it never drives it backward
        self.speed = (self.speed + accel * dt).max(0.0);
        if self.speed == 0.0 {
            return;
        }

        let direction = self.direction();
        let steer = (control.steer.clamp(-1.0, 1.0) * config.max_steer_deg).to_radians();
        let yaw_rate = direction * self.speed / config.wheelbase * steer.tan();
        let yaw = self.transform.rotation.yaw + (yaw_rate * dt).to_degrees();
        self.transform.rotation.yaw = (yaw + 180.0).rem_euclid(360.0) - 180.0;

        let (sin, cos) = self.transform.rotation.yaw.to_radians().sin_cos();
        let location = &mut self.transform.location;
        location.x += direction * self.speed * cos * dt;
        location.y += direction * self.speed * sin * dt;
    }
}

pub(crate) struct SensorState {
    pub parent: ActorId,
    pub config: SensorConfig,
    pub callback: Option<Arc<SensorCallback>>,
}

pub(crate) struct World {
    pub config: HeadlessSimConfig,
    pub map: String,
    pub settings: WorldSettings,
    pub frame: u64,
    pub vehicles: BTreeMap<ActorId, VehicleState>,
    pub sensors: BTreeMap<ActorId, SensorState>,
    next_id: ActorId,
    contacts: BTreeSet<(ActorId, ActorId)>,
    rng: fastrand::Rng,
}

pub(crate) fn lock(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

fn horizontal_distance(a: &Vector3, b: &Vector3) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

impl World {
    pub fn new(config: HeadlessSimConfig) -> Self {
        Self {
            map: config.initial_map.clone(),
            rng: fastrand::Rng::with_seed(config.seed),
            config,
            settings: WorldSettings::default(),
            frame: 0,
            vehicles: BTreeMap::new(),
            sensors: BTreeMap::new(),
            next_id: 1,
            contacts: BTreeSet::new(),
        }
    }

    /// Loads `map`, destroying all actors. Ids are never reused.
    pub fn reset(&mut self, map: &str) {
        debug!(
            "Loading {}, destroying {} vehicles and {} sensors",
            map,
            self.vehicles.len(),
            self.sensors.len()
        );
        self.map = map.to_string();
        self.vehicles.clear();
        self.sensors.clear();
        self.contacts.clear();
    }

    fn next_id(&mut self) -> ActorId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn spawn_vehicle(
        &mut self,
        blueprint: &str,
        transform: &Transform,
    ) -> Result<ActorId, HeadlessSimError> {
        if !blueprint.starts_with("vehicle.") {
            return Err(HeadlessSimError::UnknownBlueprint(blueprint.to_string()));
        }
        let occupied = self.vehicles.iter().find(|(_, v)| {
            horizontal_distance(&v.transform.location, &transform.location)
                < self.config.min_separation
        });
        if let Some((id, _)) = occupied {
            return Err(HeadlessSimError::SpawnCollision(*id));
        }

        let id = self.next_id();
        let mut dropped = *transform;
        dropped.location.z += self.config.spawn_height;
        self.vehicles.insert(
            id,
            VehicleState {
                transform: dropped,
                ground_z: transform.location.z,
                speed: 0.0,
                vertical_speed: 0.0,
                control: VehicleControl::default(),
            },
        );
        Ok(id)
    }

    pub fn spawn_sensor(
        &mut self,
        config: &SensorConfig,
        parent: ActorId,
    ) -> Result<ActorId, HeadlessSimError> {
        if !config.blueprint.starts_with("sensor.") {
            return Err(HeadlessSimError::UnknownBlueprint(config.blueprint.clone()));
        }
        if !self.vehicles.contains_key(&parent) {
            return Err(HeadlessSimError::ActorNotFound(parent));
        }
        let id = self.next_id();
        self.sensors.insert(
            id,
            SensorState {
                parent,
                config: config.clone(),
                callback: None,
            },
        );
        Ok(id)
    }

    pub fn vehicle_mut(&mut self, id: ActorId) -> Result<&mut VehicleState, HeadlessSimError> {
        self.vehicles
            .get_mut(&id)
            .ok_or(HeadlessSimError::ActorNotFound(id))
    }

    pub fn sensor_mut(&mut self, id: ActorId) -> Result<&mut SensorState, HeadlessSimError> {
        self.sensors
            .get_mut(&id)
            .ok_or(HeadlessSimError::ActorNotFound(id))
    }

    pub fn remove_vehicle(&mut self, id: ActorId) -> Result<(), HeadlessSimError> {
        self.vehicles
            .remove(&id)
            .ok_or(HeadlessSimError::ActorNotFound(id))?;
        self.contacts.retain(|(a, b)| *a != id && *b != id);
        Ok(())
    }

    pub fn remove_sensor(&mut self, id: ActorId) -> Result<(), HeadlessSimError> {
        self.sensors
            .remove(&id)
            .map(|_| ())
            .ok_or(HeadlessSimError::ActorNotFound(id))
    }

    fn delta_seconds(&self) -> f64 {
        match (self.settings.synchronous_mode, self.settings.fixed_delta_seconds) {
            (true, Some(dt)) if dt > 0.0 => dt,
            _ => self.config.default_delta,
        }
    }

    /// Advances the world by one frame and returns the sensor events of the
    /// new frame.
    pub fn step(&mut self) -> Events {
        let dt = self.delta_seconds();
        self.frame += 1;
        for vehicle in self.vehicles.values_mut() {
            vehicle.integrate(&self.config, dt);
        }

        let mut events = self.render();
        events.extend(self.detect_collisions());
        trace!("Frame {}: {} sensor events", self.frame, events.len());
        events
    }

    fn render(&self) -> Events {
        let mut events = vec![];
        for sensor in self.sensors.values() {
            let (callback, vehicle) = match (&sensor.callback, self.vehicles.get(&sensor.parent)) {
                (Some(callback), Some(vehicle)) => (callback, vehicle),
                _ => continue,
            };
            if sensor.config.kind == SensorKind::Collisions {
                continue;
            }
            let image = render_frame(&sensor.config, vehicle, self.frame, &self.rng);
            events.push((callback.clone(), SensorEvent::Image(image)));
        }
        events
    }

    /// Reports pairs of vehicles entering contact to their collision sensors.
    ///
    /// A pair stays in contact, without further events, until it separates.
    fn detect_collisions(&mut self) -> Events {
        let ids: Vec<ActorId> = self.vehicles.keys().copied().collect();
        let mut hits = vec![];
        for (i, a) in ids.iter().enumerate() {
            for b in ids[i + 1..].iter() {
                let (va, vb) = (&self.vehicles[a], &self.vehicles[b]);
                let (pa, pb) = (va.transform.location, vb.transform.location);
                let d = horizontal_distance(&pa, &pb);
                if d >= self.config.min_separation {
                    self.contacts.remove(&(*a, *b));
                    continue;
                }
                if !self.contacts.insert((*a, *b)) {
                    continue;
                }
                let normal = if d > 0.0 {
                    Vector3::new((pb.x - pa.x) / d, (pb.y - pa.y) / d, 0.0)
                } else {
                    Vector3::new(1.0, 0.0, 0.0)
                };
                let relative = va.velocity() - vb.velocity();
                let closing = relative.x * normal.x + relative.y * normal.y;
                let j = self.config.mass * closing.abs();
                let impulse = Vector3::new(normal.x.abs() * j, normal.y.abs() * j, 0.0);
                debug!("Vehicles {} and {} collided, impulse {}", a, b, j);
                hits.push((*a, impulse));
                hits.push((*b, impulse));
            }
        }

        let mut events = vec![];
        for (vehicle, impulse) in hits {
            for sensor in self.sensors.values() {
                if sensor.parent != vehicle || sensor.config.kind != SensorKind::Collisions {
                    continue;
                }
                if let Some(callback) = &sensor.callback {
                    let event = CollisionEvent {
                        frame: self.frame,
                        normal_impulse: impulse,
                    };
                    events.push((callback.clone(), SensorEvent::Collision(event)));
                }
            }
        }
        events
    }
}

/// Synthetic camera frame: sky above the horizon, road below it with a lane
/// marking that slides with the heading of the vehicle.
fn render_frame(
    config: &SensorConfig,
    vehicle: &VehicleState,
    frame: u64,
    rng: &fastrand::Rng,
) -> RawImage {
    let (width, height) = (config.image_size_x, config.image_size_y);
    let horizon = height / 2;
    let yaw = vehicle.transform.rotation.yaw.rem_euclid(360.0);
    let lane = (yaw / 360.0 * width as f64) as u32;

    let mut bgra = Vec::with_capacity((width * height * 4) as usize);
    for row in 0..height {
        for col in 0..width {
            let sky = row < horizon;
            let pixel: [u8; 4] = match config.color_converter {
                ColorConverter::Raw => {
                    if sky {
                        [235, 206, 135, 255]
                    } else if col == lane {
                        [255, 255, 255, 255]
                    } else {
                        let g = 82 + rng.u8(..16);
                        [g, g, g, 255]
                    }
                }
                ColorConverter::Depth | ColorConverter::LogarithmicDepth => {
                    let g = if sky {
                        255
                    } else {
                        (255 * (height - row) / (height - horizon).max(1)).min(255) as u8
                    };
                    [g, g, g, 255]
                }
                // CityScapes sky and road colors
                ColorConverter::CityScapesPalette => {
                    if sky {
                        [180, 130, 70, 255]
                    } else {
                        [128, 64, 128, 255]
                    }
                }
            };
            bgra.extend_from_slice(&pixel);
        }
    }
    RawImage {
        frame,
        width,
        height,
        bgra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(HeadlessSimConfig::default())
    }

    fn at(x: f64, y: f64) -> Transform {
        Transform::from_location_yaw(Vector3::new(x, y, 0.0), 0.0)
    }

    #[test]
    fn vehicles_settle_on_the_ground() {
        let mut w = world();
        let id = w.spawn_vehicle("vehicle.tesla.model3", &at(0.0, 0.0)).unwrap();
        assert_eq!(w.vehicles[&id].transform.location.z, 0.5);

        let mut previous = w.vehicles[&id].transform;
        let mut ticks = 0;
        loop {
            w.step();
            ticks += 1;
            let current = w.vehicles[&id].transform;
            if current == previous {
                break;
            }
            previous = current;
            assert!(ticks < 50);
        }
        assert_eq!(w.vehicles[&id].transform.location.z, 0.0);
        assert_eq!(w.vehicles[&id].velocity(), Vector3::default());
    }

    #[test]
    fn throttle_moves_along_heading_and_brake_stops() {
        let mut w = world();
        let id = w
            .spawn_vehicle("vehicle.tesla.model3", &Transform::from_location_yaw(Vector3::default(), 90.0))
            .unwrap();
        w.vehicle_mut(id).unwrap().control = VehicleControl {
            throttle: 1.0,
            gear: 1,
            ..Default::default()
        };
        for _ in 0..20 {
            w.step();
        }
        let v = &w.vehicles[&id];
        assert!(v.speed > 3.0);
        assert!(v.transform.location.y > 1.0);
        assert!(v.transform.location.x.abs() < 1e-6);

        w.vehicle_mut(id).unwrap().control = VehicleControl::full_brake();
        for _ in 0..40 {
            w.step();
        }
        assert_eq!(w.vehicles[&id].speed, 0.0);
    }

    #[test]
    fn spawn_rules() {
        let mut w = world();
        let id = w.spawn_vehicle("vehicle.a", &at(0.0, 0.0)).unwrap();
        assert!(matches!(
            w.spawn_vehicle("vehicle.b", &at(1.0, 0.0)),
            Err(HeadlessSimError::SpawnCollision(other)) if other == id
        ));
        assert!(matches!(
            w.spawn_vehicle("sensor.camera.rgb", &at(10.0, 0.0)),
            Err(HeadlessSimError::UnknownBlueprint(_))
        ));
        assert!(matches!(
            w.spawn_sensor(&SensorConfig::new(SensorKind::Rgb), 999),
            Err(HeadlessSimError::ActorNotFound(999))
        ));
        let sensor = w.spawn_sensor(&SensorConfig::new(SensorKind::Rgb), id).unwrap();
        assert!(sensor > id);

        w.reset("Town01");
        assert!(w.vehicles.is_empty() && w.sensors.is_empty());
        let next = w.spawn_vehicle("vehicle.a", &at(0.0, 0.0)).unwrap();
        assert!(next > sensor);
    }

    #[test]
    fn cameras_emit_one_frame_per_tick() {
        let mut w = world();
        let id = w.spawn_vehicle("vehicle.a", &at(0.0, 0.0)).unwrap();
        let sensor = w
            .spawn_sensor(&SensorConfig::new(SensorKind::Depth).image_size(4, 2), id)
            .unwrap();
        assert!(w.step().is_empty());

        let received = Arc::new(Mutex::new(vec![]));
        let received_ = received.clone();
        let callback: SensorCallback = Box::new(move |event| {
            if let SensorEvent::Image(raw) = event {
                received_.lock().unwrap().push(raw);
            }
        });
        w.sensor_mut(sensor).unwrap().callback = Some(Arc::new(callback));
        for (callback, event) in w.step() {
            callback(event);
        }

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].frame, 2);
        assert_eq!(received[0].bgra.len(), 4 * 2 * 4);
        // sky is far away
        assert_eq!(&received[0].bgra[..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn collisions_are_reported_once_per_contact() {
        let mut w = World::new(HeadlessSimConfig::default().spawn_height(0.0));
        let a = w.spawn_vehicle("vehicle.a", &at(0.0, 0.0)).unwrap();
        let b = w.spawn_vehicle("vehicle.b", &at(5.0, 0.0)).unwrap();
        let sensor = w
            .spawn_sensor(&SensorConfig::new(SensorKind::Collisions), a)
            .unwrap();
        let impulses = Arc::new(Mutex::new(vec![]));
        let impulses_ = impulses.clone();
        let callback: SensorCallback = Box::new(move |event| {
            if let SensorEvent::Collision(c) = event {
                impulses_.lock().unwrap().push(c.normal_impulse);
            }
        });
        w.sensor_mut(sensor).unwrap().callback = Some(Arc::new(callback));
        w.vehicle_mut(a).unwrap().control = VehicleControl {
            throttle: 1.0,
            ..Default::default()
        };

        for _ in 0..60 {
            for (callback, event) in w.step() {
                callback(event);
            }
        }
        let impulses = impulses.lock().unwrap();
        assert_eq!(impulses.len(), 1);
        assert!(impulses[0].x > 2000.0);
        assert!(w.vehicles[&a].transform.location.x > w.vehicles[&b].transform.location.x - 2.0);
    }
}
