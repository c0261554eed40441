//! Agent driving one vehicle.
use super::{AgentConfig, Lifecycle};
use crate::{
    base::{
        SensorActor, SensorEvent, Simulator, SpawnPoint, Transform, Vector3, VehicleActor,
        VehicleControl,
    },
    control::{Action, Controller},
    record::{Storage, SENSOR_DIR},
    sensor::{CollisionAccumulator, SensorChannel, SensorConfig, SensorFrame, SensorKind},
    state::StateSnapshot,
    track::WaypointTrack,
    PitlaneError,
};
use anyhow::{anyhow, Result};
use chrono::Local;
use log::{debug, info, trace, warn};
use rand::Rng;
use serde_json::json;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Arc,
};

enum SensorBuffer {
    Frames(SensorChannel),
    Collisions(CollisionAccumulator),
}

struct MountedSensor<A> {
    config: SensorConfig,
    actor: Option<A>,
    buffer: SensorBuffer,
    // simulation frames of the retained frames already written
    saved: BTreeSet<u64>,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Owns one vehicle, its sensors and its waypoint track.
///
/// # Lifecycle
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Uninitialized
///     Uninitialized --> VehicleSpawned: initialize_vehicle
///     VehicleSpawned --> SensorsInitialized: initialize_sensors
///     SensorsInitialized --> ReportingInitialized: init_reporting
///     ReportingInitialized --> Running: get_state
///     Running --> Running: get_state, play_step, report
///     Uninitialized --> Destroyed: destroy
///     VehicleSpawned --> Destroyed: destroy
///     SensorsInitialized --> Destroyed: destroy
///     ReportingInitialized --> Destroyed: destroy
///     Running --> Destroyed: destroy
/// ```
///
/// Stages never move backward: spawning twice fails with
/// [`PitlaneError::AlreadySpawned`], initializing sensors or reporting twice
/// with [`PitlaneError::AlreadyInitialized`].
///
/// # Sensor data
///
/// Every camera sensor feeds a [`SensorChannel`] from the simulator's delivery
/// thread. [`Agent::get_state`] with `retrieve_data` consumes exactly one frame
/// per camera, so it must be called once per tick. The new frame is saved as
/// `sensors/<sensor>_<step>.png` under [`Agent::save_path`], the frames
/// retained in the window of `no_data_points` frames are copied into the
/// state, and once the window is full its oldest frame is evicted.
///
/// A frame is retained only when every camera has one, so a camera that times
/// out leaves the others untouched and the step can be retried.
pub struct Agent<S: Simulator> {
    sim: Arc<S>,
    controller: Box<dyn Controller>,
    config: AgentConfig,
    storage: Arc<dyn Storage>,
    vehicle: Option<S::Vehicle>,
    sensors: BTreeMap<SensorKind, MountedSensor<S::Sensor>>,
    track: WaypointTrack,
    spawn_point: SpawnPoint,
    map: String,
    date_time: String,
    lifecycle: Lifecycle,
    schema: Vec<String>,
}

impl<S: Simulator> Agent<S> {
    /// Creates an agent starting at `spawn_points[spawn_index]`.
    ///
    /// A random spawn point is chosen if `spawn_index` is `None`. Nothing is
    /// spawned until [`Agent::initialize_vehicle`].
    pub fn new(
        sim: Arc<S>,
        controller: Box<dyn Controller>,
        config: AgentConfig,
        spawn_points: &[SpawnPoint],
        spawn_index: Option<usize>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        if config.no_data_points == 0 {
            return Err(anyhow!("no_data_points must be at least 1"));
        }
        if spawn_points.is_empty() {
            return Err(PitlaneError::InvalidTrack("no spawn points".to_string()))?;
        }
        let spawn_index =
            spawn_index.unwrap_or_else(|| rand::thread_rng().gen_range(0..spawn_points.len()));
        let track = WaypointTrack::from_spawn_points(spawn_points, spawn_index, config.tail_cut)?;
        let map = format!(
            "{}{}",
            sim.map_name()?,
            if config.invert { "_invert" } else { "" }
        );

        Ok(Self {
            sim,
            controller,
            config,
            storage,
            vehicle: None,
            sensors: BTreeMap::new(),
            track,
            spawn_point: spawn_points[spawn_index],
            map,
            date_time: Local::now().format("%Y%m%d_%H%M").to_string(),
            lifecycle: Lifecycle::Uninitialized,
            schema: vec![],
        })
    }

    /// Name of the agent, `<controller>_<sensors>_<spawn index>`.
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.controller.name(),
            self.config.sensor_names().join("_"),
            self.track.spawn_index()
        )
    }

    /// Directory of the data of the agent,
    /// `<data_path>/experiments/<map>[_invert]/<YYYYmmdd_HHMM>/<name>`.
    pub fn save_path(&self) -> PathBuf {
        self.config
            .data_path
            .join("experiments")
            .join(&self.map)
            .join(&self.date_time)
            .join(self.name())
    }

    /// Description of the agent written to the metadata file.
    pub fn metadata(&self) -> serde_json::Value {
        let vehicle = match &self.vehicle {
            Some(v) => v.type_id(),
            None => self.config.vehicle.clone(),
        };
        json!({
            "name": self.name(),
            "map": self.map,
            "save_path": self.save_path().to_string_lossy(),
            "spawn_point_idx": self.track.spawn_index(),
            "no_data_points": self.config.no_data_points,
            "sensors": self.config.sensor_names(),
            "controller": self.controller.info(),
            "vehicle": vehicle,
        })
    }

    /// Stage of the lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Configuration of the agent.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Track followed by the agent.
    pub fn track(&self) -> &WaypointTrack {
        &self.track
    }

    /// Index of the spawn point.
    pub fn spawn_index(&self) -> usize {
        self.track.spawn_index()
    }

    /// Spawn point, with its heading.
    pub fn spawn_point(&self) -> SpawnPoint {
        self.spawn_point
    }

    /// Keys of the report rows, without `reward` and `done`.
    ///
    /// Empty until reporting is initialized.
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// Replaces the track with the full rotation of `spawn_points` starting at
    /// `spawn_index`.
    ///
    /// Meant for choosing the spawn point explicitly before spawning.
    pub fn set_waypoints(&mut self, spawn_points: &[SpawnPoint], spawn_index: usize) -> Result<()> {
        self.track = WaypointTrack::new(spawn_points, spawn_index)?;
        self.spawn_point = spawn_points[spawn_index];
        Ok(())
    }

    fn vehicle(&self) -> Result<&S::Vehicle> {
        Ok(self.vehicle.as_ref().ok_or(PitlaneError::NotSpawned)?)
    }

    /// Transform of the vehicle.
    pub fn transform(&self) -> Result<Transform> {
        Ok(self.vehicle()?.transform())
    }

    /// Location of the vehicle.
    pub fn location(&self) -> Result<Vector3> {
        Ok(self.vehicle()?.location())
    }

    /// Speed of the vehicle in km/h.
    pub fn velocity(&self) -> Result<f64> {
        Ok(3.6 * self.vehicle()?.velocity().norm())
    }

    /// Velocity vector of the vehicle in m/s.
    pub fn velocity_vec(&self) -> Result<Vector3> {
        Ok(self.vehicle()?.velocity())
    }

    /// Normalized distance of the vehicle to the end of the track.
    pub fn distance_to_finish(&self) -> Result<f64> {
        Ok(self.track.distance_to_finish(&self.location()?))
    }

    /// Accumulated collision impulse, 0 below the noise threshold or without
    /// a collision sensor.
    pub fn collision(&self) -> f64 {
        match self.sensors.get(&SensorKind::Collisions) {
            Some(MountedSensor {
                buffer: SensorBuffer::Collisions(acc),
                ..
            }) => acc.magnitude(),
            _ => 0.0,
        }
    }

    /// Spawns the vehicle at the spawn point and holds it with full brake.
    pub fn initialize_vehicle(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Uninitialized {
            return Err(PitlaneError::AlreadySpawned)?;
        }
        let mut vehicle = self
            .sim
            .spawn_vehicle(&self.config.vehicle, &self.spawn_point.to_transform())
            .map_err(|e| PitlaneError::SpawnFailed(format!("vehicle of {}: {}", self.name(), e)))?;
        if let Err(e) = vehicle.apply_control(&VehicleControl::full_brake()) {
            if let Err(e) = vehicle.destroy() {
                warn!("Failed to destroy vehicle {}: {}", vehicle.id(), e);
            }
            return Err(e);
        }
        info!(
            "Vehicle {} of {} spawned at point {}",
            vehicle.id(),
            self.name(),
            self.track.spawn_index()
        );
        self.vehicle = Some(vehicle);
        self.lifecycle = Lifecycle::VehicleSpawned;
        Ok(())
    }

    /// Spawns the configured sensors on the vehicle and starts listening.
    ///
    /// On failure, sensors spawned so far stay attached until
    /// [`Agent::destroy`].
    pub fn initialize_sensors(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::VehicleSpawned => {}
            Lifecycle::Uninitialized | Lifecycle::Destroyed { .. } => {
                return Err(PitlaneError::NotSpawned)?
            }
            _ => return Err(PitlaneError::AlreadyInitialized("sensors"))?,
        }

        let name = self.name();
        let vehicle = self.vehicle.as_ref().ok_or(PitlaneError::NotSpawned)?;
        for config in self.config.sensors.iter() {
            let kind = config.kind;
            if let Some(mut previous) = self.sensors.remove(&kind) {
                warn!("Sensor {} of {} configured twice, keeping the last one", kind, name);
                if let Some(actor) = previous.actor.as_mut() {
                    actor.destroy()?;
                }
            }
            let mut actor = self
                .sim
                .spawn_sensor(config, vehicle)
                .map_err(|e| PitlaneError::SpawnFailed(format!("sensor {} of {}: {}", kind, name, e)))?;

            let buffer = if kind.is_retrieval() {
                let (channel, sink) =
                    SensorChannel::new(kind, self.config.no_data_points, self.config.sensor_timeout());
                actor.listen(Box::new(move |event| match event {
                    SensorEvent::Image(raw) => sink.on_frame(raw),
                    SensorEvent::Collision(_) => warn!("Camera {} received a collision", kind),
                }))?;
                SensorBuffer::Frames(channel)
            } else {
                let acc = CollisionAccumulator::new();
                let acc_ = acc.clone();
                actor.listen(Box::new(move |event| match event {
                    SensorEvent::Collision(collision) => acc_.record(&collision),
                    SensorEvent::Image(raw) => {
                        warn!("Collision sensor received frame {}", raw.frame)
                    }
                }))?;
                SensorBuffer::Collisions(acc)
            };
            debug!("Sensor {} ({}) of {} listening", kind, actor.id(), name);

            self.sensors.insert(
                kind,
                MountedSensor {
                    config: config.clone(),
                    actor: Some(actor),
                    buffer,
                    saved: BTreeSet::new(),
                },
            );
        }

        self.lifecycle = Lifecycle::SensorsInitialized;
        info!("Sensors of {} initialized", name);
        Ok(())
    }

    /// Releases the brake before stepping starts.
    pub fn release_control(&self) -> Result<()> {
        self.vehicle()?.apply_control(&VehicleControl::released())
    }

    /// Moves one frame of every camera into its retained window without
    /// evicting.
    pub fn retrieve_data(&mut self) -> Result<()> {
        if !self.lifecycle.has_sensors() {
            return Err(PitlaneError::SensorsNotInitialized)?;
        }
        self.drain_frames()
    }

    fn drain_frames(&mut self) -> Result<()> {
        for mounted in self.sensors.values_mut() {
            if let SensorBuffer::Frames(channel) = &mut mounted.buffer {
                channel.fetch()?;
            }
        }
        for mounted in self.sensors.values_mut() {
            if let SensorBuffer::Frames(channel) = &mut mounted.buffer {
                channel.drain_one()?;
            }
        }
        Ok(())
    }

    /// Drops the frames queued on all cameras and returns their number.
    ///
    /// Frames delivered while nobody consumes them, for instance during
    /// stabilization, would otherwise be paired with later steps.
    pub fn discard_pending_frames(&mut self) -> usize {
        self.sensors
            .values_mut()
            .map(|mounted| match &mut mounted.buffer {
                SensorBuffer::Frames(channel) => channel.discard_pending(),
                SensorBuffer::Collisions(_) => 0,
            })
            .sum()
    }

    fn snapshot(&mut self, step: usize, retrieve_data: bool) -> Result<StateSnapshot> {
        match self.lifecycle {
            Lifecycle::Uninitialized | Lifecycle::Destroyed { .. } => {
                return Err(PitlaneError::NotSpawned)?
            }
            Lifecycle::VehicleSpawned => return Err(PitlaneError::SensorsNotInitialized)?,
            _ => {}
        }
        if retrieve_data {
            self.drain_frames()?;
        }
        let vehicle = self.vehicle.as_ref().ok_or(PitlaneError::NotSpawned)?;

        let mut state = StateSnapshot {
            step,
            ..Default::default()
        };
        let sensor_dir = self.save_path().join(SENSOR_DIR);
        let storage = &self.storage;
        let save_frames = self.config.save_frames;

        for (kind, mounted) in self.sensors.iter_mut() {
            let MountedSensor { buffer, saved, .. } = mounted;
            let channel = match buffer {
                SensorBuffer::Frames(channel) => channel,
                SensorBuffer::Collisions(_) => continue,
            };
            state.indexes.insert(
                *kind,
                SensorChannel::indices_for_step(step, channel.window()),
            );
            if retrieve_data {
                state.data.insert(*kind, channel.retained());
                if let Some(frame) = channel.newest() {
                    if save_frames {
                        let path = sensor_dir.join(format!("{}_{}.png", kind, step));
                        storage.save_frame(&path, frame)?;
                    }
                    saved.insert(frame.frame);
                }
                if channel.retained_len() >= channel.window() {
                    channel.release(None)?;
                    saved.retain(|frame| channel.retains(*frame));
                }
            }
        }

        let control = vehicle.control();
        let transform = vehicle.transform();
        let velocity = vehicle.velocity();
        state.collisions = self.collision();
        state.steer = control.steer;
        state.gas_brake = control.gas_brake();
        state.velocity = 3.6 * velocity.norm();
        state.velocity_vec = velocity;
        state.yaw = transform.rotation.yaw;
        state.location = transform.location;
        state.distance_to_finish = self.track.distance_to_finish(&transform.location);
        trace!("{} at step {}: {:?}", self.name(), step, state.location);

        Ok(state)
    }

    /// Takes the state of the agent at `step`.
    ///
    /// With `retrieve_data`, blocks until every camera delivered one frame, at
    /// most for the sensor timeout of the configuration. The first state taken
    /// after [`Agent::init_reporting`] moves the agent to [`Lifecycle::Running`].
    pub fn get_state(&mut self, step: usize, retrieve_data: bool) -> Result<StateSnapshot> {
        let state = self.snapshot(step, retrieve_data)?;
        if self.lifecycle == Lifecycle::ReportingInitialized {
            self.lifecycle = Lifecycle::Running;
        }
        Ok(state)
    }

    /// Asks the controller for the action in `state`.
    ///
    /// The action is applied to the vehicle unless `batch` is `true`, in which
    /// case the caller applies it with [`Agent::apply_action`].
    pub fn play_step(&mut self, state: &StateSnapshot, batch: bool) -> Result<Action> {
        let action = self.controller.control(state, &self.track);
        if !batch {
            self.apply_action(&action)?;
        }
        Ok(action)
    }

    /// Applies an action to the vehicle.
    pub fn apply_action(&self, action: &Action) -> Result<()> {
        self.vehicle()?.apply_control(&action.into())
    }

    /// Writes the header of the episode file and the metadata of the agent.
    ///
    /// The header lists the keys of a state without data keys, the keys of an
    /// action, then `reward` and `done`. It is derived from one sample state
    /// and one action of the controller, not applied to the vehicle.
    pub fn init_reporting(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::SensorsInitialized => {}
            Lifecycle::VehicleSpawned => return Err(PitlaneError::SensorsNotInitialized)?,
            Lifecycle::Uninitialized | Lifecycle::Destroyed { .. } => {
                return Err(PitlaneError::NotSpawned)?
            }
            Lifecycle::ReportingInitialized | Lifecycle::Running => {
                return Err(PitlaneError::AlreadyInitialized("reporting"))?
            }
        }

        let mut state = self.snapshot(0, false)?;
        if self.controller.requires_frames() {
            for (kind, mounted) in self.sensors.iter() {
                if kind.is_retrieval() {
                    let frame =
                        SensorFrame::blank(mounted.config.image_size_x, mounted.config.image_size_y);
                    state
                        .data
                        .insert(*kind, vec![frame; self.config.no_data_points]);
                }
            }
        }
        let action = self.play_step(&state, true)?;

        let mut schema = state.schema_keys();
        schema.extend(action.to_record().keys().cloned());
        let mut header = schema.clone();
        header.push("reward".to_string());
        header.push("done".to_string());

        let save_path = self.save_path();
        self.storage.create_episode(&save_path, &header)?;
        self.storage.write_metadata(&save_path, &self.metadata())?;
        self.schema = schema;
        self.lifecycle = Lifecycle::ReportingInitialized;
        info!("Reporting of {} initialized in {:?}", self.name(), save_path);
        Ok(())
    }

    /// Appends the row of a transition to the episode file.
    pub fn report(
        &self,
        state: &StateSnapshot,
        action: &Action,
        reward: f64,
        done: bool,
    ) -> Result<()> {
        if !self.lifecycle.is_reporting() {
            return Err(PitlaneError::ReportingNotInitialized)?;
        }
        let record = state.to_record().merge(action.to_record());
        let mut fields = record.fields_for(&self.schema)?;
        fields.push(reward.to_string());
        fields.push(done.to_string());
        self.storage.append_row(&self.save_path(), &fields)
    }

    /// Destroys the sensors and the vehicle.
    ///
    /// With `step`, the retained frames not saved yet, which are those taken
    /// with [`Agent::retrieve_data`], are saved first as
    /// `<sensor>_<step + i>.png`. With `data`, the in-memory sensor state is
    /// dropped. All actors are attempted even if some fail; the failures are
    /// returned together. Destroying a destroyed agent does nothing.
    pub fn destroy(&mut self, data: bool, step: Option<usize>) -> Result<()> {
        if self.lifecycle.is_destroyed() {
            debug!("{} already destroyed", self.name());
            return Ok(());
        }
        let name = self.name();
        let sensor_dir = self.save_path().join(SENSOR_DIR);
        let mut errors = vec![];

        for (kind, mounted) in self.sensors.iter_mut() {
            let MountedSensor {
                buffer,
                saved,
                actor,
                ..
            } = mounted;
            if let (Some(step), SensorBuffer::Frames(channel)) = (step, buffer) {
                let mut i = 0;
                for frame in channel.retained() {
                    if saved.contains(&frame.frame) {
                        if let Err(e) = channel.release(None) {
                            errors.push(format!("releasing sensor {}: {}", kind, e));
                        }
                        continue;
                    }
                    let path = sensor_dir.join(format!("{}_{}.png", kind, step + i));
                    if let Err(e) =
                        release(channel, self.storage.as_ref(), &path, self.config.save_frames)
                    {
                        errors.push(format!("saving {:?}: {}", path, e));
                    }
                    i += 1;
                }
                saved.clear();
            }
            if let Some(mut actor) = actor.take() {
                if let Err(e) = actor.stop() {
                    errors.push(format!("stopping sensor {}: {}", kind, e));
                }
                if let Err(e) = actor.destroy() {
                    errors.push(format!("destroying sensor {}: {}", kind, e));
                }
            }
        }

        if let Some(mut vehicle) = self.vehicle.take() {
            if let Err(e) = vehicle.destroy() {
                errors.push(format!("destroying vehicle {}: {}", vehicle.id(), e));
            }
        }

        if data {
            self.sensors.clear();
        }
        self.lifecycle = Lifecycle::Destroyed {
            data_retained: !data,
        };

        if errors.is_empty() {
            info!("{} destroyed", name);
            Ok(())
        } else {
            Err(anyhow!("Failed to destroy {}: {}", name, errors.join("; ")))
        }
    }

    /// Frames retained by a camera, oldest first.
    ///
    /// Empty for sensors without frames or after the data was dropped.
    pub fn retained_frames(&self, kind: SensorKind) -> Vec<SensorFrame> {
        match self.sensors.get(&kind) {
            Some(MountedSensor {
                buffer: SensorBuffer::Frames(channel),
                ..
            }) => channel.retained(),
            _ => vec![],
        }
    }
}

fn release(
    channel: &mut SensorChannel,
    storage: &dyn Storage,
    path: &Path,
    save: bool,
) -> Result<()> {
    if save {
        channel.release(Some(&|frame: &SensorFrame| storage.save_frame(path, frame)))
    } else {
        channel.release(None)
    }
}
