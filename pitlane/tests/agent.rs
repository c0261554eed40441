use anyhow::Result;
use pitlane_core::{
    base::{Simulator, SpawnPoint},
    record::{MemoryStorage, Storage, SENSOR_DIR},
    Action, Agent, AgentConfig, Lifecycle, PitlaneError, SensorKind, WaypointController,
};
use pitlane_sim::{circuit, HeadlessSim};
use std::sync::Arc;
use test_log::test;

fn points() -> Vec<SpawnPoint> {
    circuit(400, 300.0, 0.0)
}

fn agent(
    sim: &Arc<HeadlessSim>,
    storage: Arc<dyn Storage>,
    config: AgentConfig,
    spawn_index: usize,
) -> Agent<HeadlessSim> {
    Agent::new(
        sim.clone(),
        Box::new(WaypointController::default()),
        config,
        &points(),
        Some(spawn_index),
        storage,
    )
    .unwrap()
}

fn error_of<T: std::fmt::Debug>(result: Result<T>) -> PitlaneError {
    result
        .unwrap_err()
        .downcast::<PitlaneError>()
        .expect("not a PitlaneError")
}

#[test]
fn lifecycle_moves_forward_only() -> Result<()> {
    let sim = Arc::new(HeadlessSim::default());
    let storage = Arc::new(MemoryStorage::new());
    let mut a = agent(&sim, storage.clone(), AgentConfig::default(), 0);
    assert_eq!(a.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(a.name(), "WaypointController_rgb_collisions_0");
    assert!(matches!(
        error_of(a.initialize_sensors()),
        PitlaneError::NotSpawned
    ));

    a.initialize_vehicle()?;
    assert_eq!(sim.vehicle_count(), 1);
    assert!(matches!(
        error_of(a.initialize_vehicle()),
        PitlaneError::AlreadySpawned
    ));
    assert!(matches!(
        error_of(a.init_reporting()),
        PitlaneError::SensorsNotInitialized
    ));

    a.initialize_sensors()?;
    assert_eq!(sim.sensor_count(), 2);
    assert_eq!(sim.listening_sensor_count(), 2);
    assert!(matches!(
        error_of(a.initialize_sensors()),
        PitlaneError::AlreadyInitialized("sensors")
    ));

    a.init_reporting()?;
    assert_eq!(a.lifecycle(), Lifecycle::ReportingInitialized);
    assert!(matches!(
        error_of(a.init_reporting()),
        PitlaneError::AlreadyInitialized("reporting")
    ));

    sim.tick()?;
    a.get_state(0, true)?;
    assert_eq!(a.lifecycle(), Lifecycle::Running);

    a.destroy(true, None)?;
    assert_eq!(
        a.lifecycle(),
        Lifecycle::Destroyed {
            data_retained: false
        }
    );
    assert_eq!(sim.vehicle_count(), 0);
    assert_eq!(sim.sensor_count(), 0);

    // destroying twice does nothing
    a.destroy(true, None)?;
    assert!(matches!(
        error_of(a.initialize_vehicle()),
        PitlaneError::AlreadySpawned
    ));
    assert!(matches!(error_of(a.get_state(1, false)), PitlaneError::NotSpawned));
    Ok(())
}

#[test]
fn spawn_on_occupied_point_fails() -> Result<()> {
    let sim = Arc::new(HeadlessSim::default());
    let storage = Arc::new(MemoryStorage::new());
    let mut a = agent(&sim, storage.clone(), AgentConfig::default(), 0);
    let mut b = agent(&sim, storage, AgentConfig::default(), 0);
    a.initialize_vehicle()?;

    assert!(matches!(
        error_of(b.initialize_vehicle()),
        PitlaneError::SpawnFailed(_)
    ));
    assert_eq!(b.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(sim.vehicle_count(), 1);
    Ok(())
}

#[test]
fn vehicle_keeps_spawn_heading() -> Result<()> {
    let sim = Arc::new(HeadlessSim::default());
    let mut a = agent(&sim, Arc::new(MemoryStorage::new()), AgentConfig::default(), 100);
    a.initialize_vehicle()?;
    let transform = a.transform()?;
    let point = points()[100];
    assert!((transform.rotation.yaw - point.yaw).abs() < 1e-9);
    assert!((transform.location.x - point.x).abs() < 1e-9);
    assert!(transform.location.z > point.z);
    assert_eq!(a.velocity()?, 0.0);
    Ok(())
}

#[test]
fn missing_frames_time_out() -> Result<()> {
    let sim = Arc::new(HeadlessSim::default());
    let config = AgentConfig::default().sensor_timeout_ms(50);
    let mut a = agent(&sim, Arc::new(MemoryStorage::new()), config, 0);
    a.initialize_vehicle()?;
    a.initialize_sensors()?;

    // no tick, no frame
    match error_of(a.get_state(0, true)) {
        PitlaneError::SensorTimeout { kind, .. } => assert_eq!(kind, SensorKind::Rgb),
        e => panic!("unexpected error: {}", e),
    }

    // without retrieval, the state is taken from the vehicle alone
    let state = a.get_state(0, false)?;
    assert_eq!(state.indexes[&SensorKind::Rgb], vec![0]);
    assert!(state.data.is_empty());
    Ok(())
}

#[test]
fn each_step_saves_its_own_frame() -> Result<()> {
    let sim = Arc::new(HeadlessSim::default());
    let storage = Arc::new(MemoryStorage::new());
    let config = AgentConfig::default()
        .sensor_kinds(&[SensorKind::Rgb])
        .no_data_points(3);
    let mut a = agent(&sim, storage.clone(), config, 0);
    a.initialize_vehicle()?;
    a.initialize_sensors()?;
    assert!(matches!(
        error_of(a.report(&Default::default(), &Action::default(), 0.5, false)),
        PitlaneError::ReportingNotInitialized
    ));
    a.init_reporting()?;

    let mut ticked = vec![];
    for step in 0..5 {
        ticked.push(sim.tick()?);
        let state = a.get_state(step, true)?;
        assert_eq!(state.indexes[&SensorKind::Rgb], vec![step, step + 1, step + 2]);
        let data = &state.data[&SensorKind::Rgb];
        assert_eq!(data.len(), (step + 1).min(3));
        assert_eq!(data.last().unwrap().frame, ticked[step]);
        assert_eq!(data[0].frame, ticked[step.saturating_sub(2)]);

        let action = a.play_step(&state, false)?;
        a.report(&state, &action, 0.5, step == 4)?;
    }

    let dir = a.save_path();
    let sensors = dir.join(SENSOR_DIR);
    assert_eq!(storage.frame_paths().len(), 5);
    for (step, frame) in ticked.iter().enumerate() {
        assert_eq!(
            storage.frame_at(&sensors.join(format!("rgb_{}.png", step))),
            Some(*frame)
        );
    }
    assert_eq!(a.retained_frames(SensorKind::Rgb).len(), 2);

    // a frame taken outside of a step is the only one left to flush
    let extra = sim.tick()?;
    a.retrieve_data()?;
    assert_eq!(a.retained_frames(SensorKind::Rgb).len(), 3);
    a.destroy(false, Some(5))?;
    assert_eq!(storage.frame_paths().len(), 6);
    assert_eq!(storage.frame_at(&sensors.join("rgb_5.png")), Some(extra));
    assert_eq!(storage.frame_at(&sensors.join("rgb_4.png")), Some(ticked[4]));
    assert!(storage.frame_at(&sensors.join("rgb_6.png")).is_none());
    assert!(a.retained_frames(SensorKind::Rgb).is_empty());
    assert_eq!(
        a.lifecycle(),
        Lifecycle::Destroyed {
            data_retained: true
        }
    );

    let rows = storage.rows(&dir).unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].first().map(String::as_str), Some("step"));
    assert_eq!(rows[0][1], "rgb_indexes");
    assert!(rows.iter().all(|r| r.len() == rows[0].len()));
    assert_eq!(rows[1][0], "0");
    assert_eq!(rows[1][1], "[0, 1, 2]");
    assert_eq!(rows[5].last().map(String::as_str), Some("true"));
    assert_eq!(rows[4].last().map(String::as_str), Some("false"));

    let metadata = storage.metadata(&dir).unwrap();
    assert_eq!(metadata["no_data_points"], 3);
    assert_eq!(metadata["vehicle"], "vehicle.tesla.model3");
    assert_eq!(metadata["controller"]["type"], "WaypointController");
    Ok(())
}
