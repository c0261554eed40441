//! A complete collection run.
use anyhow::{anyhow, Result};
use log::info;
use pitlane_core::{
    base::{Simulator, SpawnPoint},
    record::Storage,
    AgentConfig, CollectStat, Collector, CollectorConfig, Controller, Environment,
    EnvironmentConfig, WaypointController, WaypointControllerConfig,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    sync::Arc,
};

/// Configuration of [`run_session`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Map driven by the agents.
    pub map: String,

    /// Runs the world with fixed steps of `1 / frame_rate` seconds.
    pub synchronous: bool,

    /// Ticks per simulated second in synchronous mode.
    ///
    /// The default value is 20.
    pub frame_rate: u32,

    /// Number of agents spread over the track.
    pub agents: usize,

    /// Configuration shared by all agents.
    pub agent: AgentConfig,

    /// Configuration of the environment.
    pub env: EnvironmentConfig,

    /// Configuration of the collection loop.
    pub collector: CollectorConfig,

    /// Configuration of the controller of every agent.
    pub controller: WaypointControllerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            map: "Town04".to_string(),
            synchronous: true,
            frame_rate: 20,
            agents: 4,
            agent: AgentConfig::default(),
            env: EnvironmentConfig::default(),
            collector: CollectorConfig::default(),
            controller: WaypointControllerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Sets the map.
    pub fn map(mut self, v: impl Into<String>) -> Self {
        self.map = v.into();
        self
    }

    /// Sets the number of agents.
    pub fn agents(mut self, v: usize) -> Self {
        self.agents = v;
        self
    }

    /// Sets the frame rate.
    pub fn frame_rate(mut self, v: u32) -> Self {
        self.frame_rate = v;
        self
    }

    /// Sets the configuration of the agents.
    pub fn agent(mut self, v: AgentConfig) -> Self {
        self.agent = v;
        self
    }

    /// Sets the configuration of the environment.
    pub fn env(mut self, v: EnvironmentConfig) -> Self {
        self.env = v;
        self
    }

    /// Sets the configuration of the collection loop.
    pub fn collector(mut self, v: CollectorConfig) -> Self {
        self.collector = v;
        self
    }

    /// Sets the configuration of the controllers.
    pub fn controller(mut self, v: WaypointControllerConfig) -> Self {
        self.controller = v;
        self
    }

    /// Creates the environment of the session.
    pub fn build_env<S: Simulator>(
        &self,
        sim: Arc<S>,
        storage: Arc<dyn Storage>,
    ) -> Environment<S> {
        Environment::new(sim, storage, self.env.clone())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Resets the world of `env`, spawns the agents of `config` on `spawn_points`,
/// and collects their trajectories until all of them are done.
///
/// Every agent is driven by a [`WaypointController`]. When the agents drive
/// the track in reverse (`config.agent.invert`), `spawn_points` must already
/// be reversed. The destroyed agents stay in `env` for inspection until the
/// next reset.
pub fn run_session<S: Simulator>(
    env: &mut Environment<S>,
    spawn_points: &[SpawnPoint],
    config: &SessionConfig,
) -> Result<Vec<CollectStat>> {
    env.reset_env(&config.map, config.synchronous, config.frame_rate)?;

    let controller = config.controller.clone();
    let spawned = env.init_agents(config.agents, &config.agent, spawn_points, |_| {
        Box::new(WaypointController::new(controller.clone())) as Box<dyn Controller>
    })?;
    if spawned == 0 {
        return Err(anyhow!("No agent spawned on {}", config.map));
    }

    env.initialize_agents_sensors();
    let stabilization = env.stabilize_vehicles()?;
    info!("Stabilization: {:?}", stabilization);
    if env.initialize_agents_reporting() == 0 {
        return Err(anyhow!("No agent ready to report"));
    }
    env.release_agents_control();

    Collector::new(config.collector.clone()).collect(env)
}
