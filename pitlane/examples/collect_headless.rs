//! Collects trajectories of waypoint-following agents in the headless simulator.
use anyhow::Result;
use clap::Parser;
use pitlane::{run_session, SessionConfig};
use pitlane_core::{
    collect_stats_fmt, record::FsStorage, AgentConfig, CollectorConfig, EnvironmentConfig,
    RewardConfig, RewardKind, SensorKind,
};
use pitlane_sim::{inverted, HeadlessSim, HeadlessSimConfig};
use std::sync::Arc;

fn parse_sensor(s: &str) -> Result<SensorKind, String> {
    SensorKind::ALL
        .iter()
        .find(|k| k.name() == s)
        .copied()
        .ok_or_else(|| format!("unknown sensor {}", s))
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Map to load
    #[arg(long, default_value = "Town04")]
    map: String,

    /// Number of agents
    #[arg(short, long, default_value_t = 4)]
    agents: usize,

    /// Maximum number of steps per agent
    #[arg(long, default_value_t = 300)]
    max_steps: usize,

    /// Root directory of the collected data
    #[arg(short, long, default_value = "data")]
    data_path: String,

    /// Sensors mounted on every vehicle
    #[arg(long, value_delimiter = ',', value_parser = parse_sensor,
          default_values_t = [SensorKind::Rgb, SensorKind::Collisions])]
    sensors: Vec<SensorKind>,

    /// Frames in the state of every camera
    #[arg(long, default_value_t = 1)]
    no_data_points: usize,

    /// Drive the track in reverse
    #[arg(long, default_value_t = false)]
    invert: bool,

    /// Use the distance-ratio reward instead of the velocity-gated one
    #[arg(long, default_value_t = false)]
    distance_ratio: bool,

    /// Seed of the spawn offsets
    #[arg(long)]
    seed: Option<u64>,

    /// Load the session from a YAML file, ignoring the other options
    #[arg(long)]
    config: Option<String>,
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig> {
        if let Some(path) = &self.config {
            return SessionConfig::load(path);
        }
        let reward = RewardConfig::default().kind(if self.distance_ratio {
            RewardKind::DistanceRatio
        } else {
            RewardKind::VelocityGated
        });
        let mut env = EnvironmentConfig::default();
        if let Some(seed) = self.seed {
            env = env.seed(seed);
        }
        Ok(SessionConfig::default()
            .map(self.map.clone())
            .agents(self.agents)
            .agent(
                AgentConfig::default()
                    .sensor_kinds(&self.sensors)
                    .no_data_points(self.no_data_points)
                    .invert(self.invert)
                    .data_path(&self.data_path),
            )
            .env(env)
            .collector(CollectorConfig::default().max_steps(self.max_steps).reward(reward)))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.session_config()?;

    let sim = Arc::new(HeadlessSim::new(
        HeadlessSimConfig::default().initial_map(config.map.clone()),
    ));
    let spawn_points = if config.agent.invert {
        inverted(&sim.spawn_points())
    } else {
        sim.spawn_points()
    };
    let mut env = config.build_env(sim.clone(), Arc::new(FsStorage));

    let stats = run_session(&mut env, &spawn_points, &config)?;
    println!("{}", collect_stats_fmt(&stats));
    for agent in env.agents() {
        println!("{}: {}", agent.name(), agent.save_path().display());
    }
    Ok(())
}
