//! Configuration of [`Agent`](super::Agent).
use crate::{
    sensor::{SensorConfig, SensorKind},
    track::DEFAULT_TAIL_CUT,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

/// Configuration of [`Agent`](super::Agent).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Blueprint of the vehicle.
    pub vehicle: String,

    /// Sensors mounted on the vehicle.
    ///
    /// The order is kept in the name of the agent. A kind listed twice is
    /// mounted once, with the last configuration.
    pub sensors: Vec<SensorConfig>,

    /// Retention window of camera sensors, the number of frames in a state.
    ///
    /// The default value is 1.
    pub no_data_points: usize,

    /// The track is driven in the reverse direction of the map's spawn points.
    ///
    /// Only tags the save path; the caller supplies the reversed points.
    pub invert: bool,

    /// Root directory of the collected data.
    pub data_path: PathBuf,

    /// Points before the spawn point dropped from the track.
    pub tail_cut: usize,

    /// Wait for a sensor frame in milliseconds.
    ///
    /// The default value is 10000.
    pub sensor_timeout_ms: u64,

    /// Saves camera frames evicted from the retention window.
    pub save_frames: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vehicle: "vehicle.tesla.model3".to_string(),
            sensors: vec![
                SensorConfig::new(SensorKind::Rgb),
                SensorConfig::new(SensorKind::Collisions),
            ],
            no_data_points: 1,
            invert: false,
            data_path: PathBuf::from("data"),
            tail_cut: DEFAULT_TAIL_CUT,
            sensor_timeout_ms: 10_000,
            save_frames: true,
        }
    }
}

impl AgentConfig {
    /// Sets the blueprint of the vehicle.
    pub fn vehicle(mut self, vehicle: impl Into<String>) -> Self {
        self.vehicle = vehicle.into();
        self
    }

    /// Sets the sensors.
    pub fn sensors(mut self, sensors: Vec<SensorConfig>) -> Self {
        self.sensors = sensors;
        self
    }

    /// Sets the sensors with their default configurations.
    pub fn sensor_kinds(mut self, kinds: &[SensorKind]) -> Self {
        self.sensors = kinds.iter().map(|k| SensorConfig::new(*k)).collect();
        self
    }

    /// Sets the retention window.
    pub fn no_data_points(mut self, v: usize) -> Self {
        self.no_data_points = v;
        self
    }

    /// Sets the direction flag.
    pub fn invert(mut self, v: bool) -> Self {
        self.invert = v;
        self
    }

    /// Sets the root directory of the collected data.
    pub fn data_path(mut self, v: impl AsRef<Path>) -> Self {
        self.data_path = v.as_ref().to_path_buf();
        self
    }

    /// Sets the number of points cut before the spawn point.
    pub fn tail_cut(mut self, v: usize) -> Self {
        self.tail_cut = v;
        self
    }

    /// Sets the wait for sensor frames in milliseconds.
    pub fn sensor_timeout_ms(mut self, v: u64) -> Self {
        self.sensor_timeout_ms = v;
        self
    }

    /// Enables or disables saving camera frames.
    pub fn save_frames(mut self, v: bool) -> Self {
        self.save_frames = v;
        self
    }

    /// Wait for a sensor frame.
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    /// Names of the sensor kinds in configuration order, without repetitions.
    pub fn sensor_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = vec![];
        for s in self.sensors.iter() {
            let name = s.kind.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_agent_config() -> Result<()> {
        let config = AgentConfig::default()
            .vehicle("vehicle.audi.tt")
            .sensor_kinds(&[SensorKind::Depth, SensorKind::Rgb, SensorKind::Collisions])
            .no_data_points(3)
            .invert(true)
            .sensor_timeout_ms(500);

        let dir = TempDir::new("agent_config")?;
        let path = dir.path().join("agent_config.yaml");
        config.save(&path)?;
        let config_ = AgentConfig::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(config_.sensor_timeout(), Duration::from_millis(500));
        Ok(())
    }

    #[test]
    fn sensor_names_keep_order() {
        let config = AgentConfig::default().sensor_kinds(&[
            SensorKind::Depth,
            SensorKind::Rgb,
            SensorKind::Depth,
        ]);
        assert_eq!(config.sensor_names(), vec!["depth", "rgb"]);
    }
}
