//! Configuration of [`Environment`](super::Environment).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Environment`](super::Environment).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    /// Maximum number of ticks waiting for vehicles to come to rest.
    ///
    /// The default value is 100.
    pub max_stabilization_ticks: usize,

    /// Ticks issued after spawning the vehicles.
    ///
    /// The default value is 2.
    pub settle_ticks: usize,

    /// Seed of the spawn offsets. Taken from entropy if `None`.
    pub seed: Option<u64>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            max_stabilization_ticks: 100,
            settle_ticks: 2,
            seed: None,
        }
    }
}

impl EnvironmentConfig {
    /// Sets the maximum number of stabilization ticks.
    pub fn max_stabilization_ticks(mut self, v: usize) -> Self {
        self.max_stabilization_ticks = v;
        self
    }

    /// Sets the number of ticks after spawning.
    pub fn settle_ticks(mut self, v: usize) -> Self {
        self.settle_ticks = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
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
    fn test_serde_environment_config() -> Result<()> {
        let config = EnvironmentConfig::default()
            .max_stabilization_ticks(20)
            .seed(42);
        let dir = TempDir::new("environment_config")?;
        let path = dir.path().join("environment_config.yaml");
        config.save(&path)?;
        assert_eq!(EnvironmentConfig::load(&path)?, config);
        Ok(())
    }
}
