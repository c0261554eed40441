//! Configuration of [`Collector`](super::Collector).
use crate::reward::RewardConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Collector`](super::Collector).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CollectorConfig {
    /// Maximum number of transitions per agent.
    pub max_steps: usize,

    /// An agent finishes when its normalized distance to finish is at most
    /// this value, in `0..=10000`.
    pub finish_threshold: f64,

    /// Consumes camera frames at every step.
    pub retrieve_data: bool,

    /// Reward of transitions.
    pub reward: RewardConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            finish_threshold: 100.0,
            retrieve_data: true,
            reward: RewardConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Sets the maximum number of transitions.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the finish threshold.
    pub fn finish_threshold(mut self, v: f64) -> Self {
        self.finish_threshold = v;
        self
    }

    /// Enables or disables consuming camera frames.
    pub fn retrieve_data(mut self, v: bool) -> Self {
        self.retrieve_data = v;
        self
    }

    /// Sets the reward configuration.
    pub fn reward(mut self, v: RewardConfig) -> Self {
        self.reward = v;
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
