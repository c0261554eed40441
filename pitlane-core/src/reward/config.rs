//! Configuration of [`RewardModel`](super::RewardModel).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Reward formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Speed ratio signed by the direction of progress.
    VelocityGated,

    /// Relative reduction of the remaining distance.
    DistanceRatio,
}

/// Configuration of [`RewardModel`](super::RewardModel).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RewardConfig {
    /// Reward formula.
    pub kind: RewardKind,

    /// Discount factor applied as `gamma^step`.
    pub gamma: f64,

    /// Constant subtracted from every reward.
    pub punishment: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            kind: RewardKind::VelocityGated,
            gamma: 0.995,
            punishment: 0.05,
        }
    }
}

impl RewardConfig {
    /// Sets the reward formula.
    pub fn kind(mut self, kind: RewardKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Sets the punishment.
    pub fn punishment(mut self, punishment: f64) -> Self {
        self.punishment = punishment;
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
