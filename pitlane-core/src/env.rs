//! Environment owning the simulator handle and the pool of agents.
mod base;
mod config;
pub use base::{spawn_indexes, Environment, Stabilization};
pub use config::EnvironmentConfig;
