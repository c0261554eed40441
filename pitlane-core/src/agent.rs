//! Agents, each driving one vehicle.
mod base;
mod config;
mod lifecycle;
pub use base::Agent;
pub use config::AgentConfig;
pub use lifecycle::Lifecycle;
