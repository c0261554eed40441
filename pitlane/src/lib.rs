//! Collection of simulated driving trajectories.
//!
//! Pitlane consists of the following crates:
//!
//! * [pitlane-core](pitlane_core) orchestrates agents, their sensors, rewards
//!   and reports over an abstract simulator.
//! * [pitlane-sim](pitlane_sim) is a headless simulator implementing that
//!   abstraction, used by the tests and the `collect_headless` example.
//!
//! This crate adds [`run_session`], the sequence of calls of a complete
//! collection run, configured by a [`SessionConfig`].
mod session;
pub use pitlane_core;
pub use pitlane_sim;
pub use session::{run_session, SessionConfig};
