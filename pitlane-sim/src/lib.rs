#![warn(missing_docs)]
//! Headless reference simulator for Pitlane.
//!
//! [`HeadlessSim`] implements [`Simulator`](pitlane_core::base::Simulator)
//! without rendering: vehicles follow a kinematic bicycle model and settle
//! onto the ground after spawning, cameras emit synthetic frames and
//! collision sensors report vehicles coming into contact. Maps are circuits
//! of evenly spaced spawn points, see [`circuit`].
mod actor;
mod config;
mod error;
mod sim;
mod track;
mod world;
pub use actor::{HeadlessSensor, HeadlessVehicle};
pub use config::HeadlessSimConfig;
pub use error::HeadlessSimError;
pub use sim::HeadlessSim;
pub use track::{circuit, inverted};
