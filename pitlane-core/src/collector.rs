//! Collection loop producing state, action, reward and done rows.
mod base;
mod config;
mod stat;
pub use base::Collector;
pub use config::CollectorConfig;
pub use stat::{collect_stats_fmt, CollectStat, Outcome};
