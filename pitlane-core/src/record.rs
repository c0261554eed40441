//! Flattened records of states and actions, and their persistence.
//!
//! A [`Record`] is an ordered key/value map. State snapshots and actions are
//! flattened into records, and the values of a record become one row of the
//! episode CSV file written through a [`Storage`].
//!
//! ```rust
//! use pitlane_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("step", RecordValue::Scalar(3.0));
//! record.insert("location", RecordValue::Array1(vec![1.0, 2.0, 0.5]));
//! assert_eq!(record.keys().cloned().collect::<Vec<_>>(), vec!["step", "location"]);
//! assert_eq!(record.to_fields(), vec!["3", "[1.0, 2.0, 0.5]"]);
//! ```
mod base;
mod storage;

pub use base::{Record, RecordValue};
pub use storage::{
    FsStorage, MemoryStorage, Storage, EPISODE_FILE, METADATA_FILE, SENSOR_DIR,
};
