//! State of an agent at one simulation step.
use crate::{
    base::Vector3,
    record::{Record, RecordValue},
    sensor::{SensorFrame, SensorKind},
};
use std::collections::BTreeMap;

/// State of an agent, taken once per tick.
///
/// Velocities are in km/h, angles in degrees, `distance_to_finish` is the
/// normalized remaining distance in `0..=10000`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateSnapshot {
    /// Simulation step.
    pub step: usize,

    /// Global data indices of every camera sensor.
    pub indexes: BTreeMap<SensorKind, Vec<usize>>,

    /// Retained frames of every camera sensor, present only when data was
    /// retrieved.
    pub data: BTreeMap<SensorKind, Vec<SensorFrame>>,

    /// Accumulated collision impulse, 0 below the noise threshold.
    pub collisions: f64,

    /// Steering of the applied control.
    pub steer: f64,

    /// Throttle minus brake of the applied control.
    pub gas_brake: f64,

    /// Speed in km/h.
    pub velocity: f64,

    /// Velocity vector in m/s.
    pub velocity_vec: Vector3,

    /// Heading in degrees.
    pub yaw: f64,

    /// Location.
    pub location: Vector3,

    /// Normalized distance to the end of the track.
    pub distance_to_finish: f64,
}

impl StateSnapshot {
    /// Flattens the state into a record.
    pub fn to_record(&self) -> Record {
        let mut record = Record::from_scalar("step", self.step as f64);
        for (kind, indexes) in self.indexes.iter() {
            record.insert(
                format!("{}_indexes", kind),
                RecordValue::Indices(indexes.clone()),
            );
            if let Some(frames) = self.data.get(kind) {
                record.insert(format!("{}_data", kind), RecordValue::Frames(frames.clone()));
            }
        }
        record.insert("collisions", RecordValue::Scalar(self.collisions));
        record.insert("state_steer", RecordValue::Scalar(self.steer));
        record.insert("state_gas_brake", RecordValue::Scalar(self.gas_brake));
        record.insert("velocity", RecordValue::Scalar(self.velocity));
        record.insert(
            "velocity_vec",
            RecordValue::Array1(self.velocity_vec.to_array().to_vec()),
        );
        record.insert("yaw", RecordValue::Scalar(self.yaw));
        record.insert(
            "location",
            RecordValue::Array1(self.location.to_array().to_vec()),
        );
        record.insert("distance_2finish", RecordValue::Scalar(self.distance_to_finish));
        record
    }

    /// Keys of the state written to reports, the data keys excluded.
    pub fn schema_keys(&self) -> Vec<String> {
        self.to_record()
            .keys()
            .filter(|k| !k.contains("data"))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_and_schema() {
        let mut state = StateSnapshot {
            step: 4,
            location: Vector3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        state.indexes.insert(SensorKind::Depth, vec![4]);
        state.indexes.insert(SensorKind::Rgb, vec![4]);
        state.data.insert(SensorKind::Rgb, vec![SensorFrame::blank(2, 2)]);

        let record = state.to_record();
        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "step",
                "rgb_indexes",
                "rgb_data",
                "depth_indexes",
                "collisions",
                "state_steer",
                "state_gas_brake",
                "velocity",
                "velocity_vec",
                "yaw",
                "location",
                "distance_2finish"
            ]
        );
        assert_eq!(record.get_array1("location").unwrap(), vec![1.0, 2.0, 3.0]);

        let schema = state.schema_keys();
        assert_eq!(schema.len(), keys.len() - 1);
        assert!(schema.iter().all(|k| !k.ends_with("_data")));
    }
}
