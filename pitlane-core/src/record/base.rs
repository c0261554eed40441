//! Base implementation of records.
use crate::{error::PitlaneError, sensor::SensorFrame};
use indexmap::{
    map::Keys,
    IndexMap,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value.
    Scalar(f64),

    /// A 1-dimensional array of floating-point values, such as a location.
    Array1(Vec<f64>),

    /// A list of indices, such as the data indices of a sensor.
    Indices(Vec<usize>),

    /// Frames retrieved from a camera sensor.
    Frames(Vec<SensorFrame>),
}

impl RecordValue {
    /// Formats the value as a CSV field.
    ///
    /// Arrays are written as `[a, b, c]`, frames as the list of their
    /// simulation frame numbers.
    pub fn to_field(&self) -> String {
        fn list<T: std::fmt::Debug>(vs: impl Iterator<Item = T>) -> String {
            let items: Vec<String> = vs.map(|v| format!("{:?}", v)).collect();
            format!("[{}]", items.join(", "))
        }

        match self {
            RecordValue::Scalar(v) => format!("{}", v),
            RecordValue::Array1(vs) => list(vs.iter()),
            RecordValue::Indices(vs) => list(vs.iter()),
            RecordValue::Frames(fs) => list(fs.iter().map(|f| f.frame)),
        }
    }
}

/// An ordered container of key-value pairs.
///
/// Keys keep their insertion order, which is the column order of the CSV
/// files written from records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(IndexMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(IndexMap::new())
    }

    /// Creates a record containing a single scalar value.
    ///
    /// # Arguments
    ///
    /// * `name` - The key for the scalar value
    /// * `value` - The scalar value to store
    pub fn from_scalar(name: impl Into<String>, value: f64) -> Self {
        Self(IndexMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs, keeping their order.
    ///
    /// # Arguments
    ///
    /// * `s` - A slice of tuples containing keys and values
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in insertion order.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    ///
    /// A new key is appended at the end. An existing key keeps its position
    /// and gets the new value.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// If both records contain the same key, the value from the second record
    /// will overwrite the value from the first record.
    pub fn merge(mut self, record: Record) -> Self {
        self.merge_inplace(record);
        self
    }

    /// Merges another record into this one in place.
    ///
    /// If both records contain the same key, the value from the second record
    /// will overwrite the value from this record.
    pub fn merge_inplace(&mut self, record: Record) {
        for (k, v) in record.0.into_iter() {
            self.0.insert(k, v);
        }
    }

    /// Gets a 1-dimensional array from the record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key does not exist
    /// - The value is not a 1-dimensional array
    pub fn get_array1(&self, k: &str) -> Result<Vec<f64>, PitlaneError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(PitlaneError::RecordValueTypeError("Array1".to_string())),
            None => Err(PitlaneError::RecordKeyError(k.to_string())),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of key-value pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Formats all values as CSV fields in key order.
    pub fn to_fields(&self) -> Vec<String> {
        self.0.values().map(RecordValue::to_field).collect()
    }

    /// Formats the values of `keys` as CSV fields, in the order of `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`PitlaneError::RecordKeyError`] for the first missing key.
    pub fn fields_for(&self, keys: &[String]) -> Result<Vec<String>, PitlaneError> {
        keys.iter()
            .map(|k| {
                self.0
                    .get(k)
                    .map(RecordValue::to_field)
                    .ok_or_else(|| PitlaneError::RecordKeyError(k.clone()))
            })
            .collect()
    }
}
