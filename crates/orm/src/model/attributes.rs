//! Attribute storage with dirty tracking
//!
//! An entity keeps two maps: the current values and the values last synced
//! with storage. An attribute is dirty when the two disagree.

use std::collections::HashMap;

use crate::backends::DatabaseValue;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    current: HashMap<String, DatabaseValue>,
    original: HashMap<String, DatabaseValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes loaded from storage: current and original start equal
    pub fn from_synced(values: HashMap<String, DatabaseValue>) -> Self {
        Self {
            original: values.clone(),
            current: values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        self.current.get(name)
    }

    pub fn get_original(&self, name: &str) -> Option<&DatabaseValue> {
        self.original.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<DatabaseValue>) {
        self.current.insert(name.to_string(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.current.contains_key(name)
    }

    /// Whether `name` differs from its original value
    pub fn is_dirty(&self, name: &str) -> bool {
        self.current.get(name) != self.original.get(name)
    }

    /// Attributes whose current value differs from the original
    pub fn dirty(&self) -> HashMap<&str, &DatabaseValue> {
        self.current
            .iter()
            .filter(|(name, value)| self.original.get(name.as_str()) != Some(*value))
            .map(|(name, value)| (name.as_str(), value))
            .collect()
    }

    /// Mark a single attribute clean by copying its current value to the original
    pub fn sync_original_attribute(&mut self, name: &str) {
        match self.current.get(name) {
            Some(value) => {
                self.original.insert(name.to_string(), value.clone());
            }
            None => {
                self.original.remove(name);
            }
        }
    }

    /// Mark every attribute clean
    pub fn sync_original(&mut self) {
        self.original = self.current.clone();
    }

    /// Replace both maps with freshly stored values
    pub fn replace_synced(&mut self, values: HashMap<String, DatabaseValue>) {
        *self = Self::from_synced(values);
    }

    /// Current values
    pub fn current(&self) -> &HashMap<String, DatabaseValue> {
        &self.current
    }

    /// Snapshot as a JSON object of current values
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.current
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}
