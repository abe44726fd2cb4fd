//! Store adapters: the flat key-value store the bindings sit on.
//!
//! A store holds named cells of a handful of native types (string, i32,
//! i64, f32, bool, string set). Reads are synchronous; writes go through a
//! batched [`StoreEdit`] that is flushed either in the background
//! ([`StoreEdit::apply`]) or synchronously ([`StoreEdit::commit`]).

pub mod cells;
pub mod file;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use cells::{CellMap, EditBatch};
pub use file::{FileProvider, FileStore};
pub use memory::{MemoryProvider, MemoryStore};


/// A single native cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    String(String),
    Int(i32),
    Long(i64),
    #[serde(with = "float_cell")]
    Float(f32),
    Boolean(bool),
    StringSet(BTreeSet<String>),
}

impl CellValue {
    /// Short native type tag, used in error messages and tooling output.
    pub fn kind(&self) -> &'static str {
        match self {
            CellValue::String(_) => "string",
            CellValue::Int(_) => "int",
            CellValue::Long(_) => "long",
            CellValue::Float(_) => "float",
            CellValue::Boolean(_) => "boolean",
            CellValue::StringSet(_) => "string_set",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Long(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Boolean(v) => write!(f, "{}", v),
            CellValue::StringSet(set) => {
                let items: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}


/// JSON has no literal for non-finite numbers, so NaN and the infinities
/// are written as the strings `"NaN"`, `"inf"` and `"-inf"`.
mod float_cell {
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;
    use serde::Deserialize;

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f32(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f32),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f32::NAN),
                "inf" => Ok(f32::INFINITY),
                "-inf" => Ok(f32::NEG_INFINITY),
                other => Err(de::Error::custom(format!("invalid float cell {:?}", other))),
            },
        }
    }
}


/// How a store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Only the current user may read the persisted data.
    #[default]
    Private,
    /// Persisted data is readable by other users.
    Shared,
}


/// Synchronous read access to one opened store plus the edit factory.
///
/// Getters take the value to return when the cell is absent. A cell that
/// exists with a different native type yields [`StoreError::TypeMismatch`].
pub trait PreferenceStore: Send + Sync + fmt::Debug {
    /// The name the store was opened under.
    fn name(&self) -> &str;

    fn get_string(&self, key: &str, default: Option<String>) -> Result<Option<String>, StoreError>;
    fn get_i32(&self, key: &str, default: i32) -> Result<i32, StoreError>;
    fn get_i64(&self, key: &str, default: i64) -> Result<i64, StoreError>;
    fn get_f32(&self, key: &str, default: f32) -> Result<f32, StoreError>;
    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError>;
    fn get_string_set(
        &self,
        key: &str,
        default: Option<BTreeSet<String>>,
    ) -> Result<Option<BTreeSet<String>>, StoreError>;

    /// The native cell under `key`, whatever its type.
    fn get_cell(&self, key: &str) -> Option<CellValue>;

    /// True if a cell of any type exists under `key`.
    fn contains(&self, key: &str) -> bool;

    /// Copy of every cell, keyed by name.
    fn snapshot(&self) -> BTreeMap<String, CellValue>;

    /// Begin a batched edit. Nothing is visible until the edit is flushed.
    fn edit(&self) -> Box<dyn StoreEdit + '_>;
}


/// A batched set of writes against one store.
///
/// Adapters implement [`stage`](StoreEdit::stage) and the two flushes; the
/// typed `put_*` helpers are provided.
pub trait StoreEdit {
    /// Record a write (`Some`) or a removal (`None`) of one cell.
    fn stage(&mut self, key: &str, value: Option<CellValue>);

    /// Make the edit visible now and persist it on the store's own
    /// schedule. No completion signal.
    fn apply(self: Box<Self>);

    /// Make the edit visible and block until it is persisted. Returns
    /// `false` when persistence failed.
    fn commit(self: Box<Self>) -> bool;

    fn put_string(&mut self, key: &str, value: String) {
        self.stage(key, Some(CellValue::String(value)));
    }

    fn put_i32(&mut self, key: &str, value: i32) {
        self.stage(key, Some(CellValue::Int(value)));
    }

    fn put_i64(&mut self, key: &str, value: i64) {
        self.stage(key, Some(CellValue::Long(value)));
    }

    fn put_f32(&mut self, key: &str, value: f32) {
        self.stage(key, Some(CellValue::Float(value)));
    }

    fn put_bool(&mut self, key: &str, value: bool) {
        self.stage(key, Some(CellValue::Boolean(value)));
    }

    fn put_string_set(&mut self, key: &str, value: BTreeSet<String>) {
        self.stage(key, Some(CellValue::StringSet(value)));
    }

    fn remove(&mut self, key: &str) {
        self.stage(key, None);
    }
}


/// Opens stores by name. Opening the same name twice through one provider
/// returns a handle over the same cells.
pub trait StoreProvider: Send + Sync + fmt::Debug {
    fn open(&self, name: &str, mode: AccessMode) -> Result<Arc<dyn PreferenceStore>, StoreError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_value_json_is_adjacently_tagged() {
        let json = serde_json::to_string(&CellValue::Int(7)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":7}"#);
        let back: CellValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellValue::Int(7));
    }

    #[test]
    fn cell_value_display() {
        let set: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(CellValue::StringSet(set).to_string(), "[a, b]");
        assert_eq!(CellValue::Boolean(true).to_string(), "true");
        assert_eq!(CellValue::Float(1.5).kind(), "float");
    }

    #[test]
    fn non_finite_floats_survive_json() {
        for (value, text) in [
            (f32::INFINITY, r#"{"type":"float","value":"inf"}"#),
            (f32::NEG_INFINITY, r#"{"type":"float","value":"-inf"}"#),
        ] {
            let json = serde_json::to_string(&CellValue::Float(value)).unwrap();
            assert_eq!(json, text);
            let back: CellValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, CellValue::Float(value));
        }

        let json = serde_json::to_string(&CellValue::Float(f32::NAN)).unwrap();
        assert_eq!(json, r#"{"type":"float","value":"NaN"}"#);
        match serde_json::from_str::<CellValue>(&json).unwrap() {
            CellValue::Float(v) => assert!(v.is_nan()),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn finite_floats_stay_numbers() {
        let json = serde_json::to_string(&CellValue::Float(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"float","value":1.5}"#);
        assert!(serde_json::from_str::<CellValue>(r#"{"type":"float","value":"lots"}"#).is_err());
    }

    #[test]
    fn access_mode_defaults_to_private() {
        assert_eq!(AccessMode::default(), AccessMode::Private);
    }
}
