//! In-memory cell map and batched edits shared by the bundled adapters.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::StoreError;

use super::CellValue;


/// All cells of one store, keyed by cell name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellMap {
    data: BTreeMap<String, CellValue>,
}

impl CellMap {
    /// Create an empty map.
    pub fn new() -> Self {
        CellMap {
            data: BTreeMap::new(),
        }
    }

    /// Build a map from previously persisted cells.
    pub fn from_cells(data: BTreeMap<String, CellValue>) -> Self {
        CellMap { data }
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn cells(&self) -> &BTreeMap<String, CellValue> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_string(&self, key: &str, default: Option<String>) -> Result<Option<String>, StoreError> {
        match self.data.get(key) {
            None => Ok(default),
            Some(CellValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(mismatch(key, "string", other)),
        }
    }

    pub fn get_i32(&self, key: &str, default: i32) -> Result<i32, StoreError> {
        match self.data.get(key) {
            None => Ok(default),
            Some(CellValue::Int(v)) => Ok(*v),
            Some(other) => Err(mismatch(key, "int", other)),
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64, StoreError> {
        match self.data.get(key) {
            None => Ok(default),
            Some(CellValue::Long(v)) => Ok(*v),
            Some(other) => Err(mismatch(key, "long", other)),
        }
    }

    pub fn get_f32(&self, key: &str, default: f32) -> Result<f32, StoreError> {
        match self.data.get(key) {
            None => Ok(default),
            Some(CellValue::Float(v)) => Ok(*v),
            Some(other) => Err(mismatch(key, "float", other)),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        match self.data.get(key) {
            None => Ok(default),
            Some(CellValue::Boolean(v)) => Ok(*v),
            Some(other) => Err(mismatch(key, "boolean", other)),
        }
    }

    pub fn get_string_set(
        &self,
        key: &str,
        default: Option<BTreeSet<String>>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        match self.data.get(key) {
            None => Ok(default),
            Some(CellValue::StringSet(set)) => Ok(Some(set.clone())),
            Some(other) => Err(mismatch(key, "string_set", other)),
        }
    }

    /// Apply every staged operation of `batch` in order.
    pub fn apply_batch(&mut self, batch: EditBatch) {
        for (key, value) in batch.ops {
            match value {
                Some(v) => {
                    self.data.insert(key, v);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }
}


fn mismatch(key: &str, expected: &'static str, found: &CellValue) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}


/// Ordered list of staged writes (`Some`) and removals (`None`).
#[derive(Debug, Clone, Default)]
pub struct EditBatch {
    ops: Vec<(String, Option<CellValue>)>,
}

impl EditBatch {
    pub fn new() -> Self {
        EditBatch { ops: Vec::new() }
    }

    pub fn stage(&mut self, key: &str, value: Option<CellValue>) {
        self.ops.push((key.to_string(), value));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_cells_return_default() {
        let cells = CellMap::new();
        assert_eq!(cells.get_i32("n", 3).unwrap(), 3);
        assert_eq!(cells.get_string("s", None).unwrap(), None);
        assert_eq!(cells.get_string("s", Some("d".into())).unwrap(), Some("d".into()));
        assert!(!cells.get_bool("b", false).unwrap());
    }

    #[test]
    fn batch_applies_in_order() {
        let mut cells = CellMap::new();
        let mut batch = EditBatch::new();
        batch.stage("k", Some(CellValue::Int(1)));
        batch.stage("k", Some(CellValue::Int(2)));
        batch.stage("gone", Some(CellValue::Boolean(true)));
        batch.stage("gone", None);
        assert_eq!(batch.len(), 4);
        cells.apply_batch(batch);

        assert_eq!(cells.get_i32("k", 0).unwrap(), 2);
        assert!(!cells.contains("gone"));
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn wrong_native_type_is_reported() {
        let mut cells = CellMap::new();
        let mut batch = EditBatch::new();
        batch.stage("k", Some(CellValue::String("x".into())));
        cells.apply_batch(batch);

        match cells.get_i64("k", 0) {
            Err(StoreError::TypeMismatch { key, expected, found }) => {
                assert_eq!(key, "k");
                assert_eq!(expected, "long");
                assert_eq!(found, "string");
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }
}
