//! Process-local in-memory store adapter.
//!
//! Nothing is written to disk; `apply` and `commit` both update the cells
//! before returning. Useful for tests and for hosts that persist elsewhere.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::StoreError;

use super::{AccessMode, CellMap, CellValue, EditBatch, PreferenceStore, StoreEdit, StoreProvider};


/// An in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    cells: RwLock<CellMap>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        MemoryStore {
            name: name.to_string(),
            cells: RwLock::new(CellMap::new()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make subsequent commits report failure. The edit still becomes
    /// visible, mirroring a store whose disk write failed.
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn flush(&self, batch: EditBatch) {
        self.cells.write().apply_batch(batch);
    }
}

impl PreferenceStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_string(&self, key: &str, default: Option<String>) -> Result<Option<String>, StoreError> {
        self.cells.read().get_string(key, default)
    }

    fn get_i32(&self, key: &str, default: i32) -> Result<i32, StoreError> {
        self.cells.read().get_i32(key, default)
    }

    fn get_i64(&self, key: &str, default: i64) -> Result<i64, StoreError> {
        self.cells.read().get_i64(key, default)
    }

    fn get_f32(&self, key: &str, default: f32) -> Result<f32, StoreError> {
        self.cells.read().get_f32(key, default)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.cells.read().get_bool(key, default)
    }

    fn get_string_set(
        &self,
        key: &str,
        default: Option<BTreeSet<String>>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        self.cells.read().get_string_set(key, default)
    }

    fn get_cell(&self, key: &str) -> Option<CellValue> {
        self.cells.read().get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.cells.read().contains(key)
    }

    fn snapshot(&self) -> BTreeMap<String, CellValue> {
        self.cells.read().cells().clone()
    }

    fn edit(&self) -> Box<dyn StoreEdit + '_> {
        Box::new(MemoryEdit {
            store: self,
            batch: EditBatch::new(),
        })
    }
}


struct MemoryEdit<'a> {
    store: &'a MemoryStore,
    batch: EditBatch,
}

impl StoreEdit for MemoryEdit<'_> {
    fn stage(&mut self, key: &str, value: Option<CellValue>) {
        self.batch.stage(key, value);
    }

    fn apply(self: Box<Self>) {
        let MemoryEdit { store, batch } = *self;
        store.flush(batch);
    }

    fn commit(self: Box<Self>) -> bool {
        let MemoryEdit { store, batch } = *self;
        store.flush(batch);
        !store.fail_commits.load(Ordering::SeqCst)
    }
}


/// Hands out [`MemoryStore`]s cached by name.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide provider.
    pub fn global() -> &'static MemoryProvider {
        static GLOBAL: OnceLock<MemoryProvider> = OnceLock::new();
        GLOBAL.get_or_init(MemoryProvider::new)
    }

    /// Open (or reuse) the concrete store for `name`.
    pub fn open_memory(&self, name: &str) -> Arc<MemoryStore> {
        let mut stores = self.stores.lock();
        stores
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(store = name, "opening memory store");
                Arc::new(MemoryStore::new(name))
            })
            .clone()
    }
}

impl StoreProvider for MemoryProvider {
    fn open(&self, name: &str, _mode: AccessMode) -> Result<Arc<dyn PreferenceStore>, StoreError> {
        Ok(self.open_memory(name))
    }
}
