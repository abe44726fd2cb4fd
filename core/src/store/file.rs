//! File-backed store adapter.
//!
//! Each store lives in `<dir>/<name>.json`. The whole file is loaded on
//! open and rewritten on every flush using an atomic write (temp file in
//! the same directory, then rename). `apply` hands a snapshot to the
//! store's background writer thread; `commit` writes on the caller's
//! thread. Every flush carries a generation number and older generations
//! are never written over newer ones.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::StoreError;

use super::{AccessMode, CellMap, CellValue, EditBatch, PreferenceStore, StoreEdit, StoreProvider};

const FORMAT_VERSION: u32 = 1;


/// On-disk layout of one store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    cells: BTreeMap<String, CellValue>,
}


#[derive(Debug)]
struct Snapshot {
    generation: u64,
    cells: CellMap,
}


#[derive(Debug, Default)]
struct Queue {
    next: Option<Snapshot>,
    busy: bool,
    shutdown: bool,
}


/// Owns the store file and the writer thread's queue.
#[derive(Debug)]
struct Persister {
    path: PathBuf,
    mode: AccessMode,
    /// Last generation written to disk.
    persisted: Mutex<u64>,
    queue: Mutex<Queue>,
    wake: Condvar,
}

impl Persister {
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut persisted = self.persisted.lock();
        if snapshot.generation <= *persisted {
            return Ok(());
        }
        write_store_file(&self.path, self.mode, &snapshot.cells)?;
        *persisted = snapshot.generation;
        Ok(())
    }

    fn enqueue(&self, snapshot: Snapshot) {
        let mut queue = self.queue.lock();
        // Only the newest pending snapshot matters.
        let stale = matches!(&queue.next, Some(pending) if pending.generation >= snapshot.generation);
        if !stale {
            queue.next = Some(snapshot);
        }
        self.wake.notify_all();
    }

    fn run(&self) {
        loop {
            let snapshot = {
                let mut queue = self.queue.lock();
                loop {
                    if let Some(s) = queue.next.take() {
                        queue.busy = true;
                        break s;
                    }
                    if queue.shutdown {
                        return;
                    }
                    self.wake.wait(&mut queue);
                }
            };

            if let Err(e) = self.persist(&snapshot) {
                error!(path = %self.path.display(), error = %e, "background store write failed");
            }

            let mut queue = self.queue.lock();
            queue.busy = false;
            self.wake.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut queue = self.queue.lock();
        while queue.next.is_some() || queue.busy {
            self.wake.wait(&mut queue);
        }
    }

    fn shutdown(&self) {
        let mut queue = self.queue.lock();
        queue.shutdown = true;
        self.wake.notify_all();
    }
}


#[derive(Debug)]
struct Cells {
    map: CellMap,
    generation: u64,
}


/// A store persisted as one JSON file.
#[derive(Debug)]
pub struct FileStore {
    name: String,
    cells: RwLock<Cells>,
    persister: Arc<Persister>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing cells.
    pub fn open(name: &str, path: PathBuf, mode: AccessMode) -> Result<Self, StoreError> {
        let map = read_store_file(&path)?;
        debug!(store = name, path = %path.display(), cells = map.len(), "opened file store");

        let persister = Arc::new(Persister {
            path,
            mode,
            persisted: Mutex::new(0),
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&persister);
        let handle = thread::Builder::new()
            .name(format!("prefcell-{}", name))
            .spawn(move || worker.run())?;

        Ok(FileStore {
            name: name.to_string(),
            cells: RwLock::new(Cells { map, generation: 0 }),
            persister,
            writer: Mutex::new(Some(handle)),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.persister.path
    }

    /// Block until every applied edit has reached the disk.
    pub fn sync_pending(&self) {
        self.persister.wait_idle();
    }

    fn stage_snapshot(&self, batch: EditBatch) -> Snapshot {
        let mut cells = self.cells.write();
        cells.map.apply_batch(batch);
        cells.generation += 1;
        Snapshot {
            generation: cells.generation,
            cells: cells.map.clone(),
        }
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.persister.shutdown();
        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                error!(store = %self.name, "store writer thread panicked");
            }
        }
    }
}

impl PreferenceStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_string(&self, key: &str, default: Option<String>) -> Result<Option<String>, StoreError> {
        self.cells.read().map.get_string(key, default)
    }

    fn get_i32(&self, key: &str, default: i32) -> Result<i32, StoreError> {
        self.cells.read().map.get_i32(key, default)
    }

    fn get_i64(&self, key: &str, default: i64) -> Result<i64, StoreError> {
        self.cells.read().map.get_i64(key, default)
    }

    fn get_f32(&self, key: &str, default: f32) -> Result<f32, StoreError> {
        self.cells.read().map.get_f32(key, default)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.cells.read().map.get_bool(key, default)
    }

    fn get_string_set(
        &self,
        key: &str,
        default: Option<BTreeSet<String>>,
    ) -> Result<Option<BTreeSet<String>>, StoreError> {
        self.cells.read().map.get_string_set(key, default)
    }

    fn get_cell(&self, key: &str) -> Option<CellValue> {
        self.cells.read().map.get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.cells.read().map.contains(key)
    }

    fn snapshot(&self) -> BTreeMap<String, CellValue> {
        self.cells.read().map.cells().clone()
    }

    fn edit(&self) -> Box<dyn StoreEdit + '_> {
        Box::new(FileEdit {
            store: self,
            batch: EditBatch::new(),
        })
    }
}


struct FileEdit<'a> {
    store: &'a FileStore,
    batch: EditBatch,
}

impl StoreEdit for FileEdit<'_> {
    fn stage(&mut self, key: &str, value: Option<CellValue>) {
        self.batch.stage(key, value);
    }

    fn apply(self: Box<Self>) {
        let FileEdit { store, batch } = *self;
        let snapshot = store.stage_snapshot(batch);
        store.persister.enqueue(snapshot);
    }

    fn commit(self: Box<Self>) -> bool {
        let FileEdit { store, batch } = *self;
        let snapshot = store.stage_snapshot(batch);
        match store.persister.persist(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!(store = %store.name, error = %e, "store commit failed");
                false
            }
        }
    }
}


/// Opens [`FileStore`]s under one directory, cached by name.
#[derive(Debug)]
pub struct FileProvider {
    dir: PathBuf,
    stores: Mutex<HashMap<String, Arc<FileStore>>>,
}

impl FileProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileProvider {
            dir: dir.into(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a store name.
    ///
    /// Names must be non-empty and must not contain path separators.
    pub fn store_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    /// Open (or reuse) the concrete store for `name`.
    pub fn open_file(&self, name: &str, mode: AccessMode) -> Result<Arc<FileStore>, StoreError> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(name) {
            return Ok(Arc::clone(store));
        }
        let path = self.store_path(name)?;
        let store = Arc::new(FileStore::open(name, path, mode)?);
        stores.insert(name.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

impl StoreProvider for FileProvider {
    fn open(&self, name: &str, mode: AccessMode) -> Result<Arc<dyn PreferenceStore>, StoreError> {
        Ok(self.open_file(name, mode)?)
    }
}


fn read_store_file(path: &Path) -> Result<CellMap, StoreError> {
    if !path.exists() {
        return Ok(CellMap::new());
    }
    let contents = fs::read_to_string(path)?;
    let file: StoreFile = serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if file.version != FORMAT_VERSION {
        return Err(StoreError::Corrupt {
            path: path.display().to_string(),
            reason: format!("unsupported format version {}", file.version),
        });
    }
    Ok(CellMap::from_cells(file.cells))
}


/// Write to a temp file in the same directory, then rename over `path`.
fn write_store_file(path: &Path, mode: AccessMode, cells: &CellMap) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::InvalidName(path.display().to_string()))?;
    fs::create_dir_all(parent)?;

    let file = StoreFile {
        version: FORMAT_VERSION,
        cells: cells.cells().clone(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(|e| StoreError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{}.tmp", file_name));
    fs::write(&tmp_path, &json)?;
    set_mode(&tmp_path, mode)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}


#[cfg(unix)]
fn set_mode(path: &Path, mode: AccessMode) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let bits = match mode {
        AccessMode::Private => 0o600,
        AccessMode::Shared => 0o644,
    };
    fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: AccessMode) -> Result<(), StoreError> {
    Ok(())
}
