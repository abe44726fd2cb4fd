//! Preference containers: one opened store plus its save mode.
//!
//! Settings types hold a [`PrefContainer`] and build their accessors from
//! it once:
//!
//! ```rust
//! use prefcell_core::{MemoryProvider, Pref, PrefContainer, SaveMode};
//!
//! struct Settings {
//!     retries: Pref<i32>,
//!     flag: Pref<Option<bool>>,
//! }
//!
//! impl Settings {
//!     fn open(provider: &MemoryProvider) -> prefcell_core::Result<Self> {
//!         let prefs = PrefContainer::open(provider, "settings", SaveMode::Apply)?;
//!         Ok(Settings {
//!             retries: prefs.int("retries", 3),
//!             flag: prefs.nullable_boolean("flag"),
//!         })
//!     }
//! }
//!
//! let settings = Settings::open(&MemoryProvider::new()).unwrap();
//! assert_eq!(settings.retries.get().unwrap(), 3);
//! settings.retries.set(7).unwrap();
//! assert_eq!(settings.retries.get().unwrap(), 7);
//! assert_eq!(settings.flag.get().unwrap(), None);
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::binding::{Pref, Property};
use crate::codec::{JsonCodec, ObjectCodec};
use crate::error::{PrefError, Result};
use crate::map::PrefMap;
use crate::store::{AccessMode, PreferenceStore, StoreEdit, StoreProvider};


/// How writes are flushed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Visible immediately, persisted in the background, no completion signal.
    #[default]
    Apply,
    /// Blocks until persisted; a failed flush is returned as
    /// [`PrefError::CommitFailed`].
    Commit,
}


#[derive(Debug)]
struct ContainerInner {
    name: String,
    save_mode: SaveMode,
    store: Arc<dyn PreferenceStore>,
    objects: Arc<dyn ObjectCodec>,
}


/// The store handle and save mode shared by every binding of one settings
/// namespace. Cloning is cheap and yields a handle to the same container.
#[derive(Debug, Clone)]
pub struct PrefContainer {
    inner: Arc<ContainerInner>,
}

impl PrefContainer {
    /// Open the store `name` privately through `provider`.
    pub fn open(provider: &dyn StoreProvider, name: &str, save_mode: SaveMode) -> Result<Self> {
        let store = provider.open(name, AccessMode::Private)?;
        debug!(container = name, ?save_mode, "opened preference container");
        Ok(Self::from_store(store, save_mode))
    }

    /// Wrap an already opened store.
    pub fn from_store(store: Arc<dyn PreferenceStore>, save_mode: SaveMode) -> Self {
        PrefContainer {
            inner: Arc::new(ContainerInner {
                name: store.name().to_string(),
                save_mode,
                store,
                objects: Arc::new(JsonCodec),
            }),
        }
    }

    /// Replace the object codec used by object cells.
    pub fn with_object_codec(self, objects: Arc<dyn ObjectCodec>) -> Self {
        PrefContainer {
            inner: Arc::new(ContainerInner {
                name: self.inner.name.clone(),
                save_mode: self.inner.save_mode,
                store: Arc::clone(&self.inner.store),
                objects,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn save_mode(&self) -> SaveMode {
        self.inner.save_mode
    }

    pub fn store(&self) -> &dyn PreferenceStore {
        self.inner.store.as_ref()
    }

    pub fn object_codec(&self) -> &dyn ObjectCodec {
        self.inner.objects.as_ref()
    }

    /// Flush `edit` per the save mode. `cell` names the written cell for
    /// error reporting.
    pub(crate) fn flush(&self, edit: Box<dyn StoreEdit + '_>, cell: &str) -> Result<()> {
        match self.inner.save_mode {
            SaveMode::Apply => {
                edit.apply();
                Ok(())
            }
            SaveMode::Commit => {
                if edit.commit() {
                    Ok(())
                } else {
                    warn!(container = %self.inner.name, cell, "commit reported failure");
                    Err(PrefError::CommitFailed {
                        container: self.inner.name.clone(),
                        cell: cell.to_string(),
                    })
                }
            }
        }
    }

    /// Bind a descriptor to this container.
    pub fn bind<T>(&self, property: Property<T>) -> Pref<T> {
        Pref::new(self.clone(), property)
    }

    /// Bind a descriptor as a family of cells addressed by secondary key.
    pub fn map<T>(&self, element: Property<T>) -> PrefMap<T> {
        PrefMap::new(self.clone(), element)
    }

    pub fn string(&self, name: &str, default: &str) -> Pref<String> {
        self.bind(Property::string(name, default))
    }

    pub fn nullable_string(&self, name: &str) -> Pref<Option<String>> {
        self.bind(Property::nullable_string(name))
    }

    pub fn int(&self, name: &str, default: i32) -> Pref<i32> {
        self.bind(Property::int(name, default))
    }

    pub fn nullable_int(&self, name: &str) -> Pref<Option<i32>> {
        self.bind(Property::nullable_int(name))
    }

    pub fn long(&self, name: &str, default: i64) -> Pref<i64> {
        self.bind(Property::long(name, default))
    }

    pub fn nullable_long(&self, name: &str) -> Pref<Option<i64>> {
        self.bind(Property::nullable_long(name))
    }

    pub fn float(&self, name: &str, default: f32) -> Pref<f32> {
        self.bind(Property::float(name, default))
    }

    pub fn nullable_float(&self, name: &str) -> Pref<Option<f32>> {
        self.bind(Property::nullable_float(name))
    }

    pub fn boolean(&self, name: &str, default: bool) -> Pref<bool> {
        self.bind(Property::boolean(name, default))
    }

    pub fn nullable_boolean(&self, name: &str) -> Pref<Option<bool>> {
        self.bind(Property::nullable_boolean(name))
    }

    pub fn string_set(&self, name: &str, default: BTreeSet<String>) -> Pref<BTreeSet<String>> {
        self.bind(Property::string_set(name, default))
    }

    pub fn timestamp(&self, name: &str, default: DateTime<Utc>) -> Pref<DateTime<Utc>> {
        self.bind(Property::timestamp(name, default))
    }

    pub fn nullable_timestamp(&self, name: &str) -> Pref<Option<DateTime<Utc>>> {
        self.bind(Property::nullable_timestamp(name))
    }

    /// Object cell. Fails with [`PrefError::AnonymousTypeBinding`] if this
    /// container's object codec cannot identify `T`.
    pub fn object<T>(&self, name: &str, default: T) -> Result<Pref<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let property = Property::object_for(self.object_codec(), name, default)?;
        Ok(self.bind(property))
    }

    pub fn nullable_object<T>(&self, name: &str) -> Result<Pref<Option<T>>>
    where
        T: Serialize + DeserializeOwned,
    {
        let property = Property::nullable_object_for(self.object_codec(), name)?;
        Ok(self.bind(property))
    }
}
