//! prefcell: typed preference cells over a flat key-value store.
//!
//! Settings are declared as typed accessors on a [`PrefContainer`] instead
//! of raw string keys. Each accessor maps to one cell of the underlying
//! store through a [`CellCodec`]; a [`PrefMap`] maps one declaration to a
//! family of cells addressed by a secondary key. Writes flush according to
//! the container's [`SaveMode`].
//!
//! Store adapters live in [`store`]: [`MemoryProvider`] for in-process
//! stores and [`FileProvider`] for one JSON file per store.

pub mod binding;
pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod map;
pub mod store;

pub use binding::{Pref, Property};
pub use codec::{CellCodec, JsonCodec, ObjectCodec, TypedValue, YamlCodec};
pub use config::PrefsConfig;
pub use container::{PrefContainer, SaveMode};
pub use error::{PrefError, Result, StoreError};
pub use map::PrefMap;
pub use store::{
    AccessMode, CellValue, FileProvider, FileStore, MemoryProvider, MemoryStore, PreferenceStore,
    StoreEdit, StoreProvider,
};
