//! Configuration for hosts that open containers from a settings file.
//!
//! ```yaml
//! backend: file
//! store_dir: /var/lib/myapp/prefs
//! save_mode: commit
//! object_format: yaml
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::{JsonCodec, ObjectCodec, YamlCodec};
use crate::container::SaveMode;
use crate::store::{FileProvider, MemoryProvider, StoreProvider};


/// Which store adapter backs the containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Memory,
    #[default]
    File,
}


/// Text format for object cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectFormat {
    #[default]
    Json,
    Yaml,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefsConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Directory holding one file per store. Only used by the file backend.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    #[serde(default)]
    pub save_mode: SaveMode,

    #[serde(default)]
    pub object_format: ObjectFormat,
}

impl Default for PrefsConfig {
    fn default() -> Self {
        PrefsConfig {
            backend: Backend::default(),
            store_dir: default_store_dir(),
            save_mode: SaveMode::default(),
            object_format: ObjectFormat::default(),
        }
    }
}

impl PrefsConfig {
    /// Build the configured store provider.
    pub fn provider(&self) -> Arc<dyn StoreProvider> {
        match self.backend {
            Backend::Memory => Arc::new(MemoryProvider::new()),
            Backend::File => Arc::new(FileProvider::new(self.store_dir.clone())),
        }
    }

    /// Build the configured object codec.
    pub fn object_codec(&self) -> Arc<dyn ObjectCodec> {
        match self.object_format {
            ObjectFormat::Json => Arc::new(JsonCodec),
            ObjectFormat::Yaml => Arc::new(YamlCodec),
        }
    }
}


/// `$PREFCELL_DIR`, else `~/.config/prefcell`.
fn default_store_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PREFCELL_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("prefcell")
}


/// Load a config from a YAML file.
pub fn load(path: &Path) -> Result<PrefsConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    parse(&content)
}


/// Parse a config from a YAML string. An empty document yields defaults.
pub fn parse(content: &str) -> Result<PrefsConfig, String> {
    if content.trim().is_empty() {
        return Ok(PrefsConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| format!("invalid prefcell config: {}", e))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::PrefContainer;
    use crate::store::{AccessMode, PreferenceStore};

    #[test]
    fn parse_full_config() {
        let yaml = r#"
backend: memory
store_dir: "/srv/prefs"
save_mode: commit
object_format: yaml
"#;
        let config = parse(yaml).unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.store_dir, PathBuf::from("/srv/prefs"));
        assert_eq!(config.save_mode, SaveMode::Commit);
        assert_eq!(config.object_format, ObjectFormat::Yaml);
        assert_eq!(config.object_codec().format(), "yaml");
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let config = parse("save_mode: commit\n").unwrap();
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.object_format, ObjectFormat::Json);
        assert_eq!(config.store_dir, default_store_dir());
    }

    #[test]
    fn parse_empty_is_default() {
        assert_eq!(parse("").unwrap(), PrefsConfig::default());
    }

    #[test]
    fn parse_rejects_unknown_save_mode() {
        let err = parse("save_mode: eventually\n").unwrap_err();
        assert!(err.contains("invalid prefcell config"));
    }

    #[test]
    fn load_missing_file_errors() {
        let err = load(Path::new("/nonexistent/prefcell.yaml")).unwrap_err();
        assert!(err.contains("cannot read"));
    }

    #[test]
    fn memory_provider_from_config() {
        let config = parse("backend: memory\n").unwrap();
        let provider = config.provider();
        let store = provider.open("x", AccessMode::Private).unwrap();
        assert_eq!(store.name(), "x");

        let prefs = PrefContainer::open(provider.as_ref(), "x", config.save_mode).unwrap();
        prefs.int("n", 0).set(4).unwrap();
        assert_eq!(prefs.int("n", 0).get().unwrap(), 4);
    }

    #[test]
    fn file_provider_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = PrefsConfig {
            store_dir: dir.path().to_path_buf(),
            save_mode: SaveMode::Commit,
            ..PrefsConfig::default()
        };
        let provider = config.provider();
        let prefs = PrefContainer::open(provider.as_ref(), "app", config.save_mode).unwrap();
        prefs.nullable_string("token").set(Some("t".into())).unwrap();
        assert!(dir.path().join("app.json").exists());
    }
}
