//! Command handlers for the `prefcell` binary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::ValueEnum;
use prefcell_core::config;
use prefcell_core::{PrefContainer, PrefsConfig, SaveMode};
use tracing::{debug, info};


/// Cell type used by `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    String,
    Int,
    Long,
    Float,
    Bool,
    /// RFC 3339 text or epoch milliseconds.
    Timestamp,
}


/// Load the config file if given, then apply command-line overrides.
pub fn resolve_config(path: Option<&Path>, dir: Option<PathBuf>, commit: bool) -> Result<PrefsConfig> {
    let mut config = match path {
        Some(path) => config::load(path).map_err(anyhow::Error::msg)?,
        None => PrefsConfig::default(),
    };
    if let Some(dir) = dir {
        config.store_dir = dir;
    }
    if commit {
        config.save_mode = SaveMode::Commit;
    }
    debug!(?config, "resolved configuration");
    Ok(config)
}


pub fn open(config: &PrefsConfig, store: &str) -> Result<PrefContainer> {
    let provider = config.provider();
    let prefs = PrefContainer::open(provider.as_ref(), store, config.save_mode)
        .with_context(|| format!("cannot open store '{}'", store))?;
    Ok(prefs.with_object_codec(config.object_codec()))
}


/// Raw native cell as `<type>: <value>`.
pub fn get(prefs: &PrefContainer, cell: &str) -> Result<String> {
    match prefs.store().get_cell(cell) {
        Some(value) => Ok(format!("{}: {}", value.kind(), value)),
        None => bail!("cell '{}' is not set in '{}'", cell, prefs.name()),
    }
}


pub fn set(prefs: &PrefContainer, cell: &str, value: &str, kind: Kind) -> Result<()> {
    let bad = || format!("'{}' is not a valid {:?} value", value, kind);
    // Writes go to the native cell for the kind; the binding default is never read.
    match kind {
        Kind::String => prefs.string(cell, "").set(value.to_string())?,
        Kind::Int => prefs.int(cell, 0).set(value.parse::<i32>().with_context(bad)?)?,
        Kind::Long => prefs.long(cell, 0).set(value.parse::<i64>().with_context(bad)?)?,
        Kind::Float => prefs.float(cell, 0.0).set(value.parse::<f32>().with_context(bad)?)?,
        Kind::Bool => prefs.boolean(cell, false).set(value.parse::<bool>().with_context(bad)?)?,
        Kind::Timestamp => {
            let at = parse_timestamp(value).with_context(bad)?;
            prefs.timestamp(cell, at).set(at)?
        }
    }
    info!(store = prefs.name(), cell, ?kind, "cell written");
    Ok(())
}


pub fn remove(prefs: &PrefContainer, cell: &str) -> Result<()> {
    prefs.nullable_string(cell).remove()?;
    info!(store = prefs.name(), cell, "cell removed");
    Ok(())
}


/// Every cell of the store as pretty JSON.
pub fn dump(prefs: &PrefContainer) -> Result<String> {
    let cells = prefs.store().snapshot();
    Ok(serde_json::to_string_pretty(&cells)?)
}


fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(ms) = text.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .context("timestamp out of range");
    }
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}
