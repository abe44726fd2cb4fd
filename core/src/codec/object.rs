//! Object codecs: turn structured values into the text kept in a string
//! cell, and decide which Rust types may be bound as object cells.

use std::fmt;

use serde_json::Value;


/// Text encoding for object cells.
///
/// Values pass through `serde_json::Value` so any `Serialize` type can be
/// stored regardless of the text format.
pub trait ObjectCodec: Send + Sync + fmt::Debug {
    /// Short format name, e.g. `json`.
    fn format(&self) -> &'static str;

    fn encode(&self, value: &Value) -> Result<String, String>;

    fn decode(&self, text: &str) -> Result<Value, String>;

    /// Text stored when a nullable object cell is set to null.
    fn null_text(&self) -> String;

    /// Whether values of `type_name` can be stored and decoded again after
    /// a restart. See [`is_nominal_type_name`].
    fn is_nominally_identifiable(&self, type_name: &str) -> bool {
        is_nominal_type_name(type_name)
    }
}


/// Rejects type names without a stable nominal identity: tuples, arrays,
/// slices, references, raw pointers, function pointers, closures, trait
/// objects, `impl` types, and bare `serde_json::Value`.
///
/// Types declared inside a function body carry an ordinary path in
/// `std::any::type_name` and cannot be told apart from module-level types.
pub fn is_nominal_type_name(type_name: &str) -> bool {
    if type_name.is_empty() || type_name == std::any::type_name::<Value>() {
        return false;
    }
    const ANONYMOUS_MARKERS: [&str; 7] = ["(", "[", "&", "*", "{{", "dyn ", "impl "];
    !ANONYMOUS_MARKERS.iter().any(|m| type_name.contains(m))
}


/// Object cells as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn format(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<String, String> {
        serde_json::to_string(value).map_err(|e| e.to_string())
    }

    fn decode(&self, text: &str) -> Result<Value, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    fn null_text(&self) -> String {
        "null".into()
    }
}


/// Object cells as YAML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl ObjectCodec for YamlCodec {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn encode(&self, value: &Value) -> Result<String, String> {
        serde_yaml::to_string(value).map_err(|e| e.to_string())
    }

    fn decode(&self, text: &str) -> Result<Value, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    fn null_text(&self) -> String {
        "null\n".into()
    }
}
