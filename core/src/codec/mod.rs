//! Typed cell codec.
//!
//! [`CellCodec`] has one variant per supported logical type. Each variant
//! knows which native cell it uses and how to translate a [`TypedValue`]
//! to and from it:
//!
//! | Variant | Native cell | Absent cell reads as |
//! |---|---|---|
//! | `String`, `Int`, `Long`, `Float`, `Boolean`, `StringSet` | same native type | the default |
//! | `Timestamp` | i64 (ms since epoch) | the default |
//! | `Object` | string (object codec text) | the default |
//! | `NullableString` | string | null |
//! | `NullableInt`, `NullableLong`, `NullableFloat`, `NullableBoolean`, `NullableTimestamp` | string (decimal or `true`/`false` text) | null |
//! | `NullableObject` | string (object codec text) | null |
//!
//! Nullable scalars go through the string cell so that absence of the cell
//! is the null signal; writing null removes the cell. A nullable object
//! written as null stores the object codec's null text instead.
//!
//! String-encoded scalars are parsed strictly at read time. Text that does
//! not match yields [`PrefError::MalformedCell`] rather than a default.

pub mod object;

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::{PrefError, Result};
use crate::store::{PreferenceStore, StoreEdit};

pub use object::{is_nominal_type_name, JsonCodec, ObjectCodec, YamlCodec};


/// A logical value as seen by the binding layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Boolean(bool),
    StringSet(BTreeSet<String>),
    Timestamp(DateTime<Utc>),
    Object(Value),
}

impl TypedValue {
    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::Null => "null",
            TypedValue::String(_) => "string",
            TypedValue::Int(_) => "int",
            TypedValue::Long(_) => "long",
            TypedValue::Float(_) => "float",
            TypedValue::Boolean(_) => "boolean",
            TypedValue::StringSet(_) => "string set",
            TypedValue::Timestamp(_) => "timestamp",
            TypedValue::Object(_) => "object",
        }
    }
}


/// Encoding rule for one bound cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellCodec {
    String { default: String },
    NullableString,
    Int { default: i32 },
    NullableInt,
    Long { default: i64 },
    NullableLong,
    Float { default: f32 },
    NullableFloat,
    Boolean { default: bool },
    NullableBoolean,
    StringSet { default: BTreeSet<String> },
    Timestamp { default: DateTime<Utc> },
    NullableTimestamp,
    Object { type_name: &'static str, default: Value },
    NullableObject { type_name: &'static str },
}

impl CellCodec {
    /// Name of the logical type this variant binds.
    pub fn kind(&self) -> &'static str {
        match self {
            CellCodec::String { .. } => "string",
            CellCodec::NullableString => "nullable string",
            CellCodec::Int { .. } => "int",
            CellCodec::NullableInt => "nullable int",
            CellCodec::Long { .. } => "long",
            CellCodec::NullableLong => "nullable long",
            CellCodec::Float { .. } => "float",
            CellCodec::NullableFloat => "nullable float",
            CellCodec::Boolean { .. } => "boolean",
            CellCodec::NullableBoolean => "nullable boolean",
            CellCodec::StringSet { .. } => "string set",
            CellCodec::Timestamp { .. } => "timestamp",
            CellCodec::NullableTimestamp => "nullable timestamp",
            CellCodec::Object { .. } => "object",
            CellCodec::NullableObject { .. } => "nullable object",
        }
    }

    /// Read the cell `key` from `store`. Performs exactly one store read.
    pub fn decode(
        &self,
        store: &dyn PreferenceStore,
        key: &str,
        objects: &dyn ObjectCodec,
    ) -> Result<TypedValue> {
        let value = match self {
            CellCodec::String { default } => {
                let s = store.get_string(key, Some(default.clone()))?;
                TypedValue::String(s.unwrap_or_else(|| default.clone()))
            }
            CellCodec::NullableString => match store.get_string(key, None)? {
                Some(s) => TypedValue::String(s),
                None => TypedValue::Null,
            },
            CellCodec::Int { default } => TypedValue::Int(store.get_i32(key, *default)?),
            CellCodec::NullableInt => match store.get_string(key, None)? {
                Some(text) => TypedValue::Int(parse_text(key, &text, "decimal i32")?),
                None => TypedValue::Null,
            },
            CellCodec::Long { default } => TypedValue::Long(store.get_i64(key, *default)?),
            CellCodec::NullableLong => match store.get_string(key, None)? {
                Some(text) => TypedValue::Long(parse_text(key, &text, "decimal i64")?),
                None => TypedValue::Null,
            },
            CellCodec::Float { default } => TypedValue::Float(store.get_f32(key, *default)?),
            CellCodec::NullableFloat => match store.get_string(key, None)? {
                Some(text) => TypedValue::Float(parse_text(key, &text, "decimal f32")?),
                None => TypedValue::Null,
            },
            CellCodec::Boolean { default } => TypedValue::Boolean(store.get_bool(key, *default)?),
            CellCodec::NullableBoolean => match store.get_string(key, None)? {
                Some(text) => TypedValue::Boolean(parse_text(key, &text, "true or false")?),
                None => TypedValue::Null,
            },
            CellCodec::StringSet { default } => {
                let set = store.get_string_set(key, Some(default.clone()))?;
                TypedValue::StringSet(set.unwrap_or_else(|| default.clone()))
            }
            CellCodec::Timestamp { default } => {
                let millis = store.get_i64(key, default.timestamp_millis())?;
                TypedValue::Timestamp(from_millis(key, millis)?)
            }
            CellCodec::NullableTimestamp => match store.get_string(key, None)? {
                Some(text) => {
                    let millis: i64 = parse_text(key, &text, "epoch milliseconds")?;
                    TypedValue::Timestamp(from_millis(key, millis)?)
                }
                None => TypedValue::Null,
            },
            CellCodec::Object { type_name, default } => match store.get_string(key, None)? {
                Some(text) => TypedValue::Object(decode_object(key, *type_name, &text, objects)?),
                None => TypedValue::Object(default.clone()),
            },
            CellCodec::NullableObject { type_name } => match store.get_string(key, None)? {
                Some(text) => match decode_object(key, *type_name, &text, objects)? {
                    Value::Null => TypedValue::Null,
                    v => TypedValue::Object(v),
                },
                None => TypedValue::Null,
            },
        };
        Ok(value)
    }

    /// Stage `value` for cell `key` on `edit`. Flushing is up to the caller.
    pub fn encode(
        &self,
        edit: &mut dyn StoreEdit,
        key: &str,
        value: TypedValue,
        objects: &dyn ObjectCodec,
    ) -> Result<()> {
        match (self, value) {
            (CellCodec::String { .. }, TypedValue::String(s))
            | (CellCodec::NullableString, TypedValue::String(s)) => edit.put_string(key, s),
            (CellCodec::Int { .. }, TypedValue::Int(v)) => edit.put_i32(key, v),
            (CellCodec::NullableInt, TypedValue::Int(v)) => edit.put_string(key, v.to_string()),
            (CellCodec::Long { .. }, TypedValue::Long(v)) => edit.put_i64(key, v),
            (CellCodec::NullableLong, TypedValue::Long(v)) => edit.put_string(key, v.to_string()),
            (CellCodec::Float { .. }, TypedValue::Float(v)) => edit.put_f32(key, v),
            (CellCodec::NullableFloat, TypedValue::Float(v)) => edit.put_string(key, v.to_string()),
            (CellCodec::Boolean { .. }, TypedValue::Boolean(v)) => edit.put_bool(key, v),
            (CellCodec::NullableBoolean, TypedValue::Boolean(v)) => {
                edit.put_string(key, v.to_string())
            }
            (CellCodec::StringSet { .. }, TypedValue::StringSet(set)) => {
                edit.put_string_set(key, set)
            }
            (CellCodec::Timestamp { .. }, TypedValue::Timestamp(t)) => {
                edit.put_i64(key, t.timestamp_millis())
            }
            (CellCodec::NullableTimestamp, TypedValue::Timestamp(t)) => {
                edit.put_string(key, t.timestamp_millis().to_string())
            }
            (CellCodec::Object { type_name, .. }, TypedValue::Object(v))
            | (CellCodec::NullableObject { type_name }, TypedValue::Object(v)) => {
                let text = objects.encode(&v).map_err(|reason| PrefError::ObjectEncode {
                    cell: key.to_string(),
                    type_name: *type_name,
                    reason,
                })?;
                edit.put_string(key, text);
            }
            (CellCodec::NullableObject { .. }, TypedValue::Null) => {
                edit.put_string(key, objects.null_text())
            }
            (
                CellCodec::NullableString
                | CellCodec::NullableInt
                | CellCodec::NullableLong
                | CellCodec::NullableFloat
                | CellCodec::NullableBoolean
                | CellCodec::NullableTimestamp,
                TypedValue::Null,
            ) => edit.remove(key),
            (codec, value) => {
                return Err(PrefError::ValueMismatch {
                    cell: key.to_string(),
                    expected: codec.kind(),
                    found: value.kind(),
                })
            }
        }
        Ok(())
    }
}


fn parse_text<T: FromStr>(key: &str, text: &str, expected: &'static str) -> Result<T> {
    text.parse::<T>().map_err(|_| {
        warn!(cell = key, text, expected, "malformed string-encoded cell");
        PrefError::MalformedCell {
            cell: key.to_string(),
            expected,
            text: text.to_string(),
        }
    })
}


fn from_millis(key: &str, millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| PrefError::MalformedCell {
            cell: key.to_string(),
            expected: "timestamp within chrono range",
            text: millis.to_string(),
        })
}


fn decode_object(
    key: &str,
    type_name: &'static str,
    text: &str,
    objects: &dyn ObjectCodec,
) -> Result<Value> {
    objects.decode(text).map_err(|reason| {
        warn!(cell = key, type_name, format = objects.format(), "object cell failed to decode");
        PrefError::ObjectDecode {
            cell: key.to_string(),
            type_name,
            reason,
        }
    })
}
