//! Error types for the binding layer and the store adapters.

use std::io;

use thiserror::Error;


/// Errors raised by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A cell exists under the key but holds a different native type.
    #[error("cell '{key}' holds a {found} cell, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The store name cannot be mapped to a storage location.
    #[error("invalid store name '{0}'")]
    InvalidName(String),

    /// The persisted store file could not be parsed.
    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Filesystem I/O error.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
}


/// Errors raised by bindings and containers.
#[derive(Debug, Error)]
pub enum PrefError {
    /// A string-encoded numeric, boolean, or timestamp cell does not match
    /// its expected grammar.
    #[error("malformed cell '{cell}': expected {expected}, found {text:?}")]
    MalformedCell {
        cell: String,
        expected: &'static str,
        text: String,
    },

    /// The object codec could not rebuild a value from persisted text.
    #[error("failed to decode cell '{cell}' as {type_name}: {reason}")]
    ObjectDecode {
        cell: String,
        type_name: &'static str,
        reason: String,
    },

    /// The object codec failed to turn a value into text.
    #[error("failed to encode cell '{cell}' as {type_name}: {reason}")]
    ObjectEncode {
        cell: String,
        type_name: &'static str,
        reason: String,
    },

    /// An object binding was declared for a type without stable nominal
    /// identity.
    #[error("cannot bind anonymous type {type_name}: object cells need a nominally identifiable type")]
    AnonymousTypeBinding { type_name: &'static str },

    /// A nullable object binding was declared for a type whose own values
    /// can deserialize from null, so `Some(v)` would read back as `None`.
    #[error("cannot bind {type_name} as a nullable object: it deserializes from null")]
    NullableNullObject { type_name: &'static str },

    /// A value of the wrong shape was handed to a codec variant.
    #[error("cell '{cell}' is bound as {expected}, got a {found} value")]
    ValueMismatch {
        cell: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A synchronous commit reported that persistence failed.
    #[error("commit of cell '{cell}' in container '{container}' failed")]
    CommitFailed { container: String, cell: String },

    /// Underlying store adapter failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}


/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PrefError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_into_pref_error() {
        let err: PrefError = StoreError::InvalidName("../x".into()).into();
        assert!(matches!(err, PrefError::Store(StoreError::InvalidName(_))));
        assert_eq!(err.to_string(), "invalid store name '../x'");
    }

    #[test]
    fn malformed_cell_message_quotes_text() {
        let err = PrefError::MalformedCell {
            cell: "retries".into(),
            expected: "i32",
            text: "abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed cell 'retries': expected i32, found \"abc\""
        );
    }
}
