//! Property bindings: typed descriptors for one cell.
//!
//! A [`Property<T>`] pairs an explicit cell name with a [`CellCodec`] and
//! the conversions between `T` and [`TypedValue`]. It holds no reference to
//! a container and can be shared by every container of the same shape.
//! [`Pref<T>`] is the same descriptor bound to one container, which is what
//! settings structs keep as named fields.
//!
//! Cell names are the persisted keys. Renaming a property orphans its data,
//! so keep the names stable across releases.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{CellCodec, JsonCodec, ObjectCodec, TypedValue};
use crate::container::PrefContainer;
use crate::error::{PrefError, Result};


type ToTyped<T> = fn(T, &str) -> Result<TypedValue>;
type FromTyped<T> = fn(TypedValue, &str) -> Result<T>;


/// A typed binding of one cell name to one codec.
pub struct Property<T> {
    name: String,
    codec: CellCodec,
    to_typed: ToTyped<T>,
    from_typed: FromTyped<T>,
}

impl<T> Property<T> {
    fn with_codec(
        name: impl Into<String>,
        codec: CellCodec,
        to_typed: ToTyped<T>,
        from_typed: FromTyped<T>,
    ) -> Self {
        Property {
            name: name.into(),
            codec,
            to_typed,
            from_typed,
        }
    }

    /// The cell name this property reads and writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &CellCodec {
        &self.codec
    }

    /// Read the property from `container`. An absent cell yields the
    /// default (or `None` for nullable properties); the store is not
    /// modified.
    pub fn read(&self, container: &PrefContainer) -> Result<T> {
        self.read_cell(container, &self.name)
    }

    /// Replace the stored value and flush according to the container's
    /// save mode.
    pub fn write(&self, container: &PrefContainer, value: T) -> Result<()> {
        self.write_cell(container, &self.name, value)
    }

    /// Drop the cell so the next read yields the default.
    pub fn remove(&self, container: &PrefContainer) -> Result<()> {
        self.remove_cell(container, &self.name)
    }

    /// True if a cell is stored under this property's name.
    pub fn is_set(&self, container: &PrefContainer) -> bool {
        container.store().contains(&self.name)
    }

    pub(crate) fn read_cell(&self, container: &PrefContainer, cell: &str) -> Result<T> {
        let value = self
            .codec
            .decode(container.store(), cell, container.object_codec())?;
        (self.from_typed)(value, cell)
    }

    pub(crate) fn write_cell(&self, container: &PrefContainer, cell: &str, value: T) -> Result<()> {
        let typed = (self.to_typed)(value, cell)?;
        let mut edit = container.store().edit();
        self.codec
            .encode(edit.as_mut(), cell, typed, container.object_codec())?;
        container.flush(edit, cell)
    }

    pub(crate) fn remove_cell(&self, container: &PrefContainer, cell: &str) -> Result<()> {
        let mut edit = container.store().edit();
        edit.remove(cell);
        container.flush(edit, cell)
    }
}

impl Property<String> {
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        let codec = CellCodec::String {
            default: default.into(),
        };
        Self::with_codec(name, codec, scalar_to, scalar_from)
    }
}

impl Property<Option<String>> {
    pub fn nullable_string(name: impl Into<String>) -> Self {
        Self::with_codec(name, CellCodec::NullableString, nullable_to, nullable_from)
    }
}

impl Property<i32> {
    pub fn int(name: impl Into<String>, default: i32) -> Self {
        Self::with_codec(name, CellCodec::Int { default }, scalar_to, scalar_from)
    }
}

impl Property<Option<i32>> {
    pub fn nullable_int(name: impl Into<String>) -> Self {
        Self::with_codec(name, CellCodec::NullableInt, nullable_to, nullable_from)
    }
}

impl Property<i64> {
    pub fn long(name: impl Into<String>, default: i64) -> Self {
        Self::with_codec(name, CellCodec::Long { default }, scalar_to, scalar_from)
    }
}

impl Property<Option<i64>> {
    pub fn nullable_long(name: impl Into<String>) -> Self {
        Self::with_codec(name, CellCodec::NullableLong, nullable_to, nullable_from)
    }
}

impl Property<f32> {
    pub fn float(name: impl Into<String>, default: f32) -> Self {
        Self::with_codec(name, CellCodec::Float { default }, scalar_to, scalar_from)
    }
}

impl Property<Option<f32>> {
    pub fn nullable_float(name: impl Into<String>) -> Self {
        Self::with_codec(name, CellCodec::NullableFloat, nullable_to, nullable_from)
    }
}

impl Property<bool> {
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::with_codec(name, CellCodec::Boolean { default }, scalar_to, scalar_from)
    }
}

impl Property<Option<bool>> {
    pub fn nullable_boolean(name: impl Into<String>) -> Self {
        Self::with_codec(name, CellCodec::NullableBoolean, nullable_to, nullable_from)
    }
}

impl Property<BTreeSet<String>> {
    pub fn string_set(name: impl Into<String>, default: BTreeSet<String>) -> Self {
        Self::with_codec(name, CellCodec::StringSet { default }, scalar_to, scalar_from)
    }
}

impl Property<DateTime<Utc>> {
    /// Stored as milliseconds since the epoch. Sub-millisecond precision is
    /// dropped on write, so `get` returns the value truncated to the
    /// millisecond.
    pub fn timestamp(name: impl Into<String>, default: DateTime<Utc>) -> Self {
        Self::with_codec(name, CellCodec::Timestamp { default }, scalar_to, scalar_from)
    }
}

impl Property<Option<DateTime<Utc>>> {
    pub fn nullable_timestamp(name: impl Into<String>) -> Self {
        Self::with_codec(name, CellCodec::NullableTimestamp, nullable_to, nullable_from)
    }
}

impl<T: Serialize + DeserializeOwned> Property<T> {
    /// Object property checked against the standard nominal-type rule.
    pub fn object(name: impl Into<String>, default: T) -> Result<Self> {
        Self::object_for(&JsonCodec, name, default)
    }

    /// Object property checked against `objects`' nominal-type rule.
    pub fn object_for(objects: &dyn ObjectCodec, name: impl Into<String>, default: T) -> Result<Self> {
        let type_name = nominal_type_name::<T>(objects)?;
        let name = name.into();
        let codec = CellCodec::Object {
            type_name,
            default: to_json(&default, &name, type_name)?,
        };
        Ok(Self::with_codec(name, codec, object_to, object_from))
    }
}

impl<T: Serialize + DeserializeOwned> Property<Option<T>> {
    pub fn nullable_object(name: impl Into<String>) -> Result<Self> {
        Self::nullable_object_for(&JsonCodec, name)
    }

    /// Fails with [`PrefError::NullableNullObject`] when `T` itself
    /// deserializes from null (unit structs, `Option<_>`), since such a
    /// value would read back as `None`.
    pub fn nullable_object_for(objects: &dyn ObjectCodec, name: impl Into<String>) -> Result<Self> {
        let type_name = nominal_type_name::<T>(objects)?;
        if serde_json::from_value::<T>(serde_json::Value::Null).is_ok() {
            return Err(PrefError::NullableNullObject { type_name });
        }
        let codec = CellCodec::NullableObject { type_name };
        Ok(Self::with_codec(name, codec, nullable_object_to, nullable_object_from))
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Property {
            name: self.name.clone(),
            codec: self.codec.clone(),
            to_typed: self.to_typed,
            from_typed: self.from_typed,
        }
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}


/// A property bound to one container.
pub struct Pref<T> {
    container: PrefContainer,
    property: Property<T>,
}

impl<T> Pref<T> {
    pub fn new(container: PrefContainer, property: Property<T>) -> Self {
        Pref {
            container,
            property,
        }
    }

    pub fn name(&self) -> &str {
        self.property.name()
    }

    pub fn property(&self) -> &Property<T> {
        &self.property
    }

    pub fn get(&self) -> Result<T> {
        self.property.read(&self.container)
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.property.write(&self.container, value)
    }

    pub fn remove(&self) -> Result<()> {
        self.property.remove(&self.container)
    }

    pub fn is_set(&self) -> bool {
        self.property.is_set(&self.container)
    }
}

impl<T> fmt::Debug for Pref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pref")
            .field("container", &self.container.name())
            .field("property", &self.property)
            .finish()
    }
}


// ---------------------------------------------------------------------------
// Conversions between T and TypedValue
// ---------------------------------------------------------------------------

/// Types with a dedicated `TypedValue` variant.
trait Scalar: Sized {
    const LABEL: &'static str;
    fn wrap(self) -> TypedValue;
    fn unwrap(value: TypedValue) -> std::result::Result<Self, TypedValue>;
}

macro_rules! scalar {
    ($ty:ty, $variant:ident, $label:literal) => {
        impl Scalar for $ty {
            const LABEL: &'static str = $label;

            fn wrap(self) -> TypedValue {
                TypedValue::$variant(self)
            }

            fn unwrap(value: TypedValue) -> std::result::Result<Self, TypedValue> {
                match value {
                    TypedValue::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    };
}

scalar!(String, String, "string");
scalar!(i32, Int, "int");
scalar!(i64, Long, "long");
scalar!(f32, Float, "float");
scalar!(bool, Boolean, "boolean");
scalar!(BTreeSet<String>, StringSet, "string set");
scalar!(DateTime<Utc>, Timestamp, "timestamp");


fn mismatch(cell: &str, expected: &'static str, found: &TypedValue) -> PrefError {
    PrefError::ValueMismatch {
        cell: cell.to_string(),
        expected,
        found: found.kind(),
    }
}

fn scalar_to<T: Scalar>(value: T, _cell: &str) -> Result<TypedValue> {
    Ok(value.wrap())
}

fn scalar_from<T: Scalar>(value: TypedValue, cell: &str) -> Result<T> {
    T::unwrap(value).map_err(|other| mismatch(cell, T::LABEL, &other))
}

fn nullable_to<T: Scalar>(value: Option<T>, _cell: &str) -> Result<TypedValue> {
    Ok(value.map_or(TypedValue::Null, Scalar::wrap))
}

fn nullable_from<T: Scalar>(value: TypedValue, cell: &str) -> Result<Option<T>> {
    match value {
        TypedValue::Null => Ok(None),
        other => scalar_from(other, cell).map(Some),
    }
}

fn nominal_type_name<T>(objects: &dyn ObjectCodec) -> Result<&'static str> {
    let type_name = std::any::type_name::<T>();
    if objects.is_nominally_identifiable(type_name) {
        Ok(type_name)
    } else {
        Err(PrefError::AnonymousTypeBinding { type_name })
    }
}

fn to_json<T: Serialize>(value: &T, cell: &str, type_name: &'static str) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| PrefError::ObjectEncode {
        cell: cell.to_string(),
        type_name,
        reason: e.to_string(),
    })
}

fn object_to<T: Serialize>(value: T, cell: &str) -> Result<TypedValue> {
    to_json(&value, cell, std::any::type_name::<T>()).map(TypedValue::Object)
}

fn object_from<T: DeserializeOwned>(value: TypedValue, cell: &str) -> Result<T> {
    match value {
        TypedValue::Object(v) => serde_json::from_value(v).map_err(|e| PrefError::ObjectDecode {
            cell: cell.to_string(),
            type_name: std::any::type_name::<T>(),
            reason: e.to_string(),
        }),
        other => Err(mismatch(cell, "object", &other)),
    }
}

fn nullable_object_to<T: Serialize>(value: Option<T>, cell: &str) -> Result<TypedValue> {
    match value {
        Some(v) => object_to(v, cell),
        None => Ok(TypedValue::Null),
    }
}

fn nullable_object_from<T: DeserializeOwned>(value: TypedValue, cell: &str) -> Result<Option<T>> {
    match value {
        TypedValue::Null => Ok(None),
        other => object_from(other, cell).map(Some),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SaveMode;
    use crate::store::{MemoryProvider, MemoryStore, PreferenceStore, StoreEdit};
    use chrono::TimeZone;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        surname: String,
    }

    fn container(mode: SaveMode) -> (PrefContainer, Arc<MemoryStore>) {
        let provider = MemoryProvider::new();
        let store = provider.open_memory("settings");
        let container = PrefContainer::from_store(store.clone(), mode);
        (container, store)
    }

    fn millis(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn string_default_then_value() {
        let (c, _) = container(SaveMode::Apply);
        let p = c.string("property", "defValue");
        assert_eq!(p.get().unwrap(), "defValue");
        p.set("value".into()).unwrap();
        assert_eq!(p.get().unwrap(), "value");
    }

    #[test]
    fn nullable_string_round_trip() {
        let (c, _) = container(SaveMode::Apply);
        let p = c.nullable_string("property");
        assert_eq!(p.get().unwrap(), None);
        p.set(Some("value".into())).unwrap();
        assert_eq!(p.get().unwrap(), Some("value".into()));
        p.set(None).unwrap();
        assert_eq!(p.get().unwrap(), None);
    }

    #[test]
    fn int_and_nullable_int() {
        let (c, _) = container(SaveMode::Apply);
        let n = c.int("n", 50);
        assert_eq!(n.get().unwrap(), 50);
        n.set(100).unwrap();
        assert_eq!(n.get().unwrap(), 100);

        let m = c.nullable_int("m");
        assert_eq!(m.get().unwrap(), None);
        m.set(Some(100)).unwrap();
        assert_eq!(m.get().unwrap(), Some(100));
        m.set(None).unwrap();
        assert_eq!(m.get().unwrap(), None);
    }

    #[test]
    fn long_and_nullable_long() {
        let (c, _) = container(SaveMode::Commit);
        let n = c.long("n", 50);
        assert_eq!(n.get().unwrap(), 50);
        n.set(i64::MIN).unwrap();
        assert_eq!(n.get().unwrap(), i64::MIN);

        let m = c.nullable_long("m");
        assert_eq!(m.get().unwrap(), None);
        m.set(Some(i64::MAX)).unwrap();
        assert_eq!(m.get().unwrap(), Some(i64::MAX));
        m.set(None).unwrap();
        assert_eq!(m.get().unwrap(), None);
    }

    #[test]
    fn float_and_nullable_float() {
        let (c, _) = container(SaveMode::Apply);
        let f = c.float("f", 50.0);
        assert_eq!(f.get().unwrap(), 50.0);
        f.set(100.25).unwrap();
        assert_eq!(f.get().unwrap(), 100.25);

        let g = c.nullable_float("g");
        assert_eq!(g.get().unwrap(), None);
        g.set(Some(-3.5e-7)).unwrap();
        assert_eq!(g.get().unwrap(), Some(-3.5e-7));
        g.set(None).unwrap();
        assert_eq!(g.get().unwrap(), None);
    }

    #[test]
    fn non_finite_floats_round_trip() {
        let (c, _) = container(SaveMode::Commit);
        let f = c.float("f", 0.0);
        let g = c.nullable_float("g");

        f.set(f32::NAN).unwrap();
        assert!(f.get().unwrap().is_nan());
        g.set(Some(f32::NAN)).unwrap();
        assert!(g.get().unwrap().unwrap().is_nan());

        for v in [f32::INFINITY, f32::NEG_INFINITY] {
            f.set(v).unwrap();
            assert_eq!(f.get().unwrap(), v);
            g.set(Some(v)).unwrap();
            assert_eq!(g.get().unwrap(), Some(v));
        }
    }

    #[test]
    fn boolean_and_nullable_boolean() {
        let (c, _) = container(SaveMode::Apply);
        let b = c.boolean("b", true);
        assert!(b.get().unwrap());
        b.set(false).unwrap();
        assert!(!b.get().unwrap());

        let n = c.nullable_boolean("n");
        assert_eq!(n.get().unwrap(), None);
        n.set(Some(true)).unwrap();
        assert_eq!(n.get().unwrap(), Some(true));
        n.set(Some(false)).unwrap();
        assert_eq!(n.get().unwrap(), Some(false));
        n.set(None).unwrap();
        assert_eq!(n.get().unwrap(), None);
    }

    #[test]
    fn string_set_default_then_value() {
        let (c, _) = container(SaveMode::Apply);
        let default: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        let tags = c.string_set("tags", default.clone());
        assert_eq!(tags.get().unwrap(), default);

        let next: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        tags.set(next.clone()).unwrap();
        assert_eq!(tags.get().unwrap(), next);
    }

    #[test]
    fn timestamp_and_nullable_timestamp() {
        let (c, _) = container(SaveMode::Apply);
        let t = c.timestamp("t", millis(50));
        assert_eq!(t.get().unwrap(), millis(50));
        t.set(millis(500)).unwrap();
        assert_eq!(t.get().unwrap(), millis(500));
        assert_ne!(t.get().unwrap(), millis(50));

        let n = c.nullable_timestamp("n");
        assert_eq!(n.get().unwrap(), None);
        n.set(Some(millis(-500))).unwrap();
        assert_eq!(n.get().unwrap(), Some(millis(-500)));
        n.set(None).unwrap();
        assert_eq!(n.get().unwrap(), None);
    }

    #[test]
    fn timestamp_is_truncated_to_millis() {
        let (c, store) = container(SaveMode::Apply);
        let precise = Utc.timestamp_opt(1, 234_567_891).single().unwrap();
        let t = c.timestamp("t", millis(0));
        t.set(precise).unwrap();
        assert_eq!(store.get_i64("t", 0).unwrap(), 1234);
        assert_eq!(t.get().unwrap(), millis(1234));
        assert_ne!(t.get().unwrap(), precise);

        let n = c.nullable_timestamp("n");
        n.set(Some(precise)).unwrap();
        assert_eq!(n.get().unwrap(), Some(millis(1234)));
    }

    #[test]
    fn object_default_then_value() {
        let (c, _) = container(SaveMode::Apply);
        let default = Person {
            name: "defaultName".into(),
            surname: "defaultSurname".into(),
        };
        let p = c.object("person", default.clone()).unwrap();
        assert_eq!(p.get().unwrap(), default);

        let next = Person {
            name: "newName".into(),
            surname: "newSurname".into(),
        };
        p.set(next.clone()).unwrap();
        assert_eq!(p.get().unwrap(), next);
    }

    #[test]
    fn nullable_object_round_trip() {
        let (c, store) = container(SaveMode::Apply);
        let p = c.nullable_object::<Person>("person").unwrap();
        assert_eq!(p.get().unwrap(), None);

        let next = Person {
            name: "newName".into(),
            surname: "newSurname".into(),
        };
        p.set(Some(next.clone())).unwrap();
        assert_eq!(p.get().unwrap(), Some(next));

        p.set(None).unwrap();
        assert_eq!(p.get().unwrap(), None);
        assert!(store.contains("person"));
    }

    #[test]
    fn anonymous_object_type_is_rejected_before_store_access() {
        let (c, store) = container(SaveMode::Apply);
        let err = c
            .object("pair", ("a".to_string(), "b".to_string()))
            .unwrap_err();
        assert!(matches!(err, PrefError::AnonymousTypeBinding { .. }));
        let err = Property::<Option<(i32, i32)>>::nullable_object("pair").unwrap_err();
        assert!(matches!(err, PrefError::AnonymousTypeBinding { .. }));
        assert!(store.snapshot().is_empty());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Marker;

    #[test]
    fn nullable_object_rejects_types_that_deserialize_from_null() {
        let (c, store) = container(SaveMode::Apply);
        match c.nullable_object::<Marker>("marker") {
            Err(PrefError::NullableNullObject { type_name }) => assert!(type_name.ends_with("Marker")),
            other => panic!("expected NullableNullObject, got {:?}", other),
        }
        assert!(matches!(
            Property::<Option<Option<Person>>>::nullable_object("p"),
            Err(PrefError::NullableNullObject { .. })
        ));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn unit_struct_is_fine_as_plain_object() {
        let (c, _) = container(SaveMode::Apply);
        let p = c.object("marker", Marker).unwrap();
        p.set(Marker).unwrap();
        assert_eq!(p.get().unwrap(), Marker);
    }

    #[test]
    fn object_of_wrong_shape_fails_to_decode() {
        let (c, store) = container(SaveMode::Apply);
        let mut edit = store.edit();
        edit.put_string("person", r#"{"name":"only"}"#.into());
        edit.apply();

        let p = c.nullable_object::<Person>("person").unwrap();
        match p.get() {
            Err(PrefError::ObjectDecode { cell, .. }) => assert_eq!(cell, "person"),
            other => panic!("expected ObjectDecode, got {:?}", other),
        }
    }

    #[test]
    fn malformed_nullable_int_cell_is_reported() {
        let (c, store) = container(SaveMode::Apply);
        let mut edit = store.edit();
        edit.put_string("retries", "three".into());
        edit.apply();

        match c.nullable_int("retries").get() {
            Err(PrefError::MalformedCell { cell, text, .. }) => {
                assert_eq!(cell, "retries");
                assert_eq!(text, "three");
            }
            other => panic!("expected MalformedCell, got {:?}", other),
        }
    }

    #[test]
    fn sequential_writes_read_back_last() {
        let (c, _) = container(SaveMode::Apply);
        let p = c.string("s", "");
        p.set("v1".into()).unwrap();
        p.set("v2".into()).unwrap();
        assert_eq!(p.get().unwrap(), "v2");
    }

    #[test]
    fn descriptor_is_shared_across_containers() {
        let provider = MemoryProvider::new();
        let a = PrefContainer::open(&provider, "a", SaveMode::Apply).unwrap();
        let b = PrefContainer::open(&provider, "b", SaveMode::Commit).unwrap();
        let retries = Property::int("retries", 3);

        retries.write(&a, 7).unwrap();
        assert_eq!(retries.read(&a).unwrap(), 7);
        assert_eq!(retries.read(&b).unwrap(), 3);
    }

    #[test]
    fn remove_restores_default() {
        let (c, _) = container(SaveMode::Commit);
        let p = c.int("n", 3);
        p.set(9).unwrap();
        assert!(p.is_set());
        p.remove().unwrap();
        assert!(!p.is_set());
        assert_eq!(p.get().unwrap(), 3);
    }

    #[test]
    fn reading_never_writes() {
        let (c, store) = container(SaveMode::Apply);
        let _ = c.string("s", "d").get().unwrap();
        let _ = c.nullable_boolean("b").get().unwrap();
        let _ = c.timestamp("t", millis(1)).get().unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn commit_failure_is_surfaced() {
        let (c, store) = container(SaveMode::Commit);
        store.set_commit_failure(true);
        match c.int("n", 0).set(1) {
            Err(PrefError::CommitFailed { container, cell }) => {
                assert_eq!(container, "settings");
                assert_eq!(cell, "n");
            }
            other => panic!("expected CommitFailed, got {:?}", other),
        }
    }

    #[test]
    fn apply_ignores_commit_failure_flag() {
        let (c, store) = container(SaveMode::Apply);
        store.set_commit_failure(true);
        c.int("n", 0).set(1).unwrap();
        assert_eq!(store.get_i32("n", 0).unwrap(), 1);
    }
}
