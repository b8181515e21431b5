//! Envelope member shapes and typed field access.
//!
//! The `__mbr__` half of an envelope takes one of four shapes. Each
//! [`WireType`](super::WireType) decoder asks for the shape it expects
//! instead of having the codec infer a construction style from the JSON.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::registry::{Registry, WireObject, WireType, downcast_object};

// ============================================================================
// Members
// ============================================================================

/// The `__mbr__` payload of an envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Members {
    /// `null` or missing: zero-argument construction.
    #[default]
    Absent,
    /// A bare string, number or boolean: single-argument construction.
    Primitive(Value),
    /// A JSON array: positional construction.
    Sequence(Vec<Value>),
    /// A JSON object: named construction.
    Fields(Map<String, Value>),
}

impl Members {
    /// Classifies a raw JSON value by shape.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Array(items) => Self::Sequence(items),
            Value::Object(fields) => Self::Fields(fields),
            other => Self::Primitive(other),
        }
    }

    /// Builds members from any serializable value.
    ///
    /// `None` fields are dropped, so a value that was explicitly cleared and
    /// one that never had the field encode identically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn from_serde<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|e| Error::encode(e.to_string()))?;
        Ok(Self::from_value(compact(value)))
    }

    /// Wraps a single primitive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn primitive<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Self::from_serde(value)
    }

    /// Converts back into the raw JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Primitive(value) => value,
            Self::Sequence(items) => Value::Array(items),
            Self::Fields(fields) => Value::Object(fields),
        }
    }

    /// Short name of the shape, for error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Primitive(_) => "primitive",
            Self::Sequence(_) => "sequence",
            Self::Fields(_) => "fields",
        }
    }

    /// Deserializes a primitive member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a shape or type mismatch.
    pub fn into_primitive<T: DeserializeOwned>(self, tag: &str) -> Result<T> {
        match self {
            Self::Primitive(value) => from_value(value, tag),
            other => Err(shape_mismatch(tag, "primitive", &other)),
        }
    }

    /// Deserializes a positional member list into a tuple or vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a shape or arity mismatch.
    pub fn into_positional<T: DeserializeOwned>(self, tag: &str) -> Result<T> {
        match self {
            Self::Sequence(items) => from_value(Value::Array(items), tag),
            other => Err(shape_mismatch(tag, "sequence", &other)),
        }
    }

    /// Deserializes named members straight into a serde type.
    ///
    /// Registry-excluded fields are removed first; other unknown fields are
    /// ignored unless the target type denies them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a shape or type mismatch.
    pub fn into_serde<T: DeserializeOwned>(self, tag: &'static str, registry: &Registry) -> Result<T> {
        let reader = self.into_fields(tag, registry)?;
        from_value(Value::Object(reader.fields), tag)
    }

    /// Opens named members for field-by-field reading.
    ///
    /// `Absent` is accepted as an empty field set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for primitive or sequence members.
    pub fn into_fields<'r>(self, tag: &'static str, registry: &'r Registry) -> Result<FieldReader<'r>> {
        let mut fields = match self {
            Self::Fields(fields) => fields,
            Self::Absent => Map::new(),
            other => return Err(shape_mismatch(tag, "fields", &other)),
        };
        registry.strip_excluded(&mut fields);
        Ok(FieldReader {
            registry,
            tag,
            fields,
        })
    }
}

// ============================================================================
// FieldWriter
// ============================================================================

/// Accumulates named members for encoding.
///
/// Absent values are omitted from the output entirely.
#[derive(Debug, Default)]
pub struct FieldWriter {
    fields: Map<String, Value>,
}

impl FieldWriter {
    /// Creates an empty writer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a plain serializable field. A `null` result is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<&mut Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::encode(format!("field {name}: {e}")))?;
        self.insert(name, compact(value));
        Ok(self)
    }

    /// Writes an optional field, skipping `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn optional<T: Serialize>(&mut self, name: &str, value: Option<&T>) -> Result<&mut Self> {
        match value {
            Some(value) => self.field(name, value),
            None => Ok(self),
        }
    }

    /// Writes a nested registered object as an envelope.
    ///
    /// # Errors
    ///
    /// Propagates the nested object's encode error.
    pub fn object(&mut self, name: &str, object: &dyn WireObject) -> Result<&mut Self> {
        let envelope = object.to_envelope()?;
        self.insert(name, envelope);
        Ok(self)
    }

    /// Writes an optional nested object, skipping `None`.
    ///
    /// # Errors
    ///
    /// Propagates the nested object's encode error.
    pub fn optional_object(&mut self, name: &str, object: Option<&dyn WireObject>) -> Result<&mut Self> {
        match object {
            Some(object) => self.object(name, object),
            None => Ok(self),
        }
    }

    /// Writes an ordered list of nested objects.
    ///
    /// # Errors
    ///
    /// Propagates the first nested encode error.
    pub fn objects<'a, I>(&mut self, name: &str, objects: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = &'a dyn WireObject>,
    {
        let items = objects
            .into_iter()
            .map(WireObject::to_envelope)
            .collect::<Result<Vec<_>>>()?;
        self.fields.insert(name.to_string(), Value::Array(items));
        Ok(self)
    }

    /// Writes a key-unique mapping of nested objects.
    ///
    /// # Errors
    ///
    /// Propagates the first nested encode error.
    pub fn object_map<'a, I, K>(&mut self, name: &str, objects: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, &'a dyn WireObject)>,
        K: Into<String>,
    {
        let mut map = Map::new();
        for (key, object) in objects {
            map.insert(key.into(), object.to_envelope()?);
        }
        self.fields.insert(name.to_string(), Value::Object(map));
        Ok(self)
    }

    /// Finishes into [`Members::Fields`].
    #[must_use]
    pub fn finish(self) -> Members {
        Members::Fields(self.fields)
    }

    fn insert(&mut self, name: &str, value: Value) {
        if !value.is_null() {
            self.fields.insert(name.to_string(), value);
        }
    }
}

// ============================================================================
// FieldReader
// ============================================================================

/// Typed access to named members during decoding.
///
/// Fields that are never asked for are silently dropped.
#[derive(Debug)]
pub struct FieldReader<'r> {
    registry: &'r Registry,
    tag: &'static str,
    fields: Map<String, Value>,
}

impl FieldReader<'_> {
    /// Returns `true` if the field is present and not `null`.
    #[inline]
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| !v.is_null())
    }

    /// Reads a field that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if missing or of the wrong type.
    pub fn required<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let value = self.take(name).ok_or_else(|| self.missing(name))?;
        from_value(value, self.tag)
    }

    /// Reads a field that may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if present but of the wrong type.
    pub fn optional<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>> {
        self.take(name).map(|v| from_value(v, self.tag)).transpose()
    }

    /// Reads a field, falling back to `T::default()` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if present but of the wrong type.
    pub fn or_default<T: DeserializeOwned + Default>(&mut self, name: &str) -> Result<T> {
        Ok(self.optional(name)?.unwrap_or_default())
    }

    /// Reads a nested envelope of any registered type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if missing, not an envelope, or unregistered.
    pub fn object(&mut self, name: &str) -> Result<Box<dyn WireObject>> {
        let value = self.take(name).ok_or_else(|| self.missing(name))?;
        self.registry.decode_envelope(value)
    }

    /// Reads a nested envelope of a known type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if missing or of another type.
    pub fn object_as<T: WireType>(&mut self, name: &str) -> Result<T> {
        downcast_object(self.object(name)?)
    }

    /// Reads an optional nested envelope of a known type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if present but malformed or of another type.
    pub fn optional_object_as<T: WireType>(&mut self, name: &str) -> Result<Option<T>> {
        match self.take(name) {
            Some(value) => downcast_object(self.registry.decode_envelope(value)?).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a list of envelopes; absent means empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if not a list or any element fails.
    pub fn objects(&mut self, name: &str) -> Result<Vec<Box<dyn WireObject>>> {
        match self.take(name) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| self.registry.decode_envelope(item))
                .collect(),
            Some(other) => Err(Error::decode(format!(
                "{}: field {name} should be a list, got {other}",
                self.tag
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// Reads a list of envelopes of one known type; absent means empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if any element fails or has another type.
    pub fn objects_as<T: WireType>(&mut self, name: &str) -> Result<Vec<T>> {
        self.objects(name)?.into_iter().map(downcast_object).collect()
    }

    /// Reads a key-unique mapping of envelopes; absent means empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if not a mapping or any value fails.
    pub fn object_map(&mut self, name: &str) -> Result<Vec<(String, Box<dyn WireObject>)>> {
        match self.take(name) {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| Ok((key, self.registry.decode_envelope(value)?)))
                .collect(),
            Some(other) => Err(Error::decode(format!(
                "{}: field {name} should be a mapping, got {other}",
                self.tag
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the registry nested decodes go through.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    fn take(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name).filter(|v| !v.is_null())
    }

    fn missing(&self, name: &str) -> Error {
        Error::decode(format!("{}: missing field {name}", self.tag))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Drops `null` entries from JSON objects, recursively.
///
/// Array elements are kept as-is so positional arguments stay aligned.
pub(crate) fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, compact(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(compact).collect()),
        other => other,
    }
}

fn from_value<T: DeserializeOwned>(value: Value, tag: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::decode(format!("{tag}: {e}")))
}

fn shape_mismatch(tag: &str, expected: &str, actual: &Members) -> Error {
    Error::decode(format!(
        "{tag}: expected {expected} members, got {}",
        actual.shape()
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_members_from_value_shapes() {
        assert_eq!(Members::from_value(Value::Null), Members::Absent);
        assert_eq!(Members::from_value(json!(3)).shape(), "primitive");
        assert_eq!(Members::from_value(json!([1, 2])).shape(), "sequence");
        assert_eq!(Members::from_value(json!({"a": 1})).shape(), "fields");
    }

    #[test]
    fn test_compact_drops_nested_nulls_but_keeps_array_slots() {
        let value = json!({"a": null, "b": {"c": null, "d": 1}, "e": [null, 2]});
        assert_eq!(compact(value), json!({"b": {"d": 1}, "e": [null, 2]}));
    }

    #[test]
    fn test_writer_omits_none() {
        let mut writer = FieldWriter::new();
        writer
            .field("name", "0")
            .and_then(|w| w.optional::<String>("linetype", None))
            .expect("write");
        assert_eq!(writer.finish().into_value(), json!({"name": "0"}));
    }

    #[test]
    fn test_positional_into_tuple() {
        let members = Members::from_value(json!([1.0, 2.5, -3.0]));
        let (x, y, z): (f64, f64, f64) = members.into_positional("Point3d").expect("decode");
        assert_eq!((x, y, z), (1.0, 2.5, -3.0));
    }

    #[test]
    fn test_positional_rejects_fields() {
        let members = Members::from_value(json!({"x": 1}));
        let err = members.into_positional::<(f64,)>("Point3d").unwrap_err();
        assert!(err.is_codec_error());
        assert!(err.to_string().contains("expected sequence"));
    }

    #[test]
    fn test_reader_required_and_missing() {
        let registry = Registry::new();
        let members = Members::from_value(json!({"name": "walls"}));
        let mut reader = members.into_fields("Layer", &registry).expect("fields");

        assert_eq!(reader.required::<String>("name").expect("name"), "walls");
        let err = reader.required::<String>("color").unwrap_err();
        assert!(err.to_string().contains("missing field color"));
    }

    #[test]
    fn test_reader_treats_null_as_absent() {
        let registry = Registry::new();
        let members = Members::from_value(json!({"color": null}));
        let mut reader = members.into_fields("Layer", &registry).expect("fields");
        assert!(!reader.has("color"));
        assert_eq!(reader.optional::<i64>("color").expect("optional"), None);
    }

    #[test]
    fn test_absent_members_open_as_empty_fields() {
        let registry = Registry::new();
        let mut reader = Members::Absent.into_fields("Empty", &registry).expect("fields");
        assert_eq!(reader.or_default::<u32>("count").expect("default"), 0);
        assert!(reader.objects("items").expect("objects").is_empty());
    }
}
