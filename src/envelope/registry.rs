//! Type registry and polymorphic envelope decoding.
//!
//! Every concrete type that crosses the wire is registered under exactly one
//! type tag. Decoding looks the tag up and calls that type's decoder; an
//! unknown tag is always a [`Error::Decode`].

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::members::Members;
use super::{CLASS_KEY, MEMBER_KEY, PEER_TYPE_KEY};

// ============================================================================
// Types
// ============================================================================

/// Type-erased decoder stored per tag.
type DecodeFn = fn(Members, &Registry) -> Result<Box<dyn WireObject>>;

// ============================================================================
// WireType
// ============================================================================

/// A concrete type with a wire representation.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct Color(i64);
///
/// impl WireType for Color {
///     const TYPE_TAG: &'static str = "acad.accm.Color";
///
///     fn encode(&self) -> Result<Members> {
///         Members::primitive(&self.0)
///     }
///
///     fn decode(members: Members, _: &Registry) -> Result<Self> {
///         members.into_primitive(Self::TYPE_TAG).map(Self)
///     }
/// }
/// ```
pub trait WireType: fmt::Debug + Send + Sync + Sized + 'static {
    /// Globally unique tag written as `__cls__`.
    const TYPE_TAG: &'static str;

    /// Peer-side type name written as a leading `$type` member.
    ///
    /// The extension's JSON reader uses it to pick a concrete subclass when
    /// the declared field type is a base class.
    const PEER_TYPE: Option<&'static str> = None;

    /// Produces the `__mbr__` payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if a member cannot be serialized.
    fn encode(&self) -> Result<Members>;

    /// Rebuilds the value from its members.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a shape mismatch or missing field.
    fn decode(members: Members, registry: &Registry) -> Result<Self>;
}

// ============================================================================
// WireObject
// ============================================================================

/// Object-safe view of any [`WireType`].
///
/// Polymorphic fields (a list of mixed entity kinds, say) hold
/// `Box<dyn WireObject>`.
pub trait WireObject: fmt::Debug + Send + Sync + Any {
    /// Returns the registered tag.
    fn type_tag(&self) -> &'static str;

    /// Encodes as `{"__cls__": tag, "__mbr__": members}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if a member cannot be serialized.
    fn to_envelope(&self) -> Result<Value>;

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: WireType> WireObject for T {
    fn type_tag(&self) -> &'static str {
        T::TYPE_TAG
    }

    fn to_envelope(&self) -> Result<Value> {
        let members = match (self.encode()?, T::PEER_TYPE) {
            (Members::Fields(fields), Some(peer_type)) => {
                let mut tagged = Map::with_capacity(fields.len() + 1);
                tagged.insert(PEER_TYPE_KEY.to_string(), Value::from(peer_type));
                tagged.extend(fields);
                Value::Object(tagged)
            }
            (members, _) => members.into_value(),
        };

        let mut envelope = Map::with_capacity(2);
        envelope.insert(CLASS_KEY.to_string(), Value::from(T::TYPE_TAG));
        envelope.insert(MEMBER_KEY.to_string(), members);
        Ok(Value::Object(envelope))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<'a> dyn WireObject + 'a {
    /// Returns `true` if the object is a `T`.
    #[inline]
    #[must_use]
    pub fn is<T: WireType>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the object as a `T`.
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: WireType>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Unboxes a decoded object into a concrete type.
///
/// # Errors
///
/// Returns [`Error::Decode`] naming both tags if the type differs.
pub fn downcast_object<T: WireType>(object: Box<dyn WireObject>) -> Result<T> {
    let actual = object.type_tag();
    object
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            Error::decode(format!(
                "expected {}, found {actual}",
                T::TYPE_TAG
            ))
        })
}

// ============================================================================
// Decoded
// ============================================================================

/// A decoded JSON document with every envelope reconstructed.
#[derive(Debug)]
pub enum Decoded {
    /// A plain JSON scalar.
    Value(Value),
    /// A reconstructed registered object.
    Object(Box<dyn WireObject>),
    /// An ordered sequence.
    List(Vec<Decoded>),
    /// A key-unique mapping without a type tag.
    Map(BTreeMap<String, Decoded>),
}

impl Decoded {
    /// Returns the object if this node is one.
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&dyn WireObject> {
        match self {
            Self::Object(object) => Some(object.as_ref()),
            _ => None,
        }
    }

    /// Unwraps an object node into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the node is not an object of type `T`.
    pub fn into_object_as<T: WireType>(self) -> Result<T> {
        match self {
            Self::Object(object) => downcast_object(object),
            other => Err(Error::decode(format!(
                "expected {} envelope, found {}",
                T::TYPE_TAG,
                other.kind()
            ))),
        }
    }

    /// Short name of the node kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Tag-to-decoder table shared by every decode call.
///
/// Constructed once at startup and passed by reference. Registration is
/// insert-or-overwrite, so re-registering a type (after a module reload, for
/// instance) never fails. Individual register/lookup calls are atomic.
#[derive(Default)]
pub struct Registry {
    decoders: RwLock<FxHashMap<&'static str, DecodeFn>>,
    /// Field names dropped before any named decode.
    excluded: RwLock<FxHashSet<String>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.len())
            .field("excluded", &self.excluded.read().len())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under [`WireType::TYPE_TAG`], replacing any previous binding.
    pub fn register<T: WireType>(&self) -> &Self {
        let previous = self.decoders.write().insert(T::TYPE_TAG, decode_boxed::<T>);
        if previous.is_some() {
            debug!(tag = T::TYPE_TAG, "Type tag re-registered");
        } else {
            trace!(tag = T::TYPE_TAG, "Type tag registered");
        }
        self
    }

    /// Drops a field name from every named decode.
    pub fn exclude_field(&self, name: impl Into<String>) -> &Self {
        self.excluded.write().insert(name.into());
        self
    }

    /// Returns `true` if a decoder is bound to `tag`.
    #[inline]
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.read().contains_key(tag)
    }

    /// Returns the number of registered tags.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.read().is_empty()
    }

    /// Parses `text` and reconstructs every envelope in it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for malformed JSON or any unknown tag.
    pub fn decode(&self, text: &str) -> Result<Decoded> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::decode(format!("malformed JSON: {e}")))?;
        self.decode_value(value)
    }

    /// Reconstructs every envelope in an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for any unknown tag or bad member shape.
    pub fn decode_value(&self, value: Value) -> Result<Decoded> {
        match value {
            Value::Object(map) if map.contains_key(CLASS_KEY) => {
                self.construct(map).map(Decoded::Object)
            }
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| Ok((key, self.decode_value(value)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Decoded::Map),
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.decode_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Decoded::List),
            other => Ok(Decoded::Value(other)),
        }
    }

    /// Decodes a value that must itself be an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `value` is not an envelope or its tag is unknown.
    pub fn decode_envelope(&self, value: Value) -> Result<Box<dyn WireObject>> {
        match value {
            Value::Object(map) if map.contains_key(CLASS_KEY) => self.construct(map),
            other => Err(Error::decode(format!("expected an envelope, got {other}"))),
        }
    }

    /// Decodes a single top-level envelope of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on malformed input, unknown tag, or type mismatch.
    pub fn decode_as<T: WireType>(&self, text: &str) -> Result<T> {
        self.decode(text)?.into_object_as()
    }

    /// Decodes a top-level JSON array of `T` envelopes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the document is not a list or any element fails.
    pub fn decode_list_as<T: WireType>(&self, text: &str) -> Result<Vec<T>> {
        match self.decode(text)? {
            Decoded::List(items) => items.into_iter().map(Decoded::into_object_as).collect(),
            other => Err(Error::decode(format!("expected a list, found {}", other.kind()))),
        }
    }

    /// Decodes a top-level JSON object mapping keys to `T` envelopes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the document is not a mapping or any value fails.
    pub fn decode_map_as<T: WireType>(&self, text: &str) -> Result<BTreeMap<String, T>> {
        match self.decode(text)? {
            Decoded::Map(map) => map
                .into_iter()
                .map(|(key, value)| Ok((key, value.into_object_as()?)))
                .collect(),
            other => Err(Error::decode(format!("expected a mapping, found {}", other.kind()))),
        }
    }

    /// Removes excluded field names in place.
    pub(crate) fn strip_excluded(&self, fields: &mut Map<String, Value>) {
        let excluded = self.excluded.read();
        if !excluded.is_empty() {
            fields.retain(|key, _| !excluded.contains(key));
        }
    }

    fn construct(&self, mut map: Map<String, Value>) -> Result<Box<dyn WireObject>> {
        let tag = match map.remove(CLASS_KEY) {
            Some(Value::String(tag)) => tag,
            Some(other) => {
                return Err(Error::decode(format!("type tag must be a string, got {other}")));
            }
            None => return Err(Error::decode("missing type tag")),
        };

        // Copy the fn pointer out so nested decodes never run under the lock.
        let decoder = self
            .decoders
            .read()
            .get(tag.as_str())
            .copied()
            .ok_or_else(|| Error::decode(format!("unknown type tag: {tag}")))?;

        let members = Members::from_value(map.remove(MEMBER_KEY).unwrap_or(Value::Null));
        decoder(members, self)
    }
}

fn decode_boxed<T: WireType>(members: Members, registry: &Registry) -> Result<Box<dyn WireObject>> {
    T::decode(members, registry).map(|value| Box::new(value) as Box<dyn WireObject>)
}

// ============================================================================
// Tests
// ============================================================================
