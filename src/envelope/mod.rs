//! Envelope codec: the wire contract between the two type systems.
//!
//! Every registered value travels as
//!
//! ```json
//! {"__cls__": "<type-tag>", "__mbr__": <members>}
//! ```
//!
//! where `<members>` is `null`, a primitive, a positional array, or a map of
//! named fields (see [`Members`]). Absent fields are omitted entirely, so a
//! round trip cannot tell "explicitly cleared" from "never set".
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `members` | Member shapes, [`FieldWriter`], [`FieldReader`] |
//! | `registry` | [`Registry`], [`WireType`], [`WireObject`], [`Decoded`] |
//!
//! The codec is synchronous and has no knowledge of the transport.

// ============================================================================
// Submodules
// ============================================================================

/// Member shapes and typed field access.
pub mod members;

/// Type registry and polymorphic decoding.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use members::{FieldReader, FieldWriter, Members};
pub use registry::{Decoded, Registry, WireObject, WireType, downcast_object};

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Key holding the type tag.
pub const CLASS_KEY: &str = "__cls__";

/// Key holding the members.
pub const MEMBER_KEY: &str = "__mbr__";

/// Key of the peer-side polymorphic type hint inside named members.
pub const PEER_TYPE_KEY: &str = "$type";

// ============================================================================
// Encoding
// ============================================================================

/// Serializes one registered object.
///
/// # Errors
///
/// Returns [`Error::Encode`] if any member cannot be serialized.
pub fn encode(object: &dyn WireObject) -> Result<String> {
    to_text(&object.to_envelope()?)
}

/// Serializes an ordered sequence of registered objects as a JSON array.
///
/// # Errors
///
/// Returns [`Error::Encode`] if any member cannot be serialized.
pub fn encode_list<'a, I>(objects: I) -> Result<String>
where
    I: IntoIterator<Item = &'a dyn WireObject>,
{
    let items = objects
        .into_iter()
        .map(WireObject::to_envelope)
        .collect::<Result<Vec<_>>>()?;
    to_text(&Value::Array(items))
}

/// Serializes a key-unique mapping of registered objects as a JSON object.
///
/// # Errors
///
/// Returns [`Error::Encode`] if any member cannot be serialized.
pub fn encode_map<'a, I, K>(objects: I) -> Result<String>
where
    I: IntoIterator<Item = (K, &'a dyn WireObject)>,
    K: Into<String>,
{
    let mut map = Map::new();
    for (key, object) in objects {
        map.insert(key.into(), object.to_envelope()?);
    }
    to_text(&Value::Object(map))
}

fn to_text(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::encode(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::{Deserialize, Serialize};
    use serde_json::json;

    // ------------------------------------------------------------------------
    // Fixtures: one type per member shape, plus a polymorphic container
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Point3d {
        x: f64,
        y: f64,
        z: f64,
    }

    impl WireType for Point3d {
        const TYPE_TAG: &'static str = "acge.Point3d";

        fn encode(&self) -> Result<Members> {
            Members::from_serde(&(self.x, self.y, self.z))
        }

        fn decode(members: Members, _: &Registry) -> Result<Self> {
            let (x, y, z) = members.into_positional(Self::TYPE_TAG)?;
            Ok(Self { x, y, z })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Color(i64);

    impl WireType for Color {
        const TYPE_TAG: &'static str = "accm.Color";

        fn encode(&self) -> Result<Members> {
            Members::primitive(&self.0)
        }

        fn decode(members: Members, _: &Registry) -> Result<Self> {
            members.into_primitive(Self::TYPE_TAG).map(Self)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Layer {
        name: String,
        is_off: Option<bool>,
        description: Option<Value>,
    }

    impl WireType for Layer {
        const TYPE_TAG: &'static str = "acdb.LayerTableRecord";
        const PEER_TYPE: Option<&'static str> = Some("SacadMgd.LayerTableRecord, SacadMgd");

        fn encode(&self) -> Result<Members> {
            Members::from_serde(self)
        }

        fn decode(members: Members, registry: &Registry) -> Result<Self> {
            members.into_serde(Self::TYPE_TAG, registry)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Line {
        start: Point3d,
        end: Point3d,
        color: Option<Color>,
        layer: Option<String>,
    }

    impl WireType for Line {
        const TYPE_TAG: &'static str = "acdb.Line";

        fn encode(&self) -> Result<Members> {
            let mut w = FieldWriter::new();
            w.object("start", &self.start)?;
            w.object("end", &self.end)?;
            w.optional_object("color", self.color.as_ref().map(|c| c as &dyn WireObject))?;
            w.optional("layer", self.layer.as_ref())?;
            Ok(w.finish())
        }

        fn decode(members: Members, registry: &Registry) -> Result<Self> {
            let mut r = members.into_fields(Self::TYPE_TAG, registry)?;
            Ok(Self {
                start: r.object_as("start")?,
                end: r.object_as("end")?,
                color: r.optional_object_as("color")?,
                layer: r.optional("layer")?,
            })
        }
    }

    #[derive(Debug)]
    struct Database {
        entities: Vec<Box<dyn WireObject>>,
        layers: Vec<(String, Layer)>,
    }

    impl WireType for Database {
        const TYPE_TAG: &'static str = "acdb.Database";

        fn encode(&self) -> Result<Members> {
            let mut w = FieldWriter::new();
            w.objects("entities", self.entities.iter().map(|e| &**e))?;
            w.object_map(
                "layers",
                self.layers.iter().map(|(k, v)| (k.clone(), v as &dyn WireObject)),
            )?;
            Ok(w.finish())
        }

        fn decode(members: Members, registry: &Registry) -> Result<Self> {
            let mut r = members.into_fields(Self::TYPE_TAG, registry)?;
            let entities = r.objects("entities")?;
            let layers = r
                .object_map("layers")?
                .into_iter()
                .map(|(k, v)| Ok((k, downcast_object::<Layer>(v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Self { entities, layers })
        }
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register::<Point3d>()
            .register::<Color>()
            .register::<Layer>()
            .register::<Line>()
            .register::<Database>();
        registry
    }

    fn sample_line() -> Line {
        Line {
            start: Point3d { x: 0.0, y: 0.0, z: 0.0 },
            end: Point3d { x: 10.0, y: 5.5, z: 0.0 },
            color: Some(Color(1)),
            layer: Some("walls".into()),
        }
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_round_trip_each_shape() {
        let registry = registry();

        let point = Point3d { x: 1.0, y: -2.0, z: 3.5 };
        assert_eq!(registry.decode_as::<Point3d>(&encode(&point).expect("encode")).expect("decode"), point);

        let color = Color(256);
        assert_eq!(registry.decode_as::<Color>(&encode(&color).expect("encode")).expect("decode"), color);

        let line = sample_line();
        assert_eq!(registry.decode_as::<Line>(&encode(&line).expect("encode")).expect("decode"), line);
    }

    #[test]
    fn test_positional_wire_shape() {
        let text = encode(&Point3d { x: 1.0, y: 2.0, z: 3.0 }).expect("encode");
        let value: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value, json!({"__cls__": "acge.Point3d", "__mbr__": [1.0, 2.0, 3.0]}));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let line = Line {
            color: None,
            layer: None,
            ..sample_line()
        };
        let value: Value = serde_json::from_str(&encode(&line).expect("encode")).expect("json");
        let members = value.get(MEMBER_KEY).and_then(Value::as_object).expect("members");
        assert!(members.contains_key("start"));
        assert!(!members.contains_key("color"));
        assert!(!members.contains_key("layer"));
    }

    #[test]
    fn test_explicit_null_is_indistinguishable_from_omitted() {
        let registry = registry();

        // An explicitly set JSON null does not survive the trip: it decodes as
        // "never set", which is the documented compaction.
        let cleared = Layer {
            name: "0".into(),
            is_off: None,
            description: Some(Value::Null),
        };
        let never_set = Layer {
            description: None,
            ..cleared.clone()
        };

        let cleared_text = encode(&cleared).expect("encode");
        assert_eq!(cleared_text, encode(&never_set).expect("encode"));

        let decoded: Layer = registry.decode_as(&cleared_text).expect("decode");
        assert_eq!(decoded, never_set);
        assert_ne!(decoded, cleared);
    }

    #[test]
    fn test_peer_type_hint_leads_named_members() {
        let layer = Layer {
            name: "walls".into(),
            is_off: Some(false),
            description: None,
        };
        let text = encode(&layer).expect("encode");
        assert!(text.contains(r#""__mbr__":{"$type":"SacadMgd.LayerTableRecord, SacadMgd""#));

        let decoded: Layer = registry().decode_as(&text).expect("decode");
        assert_eq!(decoded, layer);
    }

    #[test]
    fn test_unknown_fields_are_dropped() {
        let text = r#"{"__cls__": "acdb.LayerTableRecord",
                       "__mbr__": {"name": "0", "added_by_newer_peer": 42}}"#;
        let layer: Layer = registry().decode_as(text).expect("decode");
        assert_eq!(layer.name, "0");
    }

    #[test]
    fn test_excluded_fields_are_removed_before_decode() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Strict {
            name: String,
        }

        impl WireType for Strict {
            const TYPE_TAG: &'static str = "test.Strict";

            fn encode(&self) -> Result<Members> {
                Members::from_serde(self)
            }

            fn decode(members: Members, registry: &Registry) -> Result<Self> {
                members.into_serde(Self::TYPE_TAG, registry)
            }
        }

        let registry = registry();
        registry.register::<Strict>();
        let text = r#"{"__cls__": "test.Strict", "__mbr__": {"name": "a", "id": 7}}"#;
        assert!(registry.decode_as::<Strict>(text).is_err());

        registry.exclude_field("id");
        assert_eq!(
            registry.decode_as::<Strict>(text).expect("decode"),
            Strict { name: "a".into() }
        );
    }

    #[test]
    fn test_polymorphic_container_round_trip() {
        let registry = registry();
        let db = Database {
            entities: vec![Box::new(sample_line()), Box::new(Point3d { x: 1.0, y: 1.0, z: 1.0 })],
            layers: vec![(
                "walls".into(),
                Layer {
                    name: "walls".into(),
                    is_off: Some(true),
                    description: None,
                },
            )],
        };

        let decoded: Database = registry.decode_as(&encode(&db).expect("encode")).expect("decode");
        assert_eq!(decoded.entities.len(), 2);
        assert_eq!(decoded.entities[0].downcast_ref::<Line>(), Some(&sample_line()));
        assert!(decoded.entities[1].is::<Point3d>());
        assert_eq!(decoded.layers[0].0, "walls");
        assert_eq!(decoded.layers[0].1.is_off, Some(true));
    }

    #[test]
    fn test_encode_list_and_map() {
        let registry = registry();
        let a = Color(1);
        let b = Color(2);

        let list = encode_list([&a as &dyn WireObject, &b]).expect("encode");
        assert_eq!(registry.decode_list_as::<Color>(&list).expect("decode"), vec![a, b]);

        let map = encode_map([("first", &a as &dyn WireObject), ("second", &b as &dyn WireObject)]).expect("encode");
        let decoded = registry.decode_map_as::<Color>(&map).expect("decode");
        assert_eq!(decoded.get("second"), Some(&b));
    }

    #[test]
    fn test_nested_unknown_tag_fails_whole_decode() {
        let text = r#"{"__cls__": "acdb.Database",
                       "__mbr__": {"entities": [{"__cls__": "acdb.Spline", "__mbr__": {}}]}}"#;
        let err = registry().decode(text).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
