//! Storage strategies for bridged values.
//!
//! A type is stored one of two ways, chosen at compile time by which
//! [`Storable`] implementation it has:
//!
//! - Native: numbers, booleans, strings, URLs, byte blobs and string lists
//!   map onto a [`StoreValue`] variant directly.
//! - Structured: any serde type opted in with [`structured_storable!`] is
//!   serialized to JSON with sorted object keys and stored as
//!   [`StoreValue::Data`]. Sorted keys make the stored bytes reproducible.
//!
//! `Option<T>` uses `T`'s strategy; `None` clears the entry.
//!
//! [`structured_storable!`]: crate::structured_storable

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::store::StoreValue;
use crate::error::{BridgeError, Result};

/// A value a [`KeyValueBridge`](super::KeyValueBridge) can persist.
pub trait Storable: Sized {
    /// Encode for storage. `Ok(None)` means "clear the entry".
    fn encode(&self) -> Result<Option<StoreValue>>;

    /// Decode a stored value.
    fn decode(value: StoreValue) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, found: &StoreValue) -> Result<T> {
    Err(BridgeError::TypeMismatch {
        expected,
        found: found.kind(),
    })
}

macro_rules! native_storable {
    ($ty:ty, $variant:ident, $expected:literal) => {
        impl Storable for $ty {
            fn encode(&self) -> Result<Option<StoreValue>> {
                Ok(Some(StoreValue::$variant(self.clone())))
            }

            fn decode(value: StoreValue) -> Result<Self> {
                match value {
                    StoreValue::$variant(inner) => Ok(inner),
                    other => mismatch($expected, &other),
                }
            }
        }
    };
}

native_storable!(i64, Int, "int");
native_storable!(bool, Bool, "bool");
native_storable!(String, String, "string");
native_storable!(Url, Url, "url");
native_storable!(Vec<u8>, Data, "data");
native_storable!(Vec<String>, StringList, "string list");

impl Storable for i32 {
    fn encode(&self) -> Result<Option<StoreValue>> {
        Ok(Some(StoreValue::Int(i64::from(*self))))
    }

    fn decode(value: StoreValue) -> Result<Self> {
        match value {
            StoreValue::Int(inner) => i32::try_from(inner).map_err(|err| BridgeError::Decode {
                key: String::new(),
                reason: err.to_string(),
            }),
            other => mismatch("int", &other),
        }
    }
}

impl Storable for f32 {
    fn encode(&self) -> Result<Option<StoreValue>> {
        Ok(Some(StoreValue::Float(*self)))
    }

    fn decode(value: StoreValue) -> Result<Self> {
        match value {
            StoreValue::Float(inner) => Ok(inner),
            other => mismatch("float", &other),
        }
    }
}

impl Storable for f64 {
    fn encode(&self) -> Result<Option<StoreValue>> {
        Ok(Some(StoreValue::Double(*self)))
    }

    // A float written by another client widens losslessly.
    fn decode(value: StoreValue) -> Result<Self> {
        match value {
            StoreValue::Double(inner) => Ok(inner),
            StoreValue::Float(inner) => Ok(f64::from(inner)),
            other => mismatch("double", &other),
        }
    }
}

impl<T: Storable> Storable for Option<T> {
    fn encode(&self) -> Result<Option<StoreValue>> {
        match self {
            Some(inner) => inner.encode(),
            None => Ok(None),
        }
    }

    fn decode(value: StoreValue) -> Result<Self> {
        T::decode(value).map(Some)
    }
}

/// Encode a structured value as sorted-key JSON bytes.
///
/// Object keys are sorted at every depth, regardless of field declaration
/// order and of how `serde_json` orders its maps.
pub fn encode_structured<T: Serialize>(value: &T) -> Result<StoreValue> {
    let tree = serde_json::to_value(value).map_err(|err| BridgeError::Encode {
        reason: err.to_string(),
    })?;
    let bytes = serde_json::to_vec(&sort_keys(tree)).map_err(|err| BridgeError::Encode {
        reason: err.to_string(),
    })?;
    Ok(StoreValue::Data(bytes))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Decode a structured value from JSON bytes.
pub fn decode_structured<T: DeserializeOwned>(value: StoreValue) -> Result<T> {
    match value {
        StoreValue::Data(bytes) => {
            serde_json::from_slice(&bytes).map_err(|err| BridgeError::Decode {
                key: String::new(),
                reason: err.to_string(),
            })
        }
        other => mismatch("data", &other),
    }
}

/// Store one or more serde types through the structured (JSON) path.
///
/// ```rust,ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Profile { name: String, age: u32 }
///
/// tether_core::structured_storable!(Profile);
/// ```
#[macro_export]
macro_rules! structured_storable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::kv::Storable for $ty {
                fn encode(&self) -> $crate::Result<::std::option::Option<$crate::kv::StoreValue>> {
                    $crate::kv::encode_structured(self).map(::std::option::Option::Some)
                }

                fn decode(value: $crate::kv::StoreValue) -> $crate::Result<Self> {
                    $crate::kv::decode_structured(value)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
        tags: Vec<String>,
    }

    crate::structured_storable!(Profile);

    #[test]
    fn native_values_skip_encoding() {
        assert_eq!(
            "hi".to_string().encode(),
            Ok(Some(StoreValue::String("hi".into())))
        );
        assert_eq!(7i32.encode(), Ok(Some(StoreValue::Int(7))));
        assert_eq!(
            vec!["a".to_string()].encode(),
            Ok(Some(StoreValue::StringList(vec!["a".into()])))
        );
    }

    #[test]
    fn wrong_native_kind_is_a_mismatch() {
        let err = bool::decode(StoreValue::String("true".into()));
        assert_eq!(
            err,
            Err(BridgeError::TypeMismatch {
                expected: "bool",
                found: "string"
            })
        );
    }

    #[test]
    fn i32_rejects_out_of_range() {
        assert!(i32::decode(StoreValue::Int(i64::MAX)).is_err());
        assert_eq!(i32::decode(StoreValue::Int(-3)), Ok(-3));
    }

    #[test]
    fn double_accepts_float() {
        assert_eq!(f64::decode(StoreValue::Float(0.5)), Ok(0.5));
    }

    #[test]
    fn optional_primitive_stays_native() {
        assert_eq!(Some(3i64).encode(), Ok(Some(StoreValue::Int(3))));
        assert_eq!(None::<i64>.encode(), Ok(None));
        assert_eq!(Option::<i64>::decode(StoreValue::Int(3)), Ok(Some(3)));
    }

    #[test]
    fn structured_round_trip() {
        let profile = Profile {
            name: "Ada".into(),
            age: 36,
            tags: vec!["math".into(), "engines".into()],
        };

        let stored = profile.encode().unwrap().unwrap();
        assert!(matches!(stored, StoreValue::Data(_)));
        assert_eq!(Profile::decode(stored), Ok(profile));
    }

    #[test]
    fn structured_keys_are_sorted() {
        let profile = Profile {
            name: "Ada".into(),
            age: 36,
            tags: vec![],
        };

        let Ok(StoreValue::Data(bytes)) = encode_structured(&profile) else {
            panic!("structured values are stored as data");
        };
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"age":36,"name":"Ada","tags":[]}"#
        );
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pane {
        width: u32,
        anchor: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Workspace {
        title: String,
        panes: HashMap<String, Pane>,
        history: Vec<Pane>,
    }

    crate::structured_storable!(Workspace);

    #[test]
    fn nested_keys_are_sorted_at_every_depth() {
        let mut panes = HashMap::new();
        for name in ["zeta", "alpha", "mid"] {
            panes.insert(
                name.to_string(),
                Pane {
                    width: 1,
                    anchor: name.to_string(),
                },
            );
        }
        let workspace = Workspace {
            title: "main".into(),
            panes,
            history: vec![Pane {
                width: 2,
                anchor: "left".into(),
            }],
        };

        let Ok(StoreValue::Data(bytes)) = encode_structured(&workspace) else {
            panic!("structured values are stored as data");
        };
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            concat!(
                r#"{"history":[{"anchor":"left","width":2}],"#,
                r#""panes":{"alpha":{"anchor":"alpha","width":1},"#,
                r#""mid":{"anchor":"mid","width":1},"#,
                r#""zeta":{"anchor":"zeta","width":1}},"#,
                r#""title":"main"}"#
            )
        );
    }

    #[test]
    fn sort_keys_reorders_declaration_order_objects() {
        let mut unordered = serde_json::Map::new();
        unordered.insert("b".into(), Value::from(1));
        unordered.insert("a".into(), Value::from(2));

        let sorted = sort_keys(Value::Object(unordered));
        let keys: Vec<&String> = sorted.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn structured_decode_of_garbage_fails() {
        let result = Profile::decode(StoreValue::Data(b"not json".to_vec()));
        assert!(matches!(result, Err(BridgeError::Decode { .. })));
    }
}
