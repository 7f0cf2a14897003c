//! Column values: atoms, sets and maps.

use crate::{Atom, ParseError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use std::collections::BTreeMap;

/// The value stored in a single column of a row.
///
/// Maps keep their pairs in wire order. Atoms are not totally ordered
/// (reals), so a `Vec` is used instead of an ordered map.
///
/// # Examples
///
/// ```
/// use ovsdb_types::Value;
/// use std::collections::BTreeMap;
///
/// let mut options = BTreeMap::new();
/// options.insert("e2e_timestamp".to_string(), "1700000000".to_string());
///
/// let value = Value::string_map(&options);
/// assert_eq!(
///     serde_json::to_string(&value).unwrap(),
///     r#"["map",[["e2e_timestamp","1700000000"]]]"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Atom(Atom),
    Set(Vec<Atom>),
    Map(Vec<(Atom, Atom)>),
}

impl Value {
    /// Builds a map value from string keys and values.
    pub fn string_map(map: &BTreeMap<String, String>) -> Self {
        Value::Map(
            map.iter()
                .map(|(k, v)| (Atom::string(k.as_str()), Atom::string(v.as_str())))
                .collect(),
        )
    }

    /// Builds a set value from strings.
    pub fn string_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Set(items.into_iter().map(|s| Atom::String(s.into())).collect())
    }

    /// Returns "atom", "set" or "map".
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Atom(_) => "atom",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Returns the map pairs, if this is a map value.
    pub fn as_map(&self) -> Option<&[(Atom, Atom)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Returns the atom, if this is a scalar value.
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Value::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// Collects the string/string pairs of a map value.
    ///
    /// Pairs whose key or value is not a string are skipped. Returns `None`
    /// if this value is not a map.
    pub fn to_string_map(&self) -> Option<BTreeMap<String, String>> {
        let pairs = self.as_map()?;
        Some(
            pairs
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                .collect(),
        )
    }

    /// Converts the value to its JSON notation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Atom(a) => a.to_json(),
            Value::Set(items) => {
                let items: Vec<_> = items.iter().map(Atom::to_json).collect();
                json!(["set", items])
            }
            Value::Map(pairs) => {
                let pairs: Vec<_> = pairs
                    .iter()
                    .map(|(k, v)| json!([k.to_json(), v.to_json()]))
                    .collect();
                json!(["map", pairs])
            }
        }
    }

    /// Decodes a value from its JSON notation.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ParseError> {
        let tagged = value
            .as_array()
            .filter(|a| a.len() == 2)
            .and_then(|a| a[0].as_str().map(|tag| (tag, &a[1])));

        match tagged {
            Some(("set", items)) => {
                let items = items
                    .as_array()
                    .ok_or_else(|| ParseError::InvalidSet(value.to_string()))?;
                items
                    .iter()
                    .map(Atom::from_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Set)
            }
            Some(("map", pairs)) => {
                let pairs = pairs
                    .as_array()
                    .ok_or_else(|| ParseError::InvalidMap(value.to_string()))?;
                pairs
                    .iter()
                    .map(|pair| match pair.as_array().map(Vec::as_slice) {
                        Some([k, v]) => Ok((Atom::from_json(k)?, Atom::from_json(v)?)),
                        _ => Err(ParseError::InvalidMap(pair.to_string())),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Map)
            }
            _ => Atom::from_json(value).map(Value::Atom),
        }
    }
}

impl From<Atom> for Value {
    fn from(atom: Atom) -> Self {
        Value::Atom(atom)
    }
}

impl From<&BTreeMap<String, String>> for Value {
    fn from(map: &BTreeMap<String, String>) -> Self {
        Value::string_map(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_map_notation() {
        let value = Value::from_json(&json!(["map", [["a", "1"], ["b", "2"]]])).unwrap();
        let map = value.to_string_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_string_map_skips_non_string_pairs() {
        let value = Value::from_json(&json!([
            "map",
            [["a", "1"], ["b", 2], [3, "c"], ["d", true]]
        ]))
        .unwrap();

        let map = value.to_string_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_to_string_map_rejects_non_map() {
        let value = Value::from_json(&json!(["set", ["a", "b"]])).unwrap();
        assert!(value.to_string_map().is_none());
        assert!(Value::Atom(Atom::string("x")).to_string_map().is_none());
    }

    #[test]
    fn test_set_notation() {
        let value = Value::string_set(["x", "y"]);
        assert_eq!(value.to_json(), json!(["set", ["x", "y"]]));
        assert_eq!(Value::from_json(&value.to_json()).unwrap(), value);
    }

    #[test]
    fn test_uuid_is_atom_not_set() {
        let value = Value::from_json(&json!([
            "uuid",
            "36bd6a6f-3bb5-4b8d-9dd4-33a0b5e17be8"
        ]))
        .unwrap();
        assert!(matches!(value, Value::Atom(Atom::Uuid(_))));
    }

    #[test]
    fn test_malformed_map() {
        assert!(Value::from_json(&json!(["map", "oops"])).is_err());
        assert!(Value::from_json(&json!(["map", [["only-key"]]])).is_err());
    }

    #[test]
    fn test_empty_map() {
        let value = Value::from_json(&json!(["map", []])).unwrap();
        assert_eq!(value.to_string_map(), Some(BTreeMap::new()));
    }
}
