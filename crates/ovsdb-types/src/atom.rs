//! Scalar OVSDB values.

use crate::ParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use std::fmt;
use uuid::Uuid;

/// A single OVSDB atom.
///
/// # Examples
///
/// ```
/// use ovsdb_types::Atom;
///
/// let atom: Atom = serde_json::from_str(r#""1700000000""#).unwrap();
/// assert_eq!(atom.as_str(), Some("1700000000"));
///
/// let uuid: Atom = serde_json::from_str(
///     r#"["uuid", "36bd6a6f-3bb5-4b8d-9dd4-33a0b5e17be8"]"#,
/// ).unwrap();
/// assert!(uuid.as_uuid().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    /// A reference to an existing row.
    Uuid(Uuid),
    /// A symbolic name for a row inserted earlier in the same transaction.
    NamedUuid(String),
}

impl Atom {
    /// Creates a string atom.
    pub fn string(s: impl Into<String>) -> Self {
        Atom::String(s.into())
    }

    /// Returns the string payload, if this is a string atom.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Atom::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the uuid payload, if this is a uuid atom.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Atom::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer atom.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Atom::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts the atom to its JSON notation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Atom::Integer(i) => json!(i),
            Atom::Real(r) => json!(r),
            Atom::Boolean(b) => json!(b),
            Atom::String(s) => json!(s),
            Atom::Uuid(u) => json!(["uuid", u.to_string()]),
            Atom::NamedUuid(n) => json!(["named-uuid", n]),
        }
    }

    /// Decodes an atom from its JSON notation.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ParseError> {
        match value {
            serde_json::Value::Bool(b) => Ok(Atom::Boolean(*b)),
            serde_json::Value::String(s) => Ok(Atom::String(s.clone())),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Atom::Integer(i)),
                None => n
                    .as_f64()
                    .map(Atom::Real)
                    .ok_or_else(|| ParseError::InvalidAtom(n.to_string())),
            },
            serde_json::Value::Array(pair) if pair.len() == 2 => {
                let payload = pair[1]
                    .as_str()
                    .ok_or_else(|| ParseError::InvalidAtom(value.to_string()))?;
                match pair[0].as_str() {
                    Some("uuid") => Uuid::parse_str(payload)
                        .map(Atom::Uuid)
                        .map_err(|_| ParseError::InvalidUuid(payload.to_string())),
                    Some("named-uuid") => Ok(Atom::NamedUuid(payload.to_string())),
                    _ => Err(ParseError::InvalidAtom(value.to_string())),
                }
            }
            other => Err(ParseError::InvalidAtom(other.to_string())),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Integer(i) => write!(f, "{}", i),
            Atom::Real(r) => write!(f, "{}", r),
            Atom::Boolean(b) => write!(f, "{}", b),
            Atom::String(s) => write!(f, "{:?}", s),
            Atom::Uuid(u) => write!(f, "{}", u),
            Atom::NamedUuid(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::String(s.to_string())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::String(s)
    }
}

impl From<i64> for Atom {
    fn from(i: i64) -> Self {
        Atom::Integer(i)
    }
}

impl From<bool> for Atom {
    fn from(b: bool) -> Self {
        Atom::Boolean(b)
    }
}

impl From<Uuid> for Atom {
    fn from(u: Uuid) -> Self {
        Atom::Uuid(u)
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Atom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Atom::from_json(&raw).map_err(serde::de::Error::custom)
    }
}
