//! OVSDB data model types for the OVN northbound and southbound databases.
//!
//! This crate provides type-safe representations of the values carried by
//! the OVSDB JSON-RPC protocol (RFC 7047):
//!
//! - [`Atom`]: scalar values (integer, real, boolean, string, uuid)
//! - [`Value`]: a column value, either an atom, a set or a key/value map
//! - [`Row`]: a row identifier plus its column values
//!
//! All types serialize to and from the protocol's JSON notation, e.g. a map
//! column is `["map", [["k", "v"], ...]]` and a uuid is `["uuid", "..."]`.

mod atom;
mod row;
mod value;

pub use atom::Atom;
pub use row::{Columns, Row};
pub use value::Value;

/// Re-exported so callers do not need a direct `uuid` dependency.
pub use uuid::Uuid;

/// Common error type for JSON notation decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid atom: {0}")]
    InvalidAtom(String),

    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    #[error("invalid set notation: {0}")]
    InvalidSet(String),

    #[error("invalid map notation: {0}")]
    InvalidMap(String),
}
