//! OVSDB transaction operations and their per-operation outcomes.
//!
//! Operations serialize to the `transact` notation of RFC 7047 section 5.2:
//!
//! ```text
//! {"op": "update", "table": "NB_Global",
//!  "where": [["_uuid", "==", ["uuid", "..."]]],
//!  "row": {"options": ["map", [["e2e_timestamp", "1700000000"]]]}}
//! ```

use crate::error::{OvsdbError, Result};
use ovsdb_types::{Atom, Columns, Row, Uuid, Value};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;

/// Comparison function used in a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Includes,
    Excludes,
}

impl Function {
    /// Returns the wire name of the function.
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Equal => "==",
            Function::NotEqual => "!=",
            Function::LessThan => "<",
            Function::LessOrEqual => "<=",
            Function::GreaterThan => ">",
            Function::GreaterOrEqual => ">=",
            Function::Includes => "includes",
            Function::Excludes => "excludes",
        }
    }
}

/// A single `[column, function, value]` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub function: Function,
    pub value: Value,
}

impl Condition {
    /// Creates a new condition.
    pub fn new(column: impl Into<String>, function: Function, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            function,
            value: value.into(),
        }
    }

    /// Matches exactly the row with the given identifier.
    pub fn uuid_eq(uuid: Uuid) -> Self {
        Self::new("_uuid", Function::Equal, Atom::Uuid(uuid))
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.column)?;
        seq.serialize_element(self.function.as_str())?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

/// Mutator applied by a `mutate` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// Adds set elements or map pairs. Map pairs whose key already exists
    /// are left untouched by the server.
    Insert,
    /// Removes set elements, map pairs, or map keys (when given a set).
    Delete,
}

impl Mutator {
    /// Returns the wire name of the mutator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutator::Add => "+=",
            Mutator::Subtract => "-=",
            Mutator::Multiply => "*=",
            Mutator::Divide => "/=",
            Mutator::Modulo => "%=",
            Mutator::Insert => "insert",
            Mutator::Delete => "delete",
        }
    }
}

/// A single `[column, mutator, value]` mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub column: String,
    pub mutator: Mutator,
    pub value: Value,
}

impl Mutation {
    /// Creates a new mutation.
    pub fn new(column: impl Into<String>, mutator: Mutator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            mutator,
            value: value.into(),
        }
    }
}

impl Serialize for Mutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.column)?;
        seq.serialize_element(self.mutator.as_str())?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

/// One operation of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Insert {
        table: String,
        row: Columns,
        #[serde(rename = "uuid-name", skip_serializing_if = "Option::is_none")]
        uuid_name: Option<String>,
    },
    Update {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
        row: Columns,
    },
    Mutate {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
        mutations: Vec<Mutation>,
    },
    Delete {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
    },
    Select {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
        #[serde(skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
}

impl Operation {
    /// Returns the table this operation targets.
    pub fn table(&self) -> &str {
        match self {
            Operation::Insert { table, .. }
            | Operation::Update { table, .. }
            | Operation::Mutate { table, .. }
            | Operation::Delete { table, .. }
            | Operation::Select { table, .. } => table,
        }
    }

    /// Returns the wire name of the operation.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Mutate { .. } => "mutate",
            Operation::Delete { .. } => "delete",
            Operation::Select { .. } => "select",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.table())
    }
}

/// Outcome of a single successful operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationResult {
    /// Rows affected (update, mutate, delete).
    pub count: Option<u64>,
    /// Identifier of the inserted row (insert).
    pub uuid: Option<Uuid>,
    /// Selected rows (select).
    pub rows: Option<Vec<Row>>,
}

/// Decoded element of a `transact` reply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReplyElement {
    Success(OperationResult),
    Failure {
        error: String,
        details: Option<String>,
    },
}

impl ReplyElement {
    /// Decodes one element of a `transact` reply.
    pub(crate) fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = match value.as_object() {
            Some(o) => o,
            // null marks an operation skipped after an earlier failure
            None if value.is_null() => return Ok(Self::Success(OperationResult::default())),
            None => {
                return Err(OvsdbError::protocol(format!(
                    "unexpected operation result: {}",
                    value
                )))
            }
        };

        if let Some(error) = object.get("error").and_then(|e| e.as_str()) {
            let details = object
                .get("details")
                .and_then(|d| d.as_str())
                .map(str::to_string);
            return Ok(Self::Failure {
                error: error.to_string(),
                details,
            });
        }

        let count = object.get("count").and_then(|c| c.as_u64());

        let uuid = match object.get("uuid") {
            Some(raw) => match Atom::from_json(raw) {
                Ok(Atom::Uuid(u)) => Some(u),
                _ => {
                    return Err(OvsdbError::protocol(format!(
                        "invalid uuid in result: {}",
                        raw
                    )))
                }
            },
            None => None,
        };

        let rows = match object.get("rows").and_then(|r| r.as_array()) {
            Some(raw_rows) => Some(
                raw_rows
                    .iter()
                    .map(|raw| {
                        let columns = raw.as_object().ok_or_else(|| {
                            OvsdbError::protocol(format!("selected row is not an object: {}", raw))
                        })?;
                        Row::from_json(None, columns)
                            .map_err(|e| OvsdbError::protocol(e.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        Ok(Self::Success(OperationResult { count, uuid, rows }))
    }
}
