//! Rows as mirrored from a database table.

use crate::{ParseError, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Column name to value mapping.
pub type Columns = BTreeMap<String, Value>;

/// A database row: its server-assigned identifier plus column values.
///
/// Rows are immutable once mirrored; changes arrive as new rows from the
/// table update feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    uuid: Uuid,
    columns: Columns,
}

impl Row {
    /// Creates a new row.
    pub fn new(uuid: Uuid, columns: Columns) -> Self {
        Self { uuid, columns }
    }

    /// Returns the row identifier.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns all column values.
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Returns a copy of this row with `changes` overlaid on its columns.
    pub fn with_changes(&self, changes: &Columns) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            uuid: self.uuid,
            columns,
        }
    }

    /// Decodes a row from a JSON object of columns.
    ///
    /// The `_uuid` column, when present, is used as the row identifier and is
    /// not kept as a regular column.
    pub fn from_json(
        fallback_uuid: Option<Uuid>,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ParseError> {
        let mut uuid = fallback_uuid;
        let mut columns = Columns::new();
        for (name, raw) in object {
            let value = Value::from_json(raw)?;
            if name == "_uuid" {
                uuid = value.as_atom().and_then(|a| a.as_uuid());
                continue;
            }
            columns.insert(name.clone(), value);
        }
        let uuid = uuid.ok_or_else(|| ParseError::InvalidUuid("missing _uuid".to_string()))?;
        Ok(Self { uuid, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Atom;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_json_uses_uuid_column() {
        let u = Uuid::new_v4();
        let object = json!({
            "_uuid": ["uuid", u.to_string()],
            "name": "global",
        });
        let row = Row::from_json(None, object.as_object().unwrap()).unwrap();
        assert_eq!(row.uuid(), u);
        assert!(row.get("_uuid").is_none());
        assert_eq!(row.get("name"), Some(&Value::Atom(Atom::string("global"))));
    }

    #[test]
    fn test_from_json_requires_uuid() {
        let object = json!({"name": "global"});
        assert!(Row::from_json(None, object.as_object().unwrap()).is_err());

        let u = Uuid::new_v4();
        let row = Row::from_json(Some(u), object.as_object().unwrap()).unwrap();
        assert_eq!(row.uuid(), u);
    }

    #[test]
    fn test_with_changes_overlays_columns() {
        let mut columns = Columns::new();
        columns.insert("a".to_string(), Value::Atom(Atom::Integer(1)));
        columns.insert("b".to_string(), Value::Atom(Atom::Integer(2)));
        let row = Row::new(Uuid::new_v4(), columns);

        let mut changes = Columns::new();
        changes.insert("b".to_string(), Value::Atom(Atom::Integer(20)));
        let changed = row.with_changes(&changes);

        assert_eq!(changed.uuid(), row.uuid());
        assert_eq!(changed.get("a"), Some(&Value::Atom(Atom::Integer(1))));
        assert_eq!(changed.get("b"), Some(&Value::Atom(Atom::Integer(20))));
        // original untouched
        assert_eq!(row.get("b"), Some(&Value::Atom(Atom::Integer(2))));
    }
}
