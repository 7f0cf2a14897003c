//! Table update batches delivered by the change feed.

use ovsdb_types::{Columns, Uuid};
use std::collections::BTreeMap;

/// Kind of change a [`RowUpdate`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Row added (`old` absent).
    Insert,
    /// Row changed (`old` and `new` present).
    Modify,
    /// Row removed (`new` absent).
    Delete,
}

/// Change to one row: the columns before and after.
///
/// `new` holds the columns to store. For a modify, columns not listed in
/// `new` keep their cached value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowUpdate {
    pub old: Option<Columns>,
    pub new: Option<Columns>,
}

impl RowUpdate {
    /// Returns the kind of change, or `None` for an empty update.
    pub fn kind(&self) -> Option<UpdateKind> {
        match (&self.old, &self.new) {
            (None, Some(_)) => Some(UpdateKind::Insert),
            (Some(_), Some(_)) => Some(UpdateKind::Modify),
            (Some(_), None) => Some(UpdateKind::Delete),
            (None, None) => None,
        }
    }
}

/// A batch of row changes, grouped by table.
///
/// A batch is applied to the cache atomically: readers see either none or
/// all of it.
///
/// # Example
///
/// ```
/// use ovsdb_client::TableUpdates;
/// use ovsdb_types::{Columns, Uuid};
///
/// let uuid = Uuid::new_v4();
/// let updates = TableUpdates::new()
///     .insert("NB_Global", uuid, Columns::new())
///     .delete("SB_Global", Uuid::new_v4());
/// assert_eq!(updates.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableUpdates {
    tables: BTreeMap<String, BTreeMap<Uuid, RowUpdate>>,
}

impl TableUpdates {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary row update.
    pub fn with_update(mut self, table: impl Into<String>, uuid: Uuid, update: RowUpdate) -> Self {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(uuid, update);
        self
    }

    /// Adds a row insertion.
    pub fn insert(self, table: impl Into<String>, uuid: Uuid, columns: Columns) -> Self {
        self.with_update(
            table,
            uuid,
            RowUpdate {
                old: None,
                new: Some(columns),
            },
        )
    }

    /// Adds a row modification carrying the changed columns.
    pub fn modify(self, table: impl Into<String>, uuid: Uuid, changes: Columns) -> Self {
        self.with_update(
            table,
            uuid,
            RowUpdate {
                old: Some(Columns::new()),
                new: Some(changes),
            },
        )
    }

    /// Adds a row deletion.
    pub fn delete(self, table: impl Into<String>, uuid: Uuid) -> Self {
        self.with_update(
            table,
            uuid,
            RowUpdate {
                old: Some(Columns::new()),
                new: None,
            },
        )
    }

    /// Returns the number of row updates in the batch.
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    /// Returns true if the batch carries no row updates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(table, rows)` groups.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &BTreeMap<Uuid, RowUpdate>)> {
        self.tables.iter().map(|(t, rows)| (t.as_str(), rows))
    }
}
