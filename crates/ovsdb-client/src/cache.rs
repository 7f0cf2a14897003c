//! In-memory mirror of database tables.
//!
//! The cache is fed by a single producer (the table update feed) and read by
//! any number of consumers. Reads take the shared lock only for the lookup
//! itself and return owned copies, so no caller ever holds the lock while
//! doing I/O.

use crate::error::{OvsdbError, Result};
use crate::update::{TableUpdates, UpdateKind};
use ovsdb_types::{Row, Uuid};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

type TableMirror = HashMap<Uuid, Row>;

/// Counts of row changes applied by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub inserted: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Updates for tables outside the mirrored schema.
    pub ignored: usize,
}

/// Mirror of a fixed set of tables of one database.
///
/// The set of mirrored tables is fixed at construction; asking for any other
/// table is a [`OvsdbError::Schema`] error.
///
/// # Example
///
/// ```
/// use ovsdb_client::{RowCache, TableUpdates};
/// use ovsdb_types::{Columns, Uuid};
///
/// let cache = RowCache::new(["NB_Global"]);
/// assert!(cache.rows("NB_Global").unwrap().is_empty());
/// assert!(cache.rows("Logical_Switch").is_err());
///
/// cache.apply(&TableUpdates::new().insert("NB_Global", Uuid::new_v4(), Columns::new()));
/// assert_eq!(cache.rows("NB_Global").unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RowCache {
    tables: RwLock<HashMap<String, TableMirror>>,
}

impl RowCache {
    /// Creates an empty mirror of the given tables.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: RwLock::new(
                tables
                    .into_iter()
                    .map(|t| (t.into(), TableMirror::new()))
                    .collect(),
            ),
        }
    }

    /// Returns true if the table is part of the mirrored schema.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Returns the names of all mirrored tables.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns copies of all rows of a table.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        self.read_table(table, |mirror| mirror.values().cloned().collect())
    }

    /// Returns a copy of one row, if mirrored.
    pub fn row(&self, table: &str, uuid: &Uuid) -> Result<Option<Row>> {
        self.read_table(table, |mirror| mirror.get(uuid).cloned())
    }

    /// Returns the number of rows mirrored for a table.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        self.read_table(table, HashMap::len)
    }

    /// Returns the only row of a singleton table.
    ///
    /// `Ok(None)` means the table has not been synced yet. More than one row
    /// violates the singleton invariant and is reported as a schema error.
    pub fn singleton(&self, table: &str) -> Result<Option<Row>> {
        let rows = self.read_table(table, |mirror| {
            if mirror.len() > 1 {
                Err(mirror.len())
            } else {
                Ok(mirror.values().next().cloned())
            }
        })?;
        rows.map_err(|count| {
            OvsdbError::schema(table, format!("expected at most one row, found {}", count))
        })
    }

    fn read_table<T>(&self, table: &str, f: impl FnOnce(&TableMirror) -> T) -> Result<T> {
        let tables = self.tables.read();
        let mirror = tables
            .get(table)
            .ok_or_else(|| OvsdbError::schema(table, "table is not mirrored"))?;
        Ok(f(mirror))
    }

    /// Applies a batch of row updates under a single exclusive lock.
    pub fn apply(&self, updates: &TableUpdates) -> ApplyStats {
        let mut stats = ApplyStats::default();
        let mut tables = self.tables.write();

        for (table, rows) in updates.tables() {
            let Some(mirror) = tables.get_mut(table) else {
                debug!(table, count = rows.len(), "Ignoring updates for unmirrored table");
                stats.ignored += rows.len();
                continue;
            };

            for (uuid, update) in rows {
                match (update.kind(), &update.new) {
                    (Some(UpdateKind::Delete), _) => {
                        if mirror.remove(uuid).is_some() {
                            stats.deleted += 1;
                        }
                    }
                    (Some(UpdateKind::Insert), Some(new)) => {
                        mirror.insert(*uuid, Row::new(*uuid, new.clone()));
                        stats.inserted += 1;
                    }
                    (Some(UpdateKind::Modify), Some(new)) => {
                        let row = match mirror.get(uuid) {
                            Some(existing) => existing.with_changes(new),
                            None => {
                                debug!(table, %uuid, "Modify for unknown row, inserting");
                                Row::new(*uuid, new.clone())
                            }
                        };
                        mirror.insert(*uuid, row);
                        stats.modified += 1;
                    }
                    _ => {}
                }
            }
        }

        debug!(
            inserted = stats.inserted,
            modified = stats.modified,
            deleted = stats.deleted,
            "Applied table updates"
        );
        stats
    }

    /// Replaces the full contents of one table under a single exclusive lock.
    pub fn replace_table(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        let mut tables = self.tables.write();
        let mirror = tables
            .get_mut(table)
            .ok_or_else(|| OvsdbError::schema(table, "table is not mirrored"))?;
        *mirror = rows.into_iter().map(|row| (row.uuid(), row)).collect();
        Ok(())
    }

    /// Replaces several tables under a single exclusive lock.
    ///
    /// Either every table is replaced or, if any is not mirrored, none is.
    pub fn replace_tables(&self, snapshot: Vec<(String, Vec<Row>)>) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some((table, _)) = snapshot.iter().find(|(t, _)| !tables.contains_key(t)) {
            return Err(OvsdbError::schema(table.as_str(), "table is not mirrored"));
        }
        for (table, rows) in snapshot {
            if let Some(mirror) = tables.get_mut(&table) {
                *mirror = rows.into_iter().map(|row| (row.uuid(), row)).collect();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovsdb_types::{Atom, Columns, Value};
    use pretty_assertions::assert_eq;

    fn columns(name: &str) -> Columns {
        let mut c = Columns::new();
        c.insert("name".to_string(), Value::Atom(Atom::string(name)));
        c
    }

    #[test]
    fn test_unknown_table_is_schema_error() {
        let cache = RowCache::new(["NB_Global"]);
        assert!(matches!(
            cache.rows("Logical_Router"),
            Err(OvsdbError::Schema { .. })
        ));
        assert!(matches!(
            cache.singleton("Logical_Router"),
            Err(OvsdbError::Schema { .. })
        ));
    }

    #[test]
    fn test_insert_modify_delete() {
        let cache = RowCache::new(["NB_Global"]);
        let uuid = Uuid::new_v4();

        let stats = cache.apply(&TableUpdates::new().insert("NB_Global", uuid, columns("a")));
        assert_eq!(stats.inserted, 1);
        assert_eq!(cache.row_count("NB_Global").unwrap(), 1);

        let stats = cache.apply(&TableUpdates::new().modify("NB_Global", uuid, columns("b")));
        assert_eq!(stats.modified, 1);
        let row = cache.row("NB_Global", &uuid).unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&Value::Atom(Atom::string("b"))));

        let stats = cache.apply(&TableUpdates::new().delete("NB_Global", uuid));
        assert_eq!(stats.deleted, 1);
        assert!(cache.rows("NB_Global").unwrap().is_empty());
    }

    #[test]
    fn test_modify_keeps_unlisted_columns() {
        let cache = RowCache::new(["NB_Global"]);
        let uuid = Uuid::new_v4();
        let mut initial = columns("a");
        initial.insert("nb_cfg".to_string(), Value::Atom(Atom::Integer(3)));
        cache.apply(&TableUpdates::new().insert("NB_Global", uuid, initial));

        cache.apply(&TableUpdates::new().modify("NB_Global", uuid, columns("b")));

        let row = cache.row("NB_Global", &uuid).unwrap().unwrap();
        assert_eq!(row.get("nb_cfg"), Some(&Value::Atom(Atom::Integer(3))));
        assert_eq!(row.get("name"), Some(&Value::Atom(Atom::string("b"))));
    }

    #[test]
    fn test_updates_for_unmirrored_tables_are_ignored() {
        let cache = RowCache::new(["NB_Global"]);
        let stats = cache.apply(&TableUpdates::new().insert(
            "Logical_Switch",
            Uuid::new_v4(),
            columns("ls0"),
        ));
        assert_eq!(stats.ignored, 1);
        assert!(!cache.has_table("Logical_Switch"));
    }

    #[test]
    fn test_singleton() {
        let cache = RowCache::new(["SB_Global"]);
        assert_eq!(cache.singleton("SB_Global").unwrap(), None);

        let first = Uuid::new_v4();
        cache.apply(&TableUpdates::new().insert("SB_Global", first, columns("a")));
        assert_eq!(cache.singleton("SB_Global").unwrap().unwrap().uuid(), first);

        cache.apply(&TableUpdates::new().insert("SB_Global", Uuid::new_v4(), columns("b")));
        assert!(matches!(
            cache.singleton("SB_Global"),
            Err(OvsdbError::Schema { .. })
        ));
    }

    #[test]
    fn test_replace_table() {
        let cache = RowCache::new(["NB_Global"]);
        cache.apply(&TableUpdates::new().insert("NB_Global", Uuid::new_v4(), columns("old")));

        let uuid = Uuid::new_v4();
        cache
            .replace_table("NB_Global", vec![Row::new(uuid, columns("new"))])
            .unwrap();

        let rows = cache.rows("NB_Global").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].uuid(), uuid);

        assert!(cache.replace_table("Nope", vec![]).is_err());
    }

    #[test]
    fn test_replace_tables_is_all_or_nothing() {
        let cache = RowCache::new(["NB_Global", "SB_Global"]);
        let old = Uuid::new_v4();
        cache.apply(&TableUpdates::new().insert("NB_Global", old, columns("old")));

        let rejected = cache.replace_tables(vec![
            ("NB_Global".to_string(), vec![]),
            ("Nope".to_string(), vec![]),
        ]);
        assert!(matches!(rejected, Err(OvsdbError::Schema { .. })));
        assert_eq!(cache.rows("NB_Global").unwrap()[0].uuid(), old);

        let nb = Uuid::new_v4();
        let sb = Uuid::new_v4();
        cache
            .replace_tables(vec![
                ("NB_Global".to_string(), vec![Row::new(nb, columns("nb"))]),
                ("SB_Global".to_string(), vec![Row::new(sb, columns("sb"))]),
            ])
            .unwrap();
        assert_eq!(cache.rows("NB_Global").unwrap()[0].uuid(), nb);
        assert_eq!(cache.rows("SB_Global").unwrap()[0].uuid(), sb);
    }

    #[test]
    fn test_table_names_sorted() {
        let cache = RowCache::new(["SB_Global", "NB_Global"]);
        assert_eq!(cache.table_names(), vec!["NB_Global", "SB_Global"]);
    }
}
