//! Access to the `options` column of the singleton global tables.
//!
//! `NB_Global` and `SB_Global` each hold exactly one row once synced. Its
//! `options` column is a free-form string map shared by every OVN component,
//! so writers must be careful not to clobber keys they do not own.

use ovsdb_client::{Command, Condition, Mutation, Mutator, OvsdbClient, OvsdbError, Result};
use ovsdb_types::{Columns, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Northbound global table.
pub const NB_GLOBAL: &str = "NB_Global";
/// Southbound global table.
pub const SB_GLOBAL: &str = "SB_Global";
/// Column holding the options map.
pub const OPTIONS_COLUMN: &str = "options";

/// How [`set_options`] writes the options map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionsStrategy {
    /// Set only the supplied keys. Other keys are untouched and the row id
    /// is not needed.
    Merge,
    /// Overwrite the whole column of the row resolved from the cache.
    /// Callers read the current map first and write it back modified.
    #[default]
    Replace,
}

impl fmt::Display for OptionsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsStrategy::Merge => write!(f, "merge"),
            OptionsStrategy::Replace => write!(f, "replace"),
        }
    }
}

fn check_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(OvsdbError::invalid_argument("empty table name"));
    }
    Ok(())
}

/// Returns a copy of the options map of a singleton table.
///
/// Pairs whose key or value is not a string are skipped.
///
/// # Errors
///
/// - `NotFound` if the table has no row yet
/// - `Schema` if the table is not mirrored, has several rows, or its row
///   lacks the options column
/// - `TypeMismatch` if the options column is not a map
pub fn get_options(client: &OvsdbClient, table: &str) -> Result<BTreeMap<String, String>> {
    check_table(table)?;
    let row = client
        .cache()
        .singleton(table)?
        .ok_or_else(|| OvsdbError::not_found(table))?;

    let value = row
        .get(OPTIONS_COLUMN)
        .ok_or_else(|| OvsdbError::schema(table, "options column is not mirrored"))?;

    value.to_string_map().ok_or_else(|| {
        OvsdbError::type_mismatch(
            table,
            OPTIONS_COLUMN,
            format!("expected a map, found a {}", value.kind()),
        )
    })
}

/// Builds a command writing `options` to a singleton table.
///
/// Nothing is sent until the command is executed.
///
/// # Errors
///
/// - `InvalidArgument` on an empty table name or empty map
/// - `NotFound` if the row cannot be resolved (replace only)
/// - `Schema` if the table is not mirrored
pub fn set_options(
    client: &OvsdbClient,
    table: &str,
    options: &BTreeMap<String, String>,
    strategy: OptionsStrategy,
) -> Result<Command> {
    check_table(table)?;
    if options.is_empty() {
        return Err(OvsdbError::invalid_argument(format!(
            "empty options map for {}",
            table
        )));
    }

    let command = match strategy {
        OptionsStrategy::Replace => {
            let row = client
                .cache()
                .singleton(table)?
                .ok_or_else(|| OvsdbError::not_found(table))?;
            let mut columns = Columns::new();
            columns.insert(OPTIONS_COLUMN.to_string(), Value::string_map(options));
            client.update(table, vec![Condition::uuid_eq(row.uuid())], columns)?
        }
        OptionsStrategy::Merge => {
            // Map insert keeps existing values, so supplied keys are deleted first.
            let mutations = vec![
                Mutation::new(
                    OPTIONS_COLUMN,
                    Mutator::Delete,
                    Value::string_set(options.keys().cloned()),
                ),
                Mutation::new(OPTIONS_COLUMN, Mutator::Insert, Value::string_map(options)),
            ];
            client.mutate(table, vec![], mutations)?
        }
    };

    debug!(table, %strategy, keys = options.len(), "Built options command");
    Ok(command.named(format!("{}:set_options", table)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovsdb_client::Operation;
    use ovsdb_test::{FakeOvsdb, NB_DATABASE};
    use ovsdb_types::{Atom, Uuid};
    use pretty_assertions::assert_eq;

    fn client_with(rows: &[Columns]) -> (OvsdbClient, Vec<Uuid>) {
        let db = FakeOvsdb::new(NB_DATABASE, [NB_GLOBAL]);
        let uuids = rows
            .iter()
            .map(|columns| db.insert_row(NB_GLOBAL, columns.clone()))
            .collect();
        (db.client([NB_GLOBAL]), uuids)
    }

    fn options_columns(value: Value) -> Columns {
        let mut columns = Columns::new();
        columns.insert(OPTIONS_COLUMN.to_string(), value);
        columns
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_get_options_skips_non_string_pairs() {
        let value = Value::Map(vec![
            (Atom::string("a"), Atom::string("1")),
            (Atom::string("n"), Atom::Integer(7)),
        ]);
        let (client, _) = client_with(&[options_columns(value)]);
        assert_eq!(get_options(&client, NB_GLOBAL).unwrap(), map(&[("a", "1")]));
    }

    #[test]
    fn test_get_options_errors() {
        let (empty, _) = client_with(&[]);
        assert!(matches!(
            get_options(&empty, NB_GLOBAL),
            Err(OvsdbError::NotFound { .. })
        ));
        assert!(matches!(
            get_options(&empty, ""),
            Err(OvsdbError::InvalidArgument(_))
        ));

        let (not_a_map, _) = client_with(&[options_columns(Value::string_set(["a"]))]);
        assert!(matches!(
            get_options(&not_a_map, NB_GLOBAL),
            Err(OvsdbError::TypeMismatch { .. })
        ));

        let (no_column, _) = client_with(&[Columns::new()]);
        assert!(matches!(
            get_options(&no_column, NB_GLOBAL),
            Err(OvsdbError::Schema { .. })
        ));

        let (two_rows, _) = client_with(&[Columns::new(), Columns::new()]);
        assert!(matches!(
            get_options(&two_rows, NB_GLOBAL),
            Err(OvsdbError::Schema { .. })
        ));
    }

    #[test]
    fn test_replace_targets_cached_row() {
        let (client, uuids) = client_with(&[options_columns(Value::string_map(&map(&[])))]);
        let command = set_options(&client, NB_GLOBAL, &map(&[("k", "v")]), OptionsStrategy::Replace)
            .unwrap();

        assert_eq!(command.name(), "NB_Global:set_options");
        assert_eq!(
            command.operations(),
            &[Operation::Update {
                table: NB_GLOBAL.to_string(),
                conditions: vec![Condition::uuid_eq(uuids[0])],
                row: options_columns(Value::string_map(&map(&[("k", "v")]))),
            }]
        );
    }

    #[test]
    fn test_merge_deletes_then_inserts_keys() {
        let (client, _) = client_with(&[]);
        let command =
            set_options(&client, NB_GLOBAL, &map(&[("k", "v")]), OptionsStrategy::Merge).unwrap();

        let Operation::Mutate {
            conditions,
            mutations,
            ..
        } = &command.operations()[0]
        else {
            panic!("expected a mutate");
        };
        assert!(conditions.is_empty());
        assert_eq!(mutations[0].mutator, Mutator::Delete);
        assert_eq!(mutations[0].value, Value::string_set(["k"]));
        assert_eq!(mutations[1].mutator, Mutator::Insert);
    }

    #[test]
    fn test_set_options_errors() {
        let (empty, _) = client_with(&[]);
        assert!(matches!(
            set_options(&empty, NB_GLOBAL, &map(&[("k", "v")]), OptionsStrategy::Replace),
            Err(OvsdbError::NotFound { .. })
        ));
        assert!(matches!(
            set_options(&empty, NB_GLOBAL, &map(&[]), OptionsStrategy::Merge),
            Err(OvsdbError::InvalidArgument(_))
        ));
        assert!(matches!(
            set_options(&empty, "", &map(&[("k", "v")]), OptionsStrategy::Merge),
            Err(OvsdbError::InvalidArgument(_))
        ));
        assert!(matches!(
            set_options(&empty, SB_GLOBAL, &map(&[("k", "v")]), OptionsStrategy::Merge),
            Err(OvsdbError::Schema { .. })
        ));
    }

    #[test]
    fn test_strategy_from_config_text() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: OptionsStrategy,
        }
        let parsed: Wrapper = toml::from_str(r#"strategy = "merge""#).unwrap();
        assert_eq!(parsed.strategy, OptionsStrategy::Merge);
        assert_eq!(OptionsStrategy::default(), OptionsStrategy::Replace);
    }
}
