//! In-memory OVSDB server.

use async_trait::async_trait;
use ovsdb_client::{
    Condition, Function, Mutation, Mutator, Operation, OvsdbClient, OvsdbError, Result,
    RowCache, Transact,
};
use ovsdb_types::{Atom, Columns, Row, Uuid, Value};
use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type Tables = BTreeMap<String, BTreeMap<Uuid, Columns>>;

#[derive(Default)]
struct FakeState {
    tables: Tables,
    transactions: Vec<Vec<Operation>>,
    fail_next: Option<String>,
    unavailable: bool,
    attempts: usize,
}

/// A single database held in memory that answers `transact` like
/// ovsdb-server: operations run in order against a scratch copy, and the
/// copy is committed only if every operation succeeded.
///
/// Supported: insert, update, delete, select, and mutate with the map and
/// set `insert`/`delete` mutators. Conditions support `==` and `!=`.
pub struct FakeOvsdb {
    database: String,
    state: Mutex<FakeState>,
}

impl FakeOvsdb {
    /// Creates a database with the given (empty) tables.
    pub fn new<I, S>(database: impl Into<String>, tables: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = FakeState {
            tables: tables
                .into_iter()
                .map(|t| (t.into(), BTreeMap::new()))
                .collect(),
            ..FakeState::default()
        };
        Arc::new(Self {
            database: database.into(),
            state: Mutex::new(state),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Adds a row directly, bypassing transactions.
    pub fn insert_row(&self, table: &str, columns: Columns) -> Uuid {
        let uuid = Uuid::new_v4();
        self.state
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(uuid, columns);
        uuid
    }

    /// Returns every row of a table.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|(uuid, columns)| Row::new(*uuid, columns.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the string pairs of a map column in the only row of a table.
    pub fn map_column(&self, table: &str, column: &str) -> Option<BTreeMap<String, String>> {
        let rows = self.rows(table);
        match rows.as_slice() {
            [row] => row.get(column).and_then(Value::to_string_map),
            _ => None,
        }
    }

    /// Makes the next transaction fail with the given error tag.
    pub fn fail_next_transaction(&self, error: impl Into<String>) {
        self.state.lock().fail_next = Some(error.into());
    }

    /// While unavailable, every transaction fails with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Returns the operations of every transaction received so far.
    pub fn transactions(&self) -> Vec<Vec<Operation>> {
        self.state.lock().transactions.clone()
    }

    /// Number of transactions the database processed.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Number of `transact` calls, including ones refused while unavailable.
    pub fn attempt_count(&self) -> usize {
        self.state.lock().attempts
    }

    /// Copies the current contents of every table the cache mirrors.
    pub fn sync(&self, cache: &RowCache) {
        for table in cache.table_names() {
            // Tables unknown to this database stay empty in the cache.
            let _ = cache.replace_table(&table, self.rows(&table));
        }
    }

    /// Creates a client whose cache mirrors `tables` and is synced now.
    pub fn client<I, S>(self: &Arc<Self>, tables: I) -> OvsdbClient
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cache = Arc::new(RowCache::new(tables));
        self.sync(&cache);
        OvsdbClient::new(self.database.clone(), cache, Arc::clone(self) as Arc<dyn Transact>)
    }

    fn run(&self, operations: &[Operation]) -> Vec<Json> {
        let mut state = self.state.lock();
        state.transactions.push(operations.to_vec());

        let mut scratch = state.tables.clone();
        let mut replies = Vec::with_capacity(operations.len());

        if let Some(error) = state.fail_next.take() {
            replies.push(json!({"error": error, "details": "injected failure"}));
            return replies;
        }

        for operation in operations {
            match apply(&mut scratch, operation) {
                Ok(reply) => replies.push(reply),
                Err(reply) => {
                    debug!(%operation, "Operation failed, rolling back");
                    replies.push(reply);
                    return replies;
                }
            }
        }

        state.tables = scratch;
        replies
    }
}

#[async_trait]
impl Transact for FakeOvsdb {
    async fn transact(&self, database: &str, operations: &[Operation]) -> Result<Json> {
        {
            let mut state = self.state.lock();
            state.attempts += 1;
            if state.unavailable {
                return Err(OvsdbError::transport("database unavailable"));
            }
        }
        if database != self.database {
            return Err(OvsdbError::protocol(format!("unknown database {}", database)));
        }
        Ok(Json::Array(self.run(operations)))
    }
}

fn error_reply(error: &str, details: String) -> Json {
    json!({"error": error, "details": details})
}

fn apply(tables: &mut Tables, operation: &Operation) -> std::result::Result<Json, Json> {
    let rows = tables
        .get_mut(operation.table())
        .ok_or_else(|| error_reply("unknown table", operation.table().to_string()))?;

    match operation {
        Operation::Insert { row, .. } => {
            let uuid = Uuid::new_v4();
            rows.insert(uuid, row.clone());
            Ok(json!({"uuid": ["uuid", uuid.to_string()]}))
        }
        Operation::Update {
            conditions, row, ..
        } => {
            let matched = matching(rows, conditions)?;
            for uuid in &matched {
                if let Some(columns) = rows.get_mut(uuid) {
                    columns.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Ok(json!({"count": matched.len()}))
        }
        Operation::Mutate {
            conditions,
            mutations,
            ..
        } => {
            let matched = matching(rows, conditions)?;
            for uuid in &matched {
                if let Some(columns) = rows.get_mut(uuid) {
                    for mutation in mutations {
                        mutate(columns, mutation)?;
                    }
                }
            }
            Ok(json!({"count": matched.len()}))
        }
        Operation::Delete { conditions, .. } => {
            let matched = matching(rows, conditions)?;
            for uuid in &matched {
                rows.remove(uuid);
            }
            Ok(json!({"count": matched.len()}))
        }
        Operation::Select {
            conditions,
            columns: wanted,
            ..
        } => {
            let matched = matching(rows, conditions)?;
            let selected: Vec<Json> = matched
                .iter()
                .filter_map(|uuid| rows.get(uuid).map(|columns| (uuid, columns)))
                .map(|(uuid, columns)| {
                    let mut object = serde_json::Map::new();
                    object.insert("_uuid".to_string(), Atom::Uuid(*uuid).to_json());
                    for (name, value) in columns {
                        if wanted.as_ref().map_or(true, |w| w.contains(name)) {
                            object.insert(name.clone(), value.to_json());
                        }
                    }
                    Json::Object(object)
                })
                .collect();
            Ok(json!({"rows": selected}))
        }
    }
}

fn matching(
    rows: &BTreeMap<Uuid, Columns>,
    conditions: &[Condition],
) -> std::result::Result<Vec<Uuid>, Json> {
    let mut matched = Vec::new();
    for (uuid, columns) in rows {
        let mut keep = true;
        for condition in conditions {
            let actual = if condition.column == "_uuid" {
                Some(Value::Atom(Atom::Uuid(*uuid)))
            } else {
                columns.get(&condition.column).cloned()
            };
            let equal = actual.as_ref() == Some(&condition.value);
            keep &= match condition.function {
                Function::Equal => equal,
                Function::NotEqual => !equal,
                other => {
                    return Err(error_reply(
                        "syntax error",
                        format!("unsupported function {}", other.as_str()),
                    ))
                }
            };
        }
        if keep {
            matched.push(*uuid);
        }
    }
    Ok(matched)
}

fn mutate(columns: &mut Columns, mutation: &Mutation) -> std::result::Result<(), Json> {
    let current = columns.remove(&mutation.column);
    let updated = match (mutation.mutator, &mutation.value) {
        (Mutator::Insert, Value::Map(pairs)) => {
            let mut existing = existing_pairs(current, &mutation.column)?;
            for (k, v) in pairs {
                if !existing.iter().any(|(ek, _)| ek == k) {
                    existing.push((k.clone(), v.clone()));
                }
            }
            Value::Map(existing)
        }
        (Mutator::Delete, Value::Set(keys)) if is_map(&current) => {
            let mut existing = existing_pairs(current, &mutation.column)?;
            existing.retain(|(k, _)| !keys.contains(k));
            Value::Map(existing)
        }
        (Mutator::Delete, Value::Map(pairs)) => {
            let mut existing = existing_pairs(current, &mutation.column)?;
            existing.retain(|pair| !pairs.contains(pair));
            Value::Map(existing)
        }
        (Mutator::Insert, Value::Set(items)) => {
            let mut existing = existing_set(current, &mutation.column)?;
            for item in items {
                if !existing.contains(item) {
                    existing.push(item.clone());
                }
            }
            Value::Set(existing)
        }
        (Mutator::Delete, Value::Set(items)) => {
            let mut existing = existing_set(current, &mutation.column)?;
            existing.retain(|a| !items.contains(a));
            Value::Set(existing)
        }
        (mutator, _) => {
            return Err(error_reply(
                "not supported",
                format!("mutator {} on {}", mutator.as_str(), mutation.column),
            ))
        }
    };
    columns.insert(mutation.column.clone(), updated);
    Ok(())
}

fn is_map(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Map(_)))
}

fn existing_pairs(
    value: Option<Value>,
    column: &str,
) -> std::result::Result<Vec<(Atom, Atom)>, Json> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Map(pairs)) => Ok(pairs),
        Some(_) => Err(error_reply("constraint violation", format!("{} is not a map", column))),
    }
}

fn existing_set(value: Option<Value>, column: &str) -> std::result::Result<Vec<Atom>, Json> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Set(items)) => Ok(items),
        Some(Value::Atom(atom)) => Ok(vec![atom]),
        Some(_) => Err(error_reply("constraint violation", format!("{} is not a set", column))),
    }
}
