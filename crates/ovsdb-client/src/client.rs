//! Database client handle and command builders.

use crate::cache::RowCache;
use crate::command::Command;
use crate::error::{OvsdbError, Result};
use crate::executor::{decode_reply, CommandObserver, NoopObserver, Transact};
use crate::operation::{Condition, Mutation, Operation, OperationResult};
use ovsdb_types::Columns;
use std::fmt;
use std::sync::Arc;

struct ClientInner {
    database: String,
    cache: Arc<RowCache>,
    transport: Arc<dyn Transact>,
    observer: Arc<dyn CommandObserver>,
}

/// Handle to one database: its mirrored tables plus a transaction transport.
///
/// Cloning is cheap and yields a handle to the same database. Builder
/// methods are pure: they validate against the cache and allocate a
/// [`Command`], nothing is sent until [`Command::execute`].
#[derive(Clone)]
pub struct OvsdbClient {
    inner: Arc<ClientInner>,
}

impl OvsdbClient {
    /// Creates a client for `database`.
    pub fn new(
        database: impl Into<String>,
        cache: Arc<RowCache>,
        transport: Arc<dyn Transact>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                database: database.into(),
                cache,
                transport,
                observer: Arc::new(NoopObserver),
            }),
        }
    }

    /// Returns a client that reports command latency to `observer`.
    pub fn observed_by(self, observer: Arc<dyn CommandObserver>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                database: self.inner.database.clone(),
                cache: Arc::clone(&self.inner.cache),
                transport: Arc::clone(&self.inner.transport),
                observer,
            }),
        }
    }

    /// Returns the database name (e.g. "OVN_Northbound").
    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// Returns the mirrored tables of this database.
    pub fn cache(&self) -> &Arc<RowCache> {
        &self.inner.cache
    }

    /// Returns true if both handles refer to the same client.
    pub fn same_client(&self, other: &OvsdbClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates an empty command.
    pub fn command(&self) -> Command {
        Command::new(self.clone())
    }

    /// Builds an `insert` command.
    pub fn insert(&self, table: &str, row: Columns) -> Result<Command> {
        self.check_table(table)?;
        Ok(self.command().with_operation(Operation::Insert {
            table: table.to_string(),
            row,
            uuid_name: None,
        }))
    }

    /// Builds an `update` command.
    pub fn update(&self, table: &str, conditions: Vec<Condition>, row: Columns) -> Result<Command> {
        self.check_table(table)?;
        if row.is_empty() {
            return Err(OvsdbError::invalid_argument(format!(
                "update of {} with no columns",
                table
            )));
        }
        Ok(self.command().with_operation(Operation::Update {
            table: table.to_string(),
            conditions,
            row,
        }))
    }

    /// Builds a `mutate` command.
    pub fn mutate(
        &self,
        table: &str,
        conditions: Vec<Condition>,
        mutations: Vec<Mutation>,
    ) -> Result<Command> {
        self.check_table(table)?;
        if mutations.is_empty() {
            return Err(OvsdbError::invalid_argument(format!(
                "mutate of {} with no mutations",
                table
            )));
        }
        Ok(self.command().with_operation(Operation::Mutate {
            table: table.to_string(),
            conditions,
            mutations,
        }))
    }

    /// Builds a `delete` command.
    pub fn delete(&self, table: &str, conditions: Vec<Condition>) -> Result<Command> {
        self.check_table(table)?;
        Ok(self.command().with_operation(Operation::Delete {
            table: table.to_string(),
            conditions,
        }))
    }

    /// Builds a `select` command.
    pub fn select(
        &self,
        table: &str,
        conditions: Vec<Condition>,
        columns: Option<Vec<String>>,
    ) -> Result<Command> {
        self.check_table(table)?;
        Ok(self.command().with_operation(Operation::Select {
            table: table.to_string(),
            conditions,
            columns,
        }))
    }

    fn check_table(&self, table: &str) -> Result<()> {
        if table.is_empty() {
            return Err(OvsdbError::invalid_argument("empty table name"));
        }
        if !self.inner.cache.has_table(table) {
            return Err(OvsdbError::schema(table, "table is not mirrored"));
        }
        Ok(())
    }

    pub(crate) fn observer(&self) -> &dyn CommandObserver {
        self.inner.observer.as_ref()
    }

    pub(crate) async fn transact(&self, operations: &[Operation]) -> Result<Vec<OperationResult>> {
        let reply = self
            .inner
            .transport
            .transact(&self.inner.database, operations)
            .await?;
        decode_reply(operations, &reply)
    }
}

impl fmt::Debug for OvsdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OvsdbClient")
            .field("database", &self.inner.database)
            .field("tables", &self.inner.cache.table_names())
            .finish()
    }
}
