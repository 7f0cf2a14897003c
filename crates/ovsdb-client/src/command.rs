//! Transactional commands.

use crate::client::OvsdbClient;
use crate::error::{OvsdbError, Result};
use crate::operation::{Operation, OperationResult};
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Name used for latency samples when a command is not given one.
pub const DEFAULT_COMMAND_NAME: &str = "transact";

/// An ordered list of operations bound to one database, executed as a
/// single atomic transaction.
///
/// Commands are inert values: building, combining or dropping one never
/// touches the database. [`Command::execute`] consumes the command, so a
/// command runs at most once.
#[must_use = "a command does nothing until executed"]
#[derive(Debug)]
pub struct Command {
    client: OvsdbClient,
    name: String,
    operations: Vec<Operation>,
}

impl Command {
    pub(crate) fn new(client: OvsdbClient) -> Self {
        Self {
            client,
            name: DEFAULT_COMMAND_NAME.to_string(),
            operations: Vec::new(),
        }
    }

    pub(crate) fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Sets the name latency samples are recorded under.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the latency label of this command.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the database this command targets.
    pub fn database(&self) -> &str {
        self.client.database()
    }

    /// Returns the operations in execution order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Appends the operations of `other`, keeping order.
    ///
    /// Both commands must come from the same client.
    pub fn extend(mut self, other: Command) -> Result<Self> {
        if !self.client.same_client(&other.client) {
            return Err(OvsdbError::invalid_argument(format!(
                "cannot combine a command for {} with a command for another client of {}",
                self.client.database(),
                other.client.database()
            )));
        }
        self.operations.extend(other.operations);
        Ok(self)
    }

    /// Sends the command as one transaction and waits for the reply.
    ///
    /// Either every operation applied (results are returned in operation
    /// order) or none did. An empty command succeeds without any I/O.
    #[instrument(skip(self), fields(database = %self.client.database(), command = %self.name, ops = self.operations.len()))]
    pub async fn execute(self) -> Result<Vec<OperationResult>> {
        if self.operations.is_empty() {
            debug!("Empty command, nothing to execute");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = self.client.transact(&self.operations).await;
        let elapsed = start.elapsed();
        self.client
            .observer()
            .observe_command(&self.name, elapsed, result.is_ok());

        match &result {
            Ok(_) => debug!(elapsed_ms = elapsed.as_millis() as u64, "Transaction committed"),
            Err(e) => warn!(error = %e, "Transaction failed"),
        }
        result
    }
}
