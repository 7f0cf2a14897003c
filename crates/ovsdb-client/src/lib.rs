//! OVSDB client core.
//!
//! This crate provides the pieces a controller needs to talk to the OVN
//! northbound and southbound databases:
//!
//! - [`RowCache`]: a locally mirrored, read-mostly copy of selected tables
//! - [`OvsdbClient`] and [`Command`]: pure builders for atomic transactions
//! - [`Transact`]: the seam that sends a transaction, implemented by
//!   [`JsonRpcTransport`] over tcp, ssl or unix sockets
//! - [`SnapshotFeed`]: keeps a cache in sync by periodic snapshots
//!
//! Cache readers never block on I/O, and a command has no effect until it
//! is executed.

mod cache;
mod client;
mod command;
mod error;
mod executor;
mod feed;
mod jsonrpc;
mod operation;
mod transport;
mod update;

pub use cache::{ApplyStats, RowCache};
pub use client::OvsdbClient;
pub use command::{Command, DEFAULT_COMMAND_NAME};
pub use error::{OvsdbError, Result};
pub use executor::{CommandObserver, NoopObserver, Transact};
pub use feed::SnapshotFeed;
pub use jsonrpc::{JsonRpcTransport, RpcStream};
pub use operation::{Condition, Function, Mutation, Mutator, Operation, OperationResult};
pub use transport::{TlsFiles, TransportConfig};
pub use update::{RowUpdate, TableUpdates, UpdateKind};

/// Re-export of the value types used in rows and operations.
pub use ovsdb_types;
