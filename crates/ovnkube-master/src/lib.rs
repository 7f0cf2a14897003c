//! OVN master controller core
//!
//! Global options access for the `NB_Global` and `SB_Global` singleton rows
//! and the end-to-end freshness heartbeat, on top of [`ovsdb_client`].

pub mod config;
pub mod context;
pub mod error;
pub mod heartbeat;
pub mod metrics;
pub mod options;

pub use config::MasterConfig;
pub use context::{DbContext, NB_DATABASE, SB_DATABASE};
pub use error::{MasterError, Result};
pub use heartbeat::{E2eHeartbeat, HeartbeatObserver, NoopHeartbeatObserver, E2E_TIMESTAMP_KEY};
pub use metrics::MasterMetrics;
pub use options::{get_options, set_options, OptionsStrategy, NB_GLOBAL, SB_GLOBAL};
