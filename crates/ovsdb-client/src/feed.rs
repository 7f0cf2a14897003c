//! Polling feed that keeps the row cache in sync.

use crate::client::OvsdbClient;
use crate::error::{OvsdbError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Refreshes every mirrored table of a client from a full `select`.
///
/// All tables are read in one transaction and installed under one cache
/// write lock, so the cache moves from one consistent database snapshot to
/// the next. This feed is the only writer
/// of the cache it refreshes.
pub struct SnapshotFeed {
    client: OvsdbClient,
    interval: Duration,
}

impl SnapshotFeed {
    pub fn new(client: OvsdbClient, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Reads every mirrored table once and installs the result.
    ///
    /// Returns the total number of rows now mirrored.
    pub async fn refresh(&self) -> Result<usize> {
        let tables = self.client.cache().table_names();
        let mut command = self.client.command().named("snapshot");
        for table in &tables {
            command = command.extend(self.client.select(table, vec![], None)?)?;
        }

        let results = command.execute().await?;

        let mut snapshot = Vec::with_capacity(tables.len());
        for (table, result) in tables.into_iter().zip(results) {
            let rows = result.rows.ok_or_else(|| {
                OvsdbError::protocol(format!("select on {} returned no rows member", table))
            })?;
            snapshot.push((table, rows));
        }
        let total = snapshot.iter().map(|(_, rows)| rows.len()).sum::<usize>();
        self.client.cache().replace_tables(snapshot)?;
        debug!(database = self.client.database(), rows = total, "Refreshed cache");
        Ok(total)
    }

    /// Refreshes immediately, then every interval until cancelled.
    ///
    /// Failed refreshes are logged and leave the cache untouched. A zero or
    /// oversized interval logs an error and the feed exits without refreshing.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.interval.is_zero() || Instant::now().checked_add(self.interval).is_none() {
                error!(
                    database = self.client.database(),
                    interval = ?self.interval,
                    "Invalid refresh interval, not starting cache feed"
                );
                return;
            }
            info!(
                database = self.client.database(),
                interval_secs = self.interval.as_secs(),
                "Starting cache feed"
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = self.refresh().await {
                    warn!(database = self.client.database(), error = %e, "Cache refresh failed");
                }
            }
            info!(database = self.client.database(), "Cache feed stopped");
        })
    }
}
