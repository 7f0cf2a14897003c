//! End-to-end freshness heartbeat.
//!
//! The master periodically writes the current unix time into
//! `NB_Global.options:e2e_timestamp`. ovn-northd copies it to the southbound
//! database, so comparing the two values shows how far the control plane
//! is lagging.

use crate::context::DbContext;
use crate::error::Result;
use chrono::Utc;
use ovsdb_client::Command;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Options key carrying the heartbeat timestamp.
pub const E2E_TIMESTAMP_KEY: &str = "e2e_timestamp";

/// Default heartbeat period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

/// Receives every successfully written northbound timestamp.
pub trait HeartbeatObserver: Send + Sync {
    fn nb_timestamp_written(&self, timestamp: i64);
}

/// Observer that discards timestamps.
#[derive(Debug, Default)]
pub struct NoopHeartbeatObserver;

impl HeartbeatObserver for NoopHeartbeatObserver {
    fn nb_timestamp_written(&self, _timestamp: i64) {}
}

#[derive(Default)]
struct Runner {
    started: bool,
    handle: Option<JoinHandle<()>>,
}

/// Periodic writer of the northbound timestamp and reader of its
/// southbound copy.
///
/// At most one write is in flight: the ticker and [`E2eHeartbeat::tick`]
/// take the same write lock from reading the options until the
/// transaction completes. Published timestamps never decrease.
pub struct E2eHeartbeat {
    ctx: DbContext,
    period: Duration,
    observer: Arc<dyn HeartbeatObserver>,
    last_written: Mutex<Option<i64>>,
    write_lock: AsyncMutex<()>,
    runner: Mutex<Runner>,
}

impl E2eHeartbeat {
    pub fn new(ctx: DbContext, period: Duration, observer: Arc<dyn HeartbeatObserver>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            period,
            observer,
            last_written: Mutex::new(None),
            write_lock: AsyncMutex::new(()),
            runner: Mutex::new(Runner::default()),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns the last timestamp successfully written to the northbound
    /// database by this heartbeat.
    pub fn last_written(&self) -> Option<i64> {
        *self.last_written.lock()
    }

    /// Starts the periodic writer.
    ///
    /// Returns false if it was ever started before; later calls have no
    /// effect. The first write happens one period after start. The task
    /// exits promptly once `cancel` fires and never writes after that.
    /// A zero period, or one too large for the timer, logs an error and
    /// the task exits without writing.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> bool {
        let mut runner = self.runner.lock();
        if runner.started {
            debug!("Heartbeat already started");
            return false;
        }

        let heartbeat = Arc::clone(self);
        runner.started = true;
        runner.handle = Some(tokio::spawn(async move { heartbeat.run(cancel).await }));
        info!(period_secs = self.period.as_secs(), "Started e2e heartbeat");
        true
    }

    /// Waits for the periodic writer to exit after cancellation.
    pub async fn join(&self) {
        let handle = self.runner.lock().handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Heartbeat task failed");
            }
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        let first_tick = match Instant::now().checked_add(self.period) {
            Some(first_tick) if !self.period.is_zero() => first_tick,
            _ => {
                error!(period = ?self.period, "Invalid heartbeat period, not starting");
                return;
            }
        };
        let mut ticker = interval_at(first_tick, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let _write = self.write_lock.lock().await;
            let (timestamp, command) = match self.prepare() {
                Ok(prepared) => prepared,
                Err(e) => {
                    error!(error = %e, "Failed to prepare e2e timestamp update");
                    continue;
                }
            };

            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.commit(timestamp, command).await {
                error!(error = %e, "Failed to write e2e timestamp");
            }
        }
        info!("Stopped e2e heartbeat");
    }

    /// Runs one heartbeat write immediately.
    ///
    /// Returns the timestamp written. On failure nothing is published and
    /// [`E2eHeartbeat::last_written`] is unchanged.
    pub async fn tick(&self) -> Result<i64> {
        let _write = self.write_lock.lock().await;
        let (timestamp, command) = self.prepare()?;
        self.commit(timestamp, command).await
    }

    fn prepare(&self) -> Result<(i64, Command)> {
        let mut options = self.ctx.nb_global_get_options()?;
        let now = Utc::now().timestamp();
        options.insert(E2E_TIMESTAMP_KEY.to_string(), now.to_string());
        let command = self.ctx.nb_global_set_options(&options)?;
        Ok((now, command.named("nb_e2e_timestamp")))
    }

    /// Must be called with the write lock held.
    #[instrument(skip(self, command))]
    async fn commit(&self, timestamp: i64, command: Command) -> Result<i64> {
        command.execute().await?;
        {
            let mut last_written = self.last_written.lock();
            if last_written.is_some_and(|last| timestamp < last) {
                warn!(timestamp, last = ?*last_written, "Clock went backwards, not publishing");
                return Ok(timestamp);
            }
            *last_written = Some(timestamp);
        }
        self.observer.nb_timestamp_written(timestamp);
        debug!(timestamp, "Wrote e2e timestamp");
        Ok(timestamp)
    }

    /// Reads the southbound copy of the timestamp.
    ///
    /// Returns `None` when the value is unknown: no row, no key, or a value
    /// that is not a number.
    pub fn probe_sb_timestamp(&self) -> Option<f64> {
        let options = match self.ctx.sb_global_get_options() {
            Ok(options) => options,
            Err(e) => {
                debug!(error = %e, "Southbound e2e timestamp unavailable");
                return None;
            }
        };
        let raw = options.get(E2E_TIMESTAMP_KEY)?;
        match raw.parse::<f64>() {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(value = %raw, error = %e, "Southbound e2e timestamp is not a number");
                None
            }
        }
    }
}
