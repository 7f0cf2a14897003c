//! Prometheus metrics for the master controller

use crate::error::Result;
use crate::heartbeat::HeartbeatObserver;
use ovsdb_client::CommandObserver;
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{
    exponential_buckets, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const NAMESPACE: &str = "ovnkube";
const SUBSYSTEM: &str = "master";

/// Reads the southbound timestamp at scrape time.
pub type SbTimestampProbe = Arc<dyn Fn() -> Option<f64> + Send + Sync>;

/// Gauge whose value is read from the southbound database on every scrape.
/// An unknown value is exported as 0.
#[derive(Clone)]
struct SbTimestampCollector {
    gauge: Gauge,
    probe: SbTimestampProbe,
}

impl Collector for SbTimestampCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.set((self.probe)().unwrap_or(0.0));
        self.gauge.collect()
    }
}

/// Metrics published by the master controller
#[derive(Clone)]
pub struct MasterMetrics {
    /// Last northbound e2e timestamp written by the heartbeat
    pub nb_e2e_timestamp: Gauge,

    /// Latency of database commands, by command name
    pub ovn_cli_latency_seconds: HistogramVec,

    /// Seconds from startup until the controller was ready
    pub ready_duration_seconds: Gauge,

    /// Constant 1, labelled with the package name and version
    pub build_info: Gauge,

    registered: Arc<Mutex<bool>>,
}

impl MasterMetrics {
    /// Create the metrics. Nothing is registered yet.
    pub fn new() -> Result<Self> {
        let nb_e2e_timestamp = Gauge::with_opts(
            Opts::new(
                "nb_e2e_timestamp",
                "The current e2e-timestamp value as written to the northbound database",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        )?;

        let ovn_cli_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "ovn_cli_latency_seconds",
                "The latency of various OVN commands. Currently, ovn-nbctl and ovn-sbctl",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM)
            .buckets(exponential_buckets(0.1, 2.0, 15)?),
            &["command"],
        )?;

        let ready_duration_seconds = Gauge::with_opts(
            Opts::new(
                "ready_duration_seconds",
                "The duration for the master to get to ready state",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        )?;

        let build_info = Gauge::with_opts(
            Opts::new(
                "build_info",
                "A metric with a constant '1' value labeled by package and version",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM)
            .const_label("package", env!("CARGO_PKG_NAME"))
            .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        build_info.set(1.0);

        Ok(Self {
            nb_e2e_timestamp,
            ovn_cli_latency_seconds,
            ready_duration_seconds,
            build_info,
            registered: Arc::new(Mutex::new(false)),
        })
    }

    /// Registers all master metrics into `registry`.
    ///
    /// Only the first successful call registers anything; later calls
    /// return `Ok(false)`. A failed call leaves nothing registered, so it
    /// can be retried. `sb_probe` is called on every scrape.
    pub fn register(&self, registry: &Registry, sb_probe: SbTimestampProbe) -> Result<bool> {
        let mut registered = self.registered.lock();
        if *registered {
            return Ok(false);
        }

        let sb_e2e_timestamp = Gauge::with_opts(
            Opts::new(
                "sb_e2e_timestamp",
                "The current e2e-timestamp value as observed in the southbound database",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        )?;

        let sb_collector = SbTimestampCollector {
            gauge: sb_e2e_timestamp,
            probe: sb_probe,
        };

        // Each entry carries a second handle, used to unregister on rollback.
        let collectors: Vec<(Box<dyn Collector>, Box<dyn Collector>)> = vec![
            (
                Box::new(self.nb_e2e_timestamp.clone()),
                Box::new(self.nb_e2e_timestamp.clone()),
            ),
            (Box::new(sb_collector.clone()), Box::new(sb_collector)),
            (
                Box::new(self.ovn_cli_latency_seconds.clone()),
                Box::new(self.ovn_cli_latency_seconds.clone()),
            ),
            (
                Box::new(self.ready_duration_seconds.clone()),
                Box::new(self.ready_duration_seconds.clone()),
            ),
            (
                Box::new(self.build_info.clone()),
                Box::new(self.build_info.clone()),
            ),
        ];

        let mut added = Vec::with_capacity(collectors.len());
        for (collector, handle) in collectors {
            if let Err(e) = registry.register(collector) {
                for handle in added {
                    if let Err(e) = registry.unregister(handle) {
                        warn!(error = %e, "Failed to roll back metric registration");
                    }
                }
                return Err(e.into());
            }
            added.push(handle);
        }

        *registered = true;
        debug!("Registered master metrics");
        Ok(true)
    }

    /// Records how long startup took.
    pub fn mark_ready(&self, elapsed: Duration) {
        self.ready_duration_seconds.set(elapsed.as_secs_f64());
    }

    /// Renders `registry` in the Prometheus text format.
    pub fn encode(registry: &Registry) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl HeartbeatObserver for MasterMetrics {
    fn nb_timestamp_written(&self, timestamp: i64) {
        self.nb_e2e_timestamp.set(timestamp as f64);
    }
}

impl CommandObserver for MasterMetrics {
    fn observe_command(&self, command: &str, elapsed: Duration, _succeeded: bool) {
        self.ovn_cli_latency_seconds
            .with_label_values(&[command])
            .observe(elapsed.as_secs_f64());
    }
}
