//! Configuration file support for ovnkube-master
//!
//! Loads and validates the controller configuration from TOML.
//! Default location: /etc/ovn-kubernetes/ovnkube-master.toml

use crate::error::{MasterError, Result};
use crate::options::OptionsStrategy;
use ovsdb_client::{TlsFiles, TransportConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ovn-kubernetes/ovnkube-master.toml";

/// Upper bound for the heartbeat period and the cache refresh interval.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Connection settings for one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `ssl:HOST:PORT`, `tcp:HOST:PORT` or `unix:/path`
    pub address: String,

    /// Client certificate (ssl only)
    #[serde(default)]
    pub cert: Option<PathBuf>,

    /// Client private key (ssl only)
    #[serde(default)]
    pub private_key: Option<PathBuf>,

    /// CA certificate (ssl only)
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
}

impl DatabaseConfig {
    fn with_address(address: &str) -> Self {
        Self {
            address: address.to_string(),
            cert: None,
            private_key: None,
            ca_cert: None,
        }
    }

    fn tls_files(&self) -> Option<TlsFiles> {
        Some(TlsFiles {
            cert: self.cert.clone()?,
            private_key: self.private_key.clone()?,
            ca_cert: self.ca_cert.clone()?,
        })
    }

    /// Builds the transport, loading TLS material for `ssl:` addresses.
    pub fn transport(&self) -> Result<TransportConfig> {
        Ok(TransportConfig::from_address(
            &self.address,
            self.tls_files().as_ref(),
        )?)
    }

    fn validate(&self, section: &str) -> Result<()> {
        let scheme = self.address.split_once(':').map(|(s, _)| s);
        match scheme {
            Some("ssl") if self.tls_files().is_none() => Err(MasterError::config(format!(
                "[{}] ssl address requires cert, private_key and ca_cert",
                section
            ))),
            Some("ssl" | "tcp" | "unix") => Ok(()),
            _ => Err(MasterError::config(format!(
                "[{}] address must start with ssl:, tcp: or unix:, got {:?}",
                section, self.address
            ))),
        }
    }
}

/// Freshness heartbeat settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between timestamp writes
    #[serde(default = "default_heartbeat_period")]
    pub period_secs: u64,
}

/// Cache feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds between table snapshots
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

/// Options write strategy per global table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default)]
    pub nb_global_strategy: OptionsStrategy,

    #[serde(default)]
    pub sb_global_strategy: OptionsStrategy,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete ovnkube-master configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterConfig {
    #[serde(default = "default_northbound")]
    pub northbound: DatabaseConfig,

    #[serde(default = "default_southbound")]
    pub southbound: DatabaseConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_northbound() -> DatabaseConfig {
    DatabaseConfig::with_address("unix:/var/run/ovn/ovnnb_db.sock")
}

fn default_southbound() -> DatabaseConfig {
    DatabaseConfig::with_address("unix:/var/run/ovn/ovnsb_db.sock")
}

fn default_heartbeat_period() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period_secs: default_heartbeat_period(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            northbound: default_northbound(),
            southbound: default_southbound(),
            heartbeat: HeartbeatConfig::default(),
            cache: CacheConfig::default(),
            options: OptionsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MasterConfig {
    /// Parses configuration text. Does not validate.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MasterError::config(format!("Failed to parse config: {}", e)))
    }

    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MasterError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&content).map_err(|e| {
            MasterError::config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Heartbeat period as Duration
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat.period_secs)
    }

    /// Cache refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cache.refresh_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.northbound.validate("northbound")?;
        self.southbound.validate("southbound")?;

        check_interval("heartbeat", "period_secs", self.heartbeat.period_secs)?;
        check_interval(
            "cache",
            "refresh_interval_secs",
            self.cache.refresh_interval_secs,
        )?;

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(MasterError::config(format!(
                "invalid log level {:?}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn check_interval(section: &str, key: &str, secs: u64) -> Result<()> {
    if secs == 0 || secs > MAX_INTERVAL_SECS {
        return Err(MasterError::config(format!(
            "{} {} must be between 1 and {}, got {}",
            section, key, MAX_INTERVAL_SECS, secs
        )));
    }
    Ok(())
}
