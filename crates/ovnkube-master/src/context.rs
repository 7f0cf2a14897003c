//! Northbound and southbound clients shared by the controller.

use crate::config::MasterConfig;
use crate::error::Result;
use crate::options::{self, OptionsStrategy, NB_GLOBAL, SB_GLOBAL};
use ovsdb_client::{Command, CommandObserver, OvsdbClient, RowCache};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Northbound database name.
pub const NB_DATABASE: &str = "OVN_Northbound";
/// Southbound database name.
pub const SB_DATABASE: &str = "OVN_Southbound";

/// The two database clients plus the options strategy for each global
/// table. Passed explicitly to everything that needs database access.
#[derive(Debug, Clone)]
pub struct DbContext {
    nb: OvsdbClient,
    sb: OvsdbClient,
    nb_strategy: OptionsStrategy,
    sb_strategy: OptionsStrategy,
}

impl DbContext {
    /// Wraps existing clients, using [`OptionsStrategy::Replace`] for both.
    pub fn new(nb: OvsdbClient, sb: OvsdbClient) -> Self {
        Self {
            nb,
            sb,
            nb_strategy: OptionsStrategy::default(),
            sb_strategy: OptionsStrategy::default(),
        }
    }

    /// Overrides the options strategies.
    pub fn with_strategies(mut self, nb: OptionsStrategy, sb: OptionsStrategy) -> Self {
        self.nb_strategy = nb;
        self.sb_strategy = sb;
        self
    }

    /// Connects to both databases.
    ///
    /// Each client mirrors its global table. TLS material is loaded before
    /// any connection is attempted.
    pub async fn connect(config: &MasterConfig, observer: Arc<dyn CommandObserver>) -> Result<Self> {
        let nb_transport = config.northbound.transport()?;
        let sb_transport = config.southbound.transport()?;

        let nb = OvsdbClient::new(
            NB_DATABASE,
            Arc::new(RowCache::new([NB_GLOBAL])),
            Arc::new(nb_transport.connect().await?),
        )
        .observed_by(Arc::clone(&observer));

        let sb = OvsdbClient::new(
            SB_DATABASE,
            Arc::new(RowCache::new([SB_GLOBAL])),
            Arc::new(sb_transport.connect().await?),
        )
        .observed_by(observer);

        info!(
            northbound = %nb_transport,
            southbound = %sb_transport,
            "Database clients ready"
        );

        Ok(Self::new(nb, sb).with_strategies(
            config.options.nb_global_strategy,
            config.options.sb_global_strategy,
        ))
    }

    pub fn nb(&self) -> &OvsdbClient {
        &self.nb
    }

    pub fn sb(&self) -> &OvsdbClient {
        &self.sb
    }

    pub fn nb_global_get_options(&self) -> ovsdb_client::Result<BTreeMap<String, String>> {
        options::get_options(&self.nb, NB_GLOBAL)
    }

    pub fn nb_global_set_options(
        &self,
        options: &BTreeMap<String, String>,
    ) -> ovsdb_client::Result<Command> {
        options::set_options(&self.nb, NB_GLOBAL, options, self.nb_strategy)
    }

    pub fn sb_global_get_options(&self) -> ovsdb_client::Result<BTreeMap<String, String>> {
        options::get_options(&self.sb, SB_GLOBAL)
    }

    pub fn sb_global_set_options(
        &self,
        options: &BTreeMap<String, String>,
    ) -> ovsdb_client::Result<Command> {
        options::set_options(&self.sb, SB_GLOBAL, options, self.sb_strategy)
    }
}
