use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::credentials::{CachedCredentials, StaticCredentials};
use crate::directory::FallbackDirectory;
use crate::error::ConfigurationError;
use crate::executor::{ProbeExecutor, ProbeSettings};
use crate::geo::DbIpClient;
use crate::retention::{RetentionPolicy, RetentionSweeper};
use crate::runner::RunService;
use crate::store::SessionStore;
use crate::transport::{ProxyTransport, parse_url};

/// Everything a front end needs, wired from one configuration
pub struct EgressContext {
    pub runs: Arc<RunService>,
    pub directory: Arc<FallbackDirectory>,
    pub store: Arc<SessionStore>,
    pub retention: RetentionPolicy,
}

impl EgressContext {
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let settings = ProbeSettings::from_config(&config.probe)?;
        let transport = Arc::new(ProxyTransport::new(parse_url(&config.probe.ip_echo_url)?));
        let credentials = Arc::new(CachedCredentials::new(Arc::new(StaticCredentials::new(
            config.egress.clone(),
        ))));

        let mut executor = ProbeExecutor::new(transport, credentials, settings);
        if config.geolocation.enabled {
            let geolocation = &config.geolocation;
            match DbIpClient::new(
                geolocation.base_url.as_str(),
                geolocation.api_key.clone(),
                Duration::from_secs(geolocation.timeout_secs),
            ) {
                Ok(client) => executor = executor.with_geolocation(Arc::new(client)),
                Err(e) => warn!("Geolocation disabled, client could not be built: {}", e),
            }
        } else {
            info!("Geolocation enrichment disabled by configuration");
        }

        let store = Arc::new(SessionStore::new());
        let runs = Arc::new(RunService::new(Arc::new(executor), store.clone(), config.scheduler.clone()));
        let directory = Arc::new(FallbackDirectory::from_url(
            config.directory.url.as_deref(),
            Duration::from_secs(config.directory.timeout_secs),
        ));

        Ok(Self { runs, directory, store, retention: RetentionPolicy::from(&config.retention) })
    }

    /// Start evicting finished runs in the background
    pub fn start_retention(&self) -> tokio::task::JoinHandle<()> {
        RetentionSweeper::new(self.store.clone(), self.retention.clone()).start()
    }
}
