use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ProbeConfig;
use crate::credentials::{CredentialSource, EgressRoute};
use crate::error::{ConfigurationError, EnrichmentError, ProbeError, TransportError};
use crate::geo::GeoLookup;
use crate::model::{EnrichmentInfo, Endpoint, ProbeResult};
use crate::transport::{EgressTransport, parse_url};

const REACHABILITY_STAGE: &str = "reachability check";
const FETCH_STAGE: &str = "full fetch";
const SETUP_STAGE: &str = "proxy setup";

/// Target and per-stage time limits for a probe
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub target_url: Url,
    pub ping_timeout: Duration,
    pub fetch_timeout: Duration,
    pub address_timeout: Duration,
}

impl ProbeSettings {
    pub fn new(target_url: Url) -> Self {
        Self {
            target_url,
            ping_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(15),
            address_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self, ConfigurationError> {
        Ok(Self {
            target_url: parse_url(&config.target_url)?,
            ping_timeout: config.ping_timeout(),
            fetch_timeout: config.fetch_timeout(),
            address_timeout: config.address_timeout(),
        })
    }
}

/// Probe executor - measures one endpoint through its egress route
pub struct ProbeExecutor {
    transport: Arc<dyn EgressTransport>,
    credentials: Arc<dyn CredentialSource>,
    geo: Option<Arc<dyn GeoLookup>>,
    settings: ProbeSettings,
}

impl ProbeExecutor {
    /// Create a new probe executor
    pub fn new(
        transport: Arc<dyn EgressTransport>,
        credentials: Arc<dyn CredentialSource>,
        settings: ProbeSettings,
    ) -> Self {
        Self { transport, credentials, geo: None, settings }
    }

    /// Enrich successful probes with geolocation of the egress address
    pub fn with_geolocation(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Probe `endpoint`; every failure is folded into the returned result
    pub async fn probe(&self, id: Uuid, endpoint: &Endpoint) -> ProbeResult {
        let result = ProbeResult::testing(id, endpoint);

        let route = match self.route_for(endpoint).await {
            Ok(route) => route,
            Err(e) => {
                warn!(isp = %endpoint.isp_name, "Probe not started: {}", e);
                return result.failure(&e);
            }
        };

        // Client setup stays outside the timed stages
        let bound = match self.transport.prepare(&route).await {
            Ok(bound) => bound,
            Err(e) => {
                let e = ProbeError::from_transport(SETUP_STAGE, 0, e);
                warn!(isp = %endpoint.isp_name, route = %route.label, "Probe not started: {}", e);
                return result.failure(&e);
            }
        };
        let transport = bound.as_deref().unwrap_or(self.transport.as_ref());

        match self.measure(transport, &route).await {
            Ok((ping_ms, http_ms)) => {
                let result = result.success(ping_ms, http_ms);
                debug!(
                    isp = %endpoint.isp_name,
                    route = %route.label,
                    total_ms = result.total_time_ms.unwrap_or_default(),
                    "Probe succeeded"
                );
                match self.enrich(transport, &route).await {
                    Ok(Some(info)) => result.with_enrichment(info),
                    Ok(None) => result,
                    Err(e) => {
                        debug!(isp = %endpoint.isp_name, "Enrichment skipped: {}", e);
                        result
                    }
                }
            }
            Err(e) => {
                debug!(isp = %endpoint.isp_name, route = %route.label, "Probe failed: {}", e);
                result.failure(&e)
            }
        }
    }

    async fn route_for(&self, endpoint: &Endpoint) -> Result<EgressRoute, ProbeError> {
        let params = self.credentials.resolve().await?;
        Ok(EgressRoute::for_endpoint(&params, endpoint)?)
    }

    /// Run the reachability check then the full fetch, returning both
    /// durations in milliseconds
    async fn measure(
        &self,
        transport: &dyn EgressTransport,
        route: &EgressRoute,
    ) -> Result<(f64, f64), ProbeError> {
        let target = &self.settings.target_url;

        let ping_ms = timed(
            REACHABILITY_STAGE,
            self.settings.ping_timeout,
            transport.head(route, target),
        )
        .await?;

        let http_ms = timed(
            FETCH_STAGE,
            self.settings.fetch_timeout,
            transport.fetch(route, target),
        )
        .await?;

        Ok((ping_ms, http_ms))
    }

    async fn enrich(
        &self,
        transport: &dyn EgressTransport,
        route: &EgressRoute,
    ) -> Result<Option<EnrichmentInfo>, EnrichmentError> {
        let Some(geo) = &self.geo else {
            return Ok(None);
        };

        let address = timeout(self.settings.address_timeout, transport.public_address(route))
            .await
            .map_err(|_| EnrichmentError::Address(TransportError::Timeout))?
            .map_err(EnrichmentError::Address)?;

        geo.lookup(address).await
    }
}

/// Await `operation` under `limit` and return its wall-clock duration in ms
async fn timed<F>(stage: &'static str, limit: Duration, operation: F) -> Result<f64, ProbeError>
where
    F: Future<Output = Result<u16, TransportError>>,
{
    let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    let start = Instant::now();

    match timeout(limit, operation).await {
        Ok(Ok(_status)) => Ok(start.elapsed().as_secs_f64() * 1000.0),
        Ok(Err(e)) => Err(ProbeError::from_transport(stage, limit_ms, e)),
        Err(_) => Err(ProbeError::Timeout { stage, after_ms: limit_ms }),
    }
}
