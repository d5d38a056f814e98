//! Egress gateway credentials and per-endpoint routing.
//!
//! Connection parameters are resolved once per process and cached; every
//! probe then derives an [`EgressRoute`] that pins the gateway to the
//! endpoint's country, region, city and ISP.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::config::{AUTH_SECRET_ENV, EgressConfig};
use crate::error::ConfigurationError;
use crate::model::Endpoint;

const DEFAULT_USERNAME: &str = "egress";

/// Gateway address and opaque secret used to reach egress points
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub endpoint: String,
    pub port: u16,
    pub username: Option<String>,
    pub auth_secret: String,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth_secret", &"<redacted>")
            .finish()
    }
}

/// Source of egress connection parameters
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve(&self) -> Result<ConnectionParams, ConfigurationError>;
}

/// Credentials taken from configuration and the environment
pub struct StaticCredentials {
    config: EgressConfig,
}

impl StaticCredentials {
    pub fn new(config: EgressConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl CredentialSource for StaticCredentials {
    async fn resolve(&self) -> Result<ConnectionParams, ConfigurationError> {
        let auth_secret = self
            .config
            .auth_secret
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigurationError::MissingCredential(AUTH_SECRET_ENV))?;

        let host = self.config.gateway_host.trim();
        if host.is_empty() || host.contains('/') || self.config.gateway_port == 0 {
            return Err(ConfigurationError::InvalidGateway(format!(
                "{}:{}",
                self.config.gateway_host, self.config.gateway_port
            )));
        }

        Ok(ConnectionParams {
            endpoint: host.to_string(),
            port: self.config.gateway_port,
            username: self.config.username.clone(),
            auth_secret,
        })
    }
}

/// Caches the first successful resolution of an inner source.
///
/// Concurrent first callers wait on the same initialisation; failures are not
/// cached, so a later call retries the inner source.
pub struct CachedCredentials {
    inner: Arc<dyn CredentialSource>,
    cell: OnceCell<ConnectionParams>,
}

impl CachedCredentials {
    pub fn new(inner: Arc<dyn CredentialSource>) -> Self {
        Self { inner, cell: OnceCell::new() }
    }
}

#[async_trait::async_trait]
impl CredentialSource for CachedCredentials {
    async fn resolve(&self) -> Result<ConnectionParams, ConfigurationError> {
        self.cell
            .get_or_try_init(|| async {
                let params = self.inner.resolve().await?;
                info!(gateway = %params.endpoint, port = params.port, "Egress credentials resolved");
                Ok::<_, ConfigurationError>(params)
            })
            .await
            .cloned()
    }
}

/// Proxy settings that send a request out through one specific endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct EgressRoute {
    pub proxy_url: Url,
    pub username: String,
    pub password: String,
    /// Targeting suffix, for logs
    pub label: String,
}

impl std::fmt::Debug for EgressRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EgressRoute")
            .field("proxy_url", &self.proxy_url.as_str())
            .field("username", &self.username)
            .field("label", &self.label)
            .finish()
    }
}

impl EgressRoute {
    /// Build the route for `endpoint`; the targeting rides in the password
    /// as `<secret>_country-<c>[_region-<r>][_city-<c>]_isp-<i>`.
    pub fn for_endpoint(
        params: &ConnectionParams,
        endpoint: &Endpoint,
    ) -> Result<Self, ConfigurationError> {
        let proxy_url = Url::parse(&format!("http://{}:{}", params.endpoint, params.port))
            .map_err(|e| ConfigurationError::InvalidGateway(format!("{}: {e}", params.endpoint)))?;

        let mut targeting = vec![format!("country-{}", slug(&endpoint.country))];
        if let Some(region) = endpoint.region.as_deref().filter(|r| !r.trim().is_empty()) {
            targeting.push(format!("region-{}", slug(region)));
        }
        if let Some(city) = endpoint.city.as_deref().filter(|c| !c.trim().is_empty()) {
            targeting.push(format!("city-{}", slug(city)));
        }
        targeting.push(format!("isp-{}", slug(&endpoint.isp_name)));
        let label = targeting.join("_");

        debug!(proxy = %proxy_url, route = %label, "Built egress route");

        Ok(Self {
            proxy_url,
            username: params.username.clone().unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: format!("{}_{}", params.auth_secret, label),
            label,
        })
    }
}

/// Lowercase and collapse every run of non-alphanumerics into one `-`
fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn params() -> ConnectionParams {
        ConnectionParams {
            endpoint: "gateway.test".into(),
            port: 1000,
            username: Some("alice".into()),
            auth_secret: "s3cret".into(),
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("United States"), "united-states");
        assert_eq!(slug("  AT&T Internet Services "), "at-t-internet-services");
        assert_eq!(slug("Île-de-France"), "île-de-france");
    }

    #[test]
    fn test_route_targeting() {
        let endpoint = Endpoint::new("Deutsche Telekom AG", "Germany")
            .with_region("Bavaria")
            .with_city("Munich");
        let route = EgressRoute::for_endpoint(&params(), &endpoint).unwrap();

        assert_eq!(route.proxy_url.as_str(), "http://gateway.test:1000/");
        assert_eq!(route.username, "alice");
        assert_eq!(
            route.password,
            "s3cret_country-germany_region-bavaria_city-munich_isp-deutsche-telekom-ag"
        );
    }

    #[test]
    fn test_route_skips_missing_location_parts() {
        let endpoint = Endpoint::new("Singtel", "Singapore");
        let mut params = params();
        params.username = None;
        let route = EgressRoute::for_endpoint(&params, &endpoint).unwrap();

        assert_eq!(route.username, DEFAULT_USERNAME);
        assert_eq!(route.label, "country-singapore_isp-singtel");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let shown = format!("{:?}", params());
        assert!(!shown.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_static_credentials_require_secret() {
        let source = StaticCredentials::new(EgressConfig::default());
        assert_eq!(
            source.resolve().await,
            Err(ConfigurationError::MissingCredential(AUTH_SECRET_ENV))
        );

        let config = EgressConfig { auth_secret: Some("s3cret".into()), ..EgressConfig::default() };
        let resolved = StaticCredentials::new(config).resolve().await.unwrap();
        assert_eq!(resolved.auth_secret, "s3cret");
    }

    #[tokio::test]
    async fn test_static_credentials_reject_bad_gateway() {
        let config = EgressConfig {
            gateway_host: "http://gateway.test".into(),
            auth_secret: Some("s3cret".into()),
            ..EgressConfig::default()
        };
        let result = StaticCredentials::new(config).resolve().await;
        assert!(matches!(result, Err(ConfigurationError::InvalidGateway(_))));
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait::async_trait]
    impl CredentialSource for CountingSource {
        async fn resolve(&self) -> Result<ConnectionParams, ConfigurationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && call == 0 {
                return Err(ConfigurationError::MissingCredential(AUTH_SECRET_ENV));
            }
            Ok(params())
        }
    }

    #[tokio::test]
    async fn test_cache_converges_on_single_resolution() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail_first: false });
        let cached = Arc::new(CachedCredentials::new(source.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cached = cached.clone();
            handles.push(tokio::spawn(async move { cached.resolve().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), params());
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_does_not_keep_failures() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail_first: true });
        let cached = CachedCredentials::new(source.clone());

        assert!(cached.resolve().await.is_err());
        assert!(cached.resolve().await.is_ok());
        assert!(cached.resolve().await.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
