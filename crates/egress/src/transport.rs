use std::net::IpAddr;
use std::sync::Arc;

use reqwest::{Client, Proxy};
use url::Url;

use crate::credentials::EgressRoute;
use crate::error::{ConfigurationError, TransportError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Network operations a probe performs through an egress route.
///
/// Implementations do not enforce timeouts; the executor bounds every call.
#[async_trait::async_trait]
pub trait EgressTransport: Send + Sync {
    /// Lightweight reachability request, returns the status code
    async fn head(&self, route: &EgressRoute, target: &Url) -> Result<u16, TransportError>;

    /// Full fetch including the response body, returns the status code
    async fn fetch(&self, route: &EgressRoute, target: &Url) -> Result<u16, TransportError>;

    /// Address the outside world sees for requests on this route
    async fn public_address(&self, route: &EgressRoute) -> Result<IpAddr, TransportError>;

    /// Set up whatever `route` needs before the first timed request.
    ///
    /// A returned transport serves every later call for this route; `None`
    /// means `self` does.
    async fn prepare(
        &self,
        _route: &EgressRoute,
    ) -> Result<Option<Arc<dyn EgressTransport>>, TransportError> {
        Ok(None)
    }
}

/// Sends requests through the HTTP proxy described by the route
pub struct ProxyTransport {
    ip_echo_url: Url,
    /// Set once the transport is bound to a single route
    client: Option<Client>,
}

impl ProxyTransport {
    pub fn new(ip_echo_url: Url) -> Self {
        Self { ip_echo_url, client: None }
    }

    fn client_for(&self, route: &EgressRoute) -> Result<Client, TransportError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let proxy = Proxy::all(route.proxy_url.as_str())
            .map_err(|e| TransportError::Network(e.to_string()))?
            .basic_auth(&route.username, &route.password);

        Client::builder()
            .proxy(proxy)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}

/// Treat anything outside 2xx as a failed check
fn require_success(status: reqwest::StatusCode) -> Result<u16, TransportError> {
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(TransportError::HttpStatus(status.as_u16()))
    }
}

#[async_trait::async_trait]
impl EgressTransport for ProxyTransport {
    async fn head(&self, route: &EgressRoute, target: &Url) -> Result<u16, TransportError> {
        let client = self.client_for(route)?;
        let response = client.head(target.clone()).send().await?;
        require_success(response.status())
    }

    async fn fetch(&self, route: &EgressRoute, target: &Url) -> Result<u16, TransportError> {
        let client = self.client_for(route)?;
        let response = client.get(target.clone()).send().await?;
        let status = require_success(response.status())?;
        response.bytes().await?;
        Ok(status)
    }

    async fn public_address(&self, route: &EgressRoute) -> Result<IpAddr, TransportError> {
        let client = self.client_for(route)?;
        let response = client.get(self.ip_echo_url.clone()).send().await?;
        require_success(response.status())?;
        let body = response.text().await?;
        body.trim()
            .parse::<IpAddr>()
            .map_err(|_| TransportError::InvalidResponse(format!("not an IP address: {}", body.trim())))
    }

    async fn prepare(
        &self,
        route: &EgressRoute,
    ) -> Result<Option<Arc<dyn EgressTransport>>, TransportError> {
        let bound = ProxyTransport {
            ip_echo_url: self.ip_echo_url.clone(),
            client: Some(self.client_for(route)?),
        };
        let bound: Arc<dyn EgressTransport> = Arc::new(bound);
        Ok(Some(bound))
    }
}

/// Parse a configured URL, reporting it as a configuration problem
pub fn parse_url(value: &str) -> Result<Url, ConfigurationError> {
    Url::parse(value).map_err(|e| ConfigurationError::InvalidUrl(format!("{value}: {e}")))
}
