//! Endpoint directory: where the candidate egress points come from.
//!
//! A remote directory is optional. When it is missing, unreachable or empty
//! the built-in static list is served instead, so listing never fails.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::DirectoryError;
use crate::model::Endpoint;

/// Source of candidate endpoints
#[async_trait::async_trait]
pub trait EndpointDirectory: Send + Sync {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, DirectoryError>;
}

/// Deterministic built-in endpoint list
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticDirectory;

#[async_trait::async_trait]
impl EndpointDirectory for StaticDirectory {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, DirectoryError> {
        Ok(static_endpoints())
    }
}

/// Directory served as a JSON array by a remote service
pub struct HttpDirectory {
    client: reqwest::Client,
    url: String,
}

impl HttpDirectory {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait::async_trait]
impl EndpointDirectory for HttpDirectory {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, DirectoryError> {
        let endpoints = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Endpoint>>()
            .await?;
        Ok(endpoints)
    }
}

/// Serves the primary directory, or the static list when it cannot
pub struct FallbackDirectory {
    primary: Option<Box<dyn EndpointDirectory>>,
}

impl FallbackDirectory {
    pub fn new(primary: Option<Box<dyn EndpointDirectory>>) -> Self {
        Self { primary }
    }

    /// Build from an optional directory URL
    pub fn from_url(url: Option<&str>, timeout: Duration) -> Self {
        let primary = url.and_then(|url| match HttpDirectory::new(url, timeout) {
            Ok(directory) => Some(Box::new(directory) as Box<dyn EndpointDirectory>),
            Err(e) => {
                warn!("Failed to build endpoint directory client for {}: {}", url, e);
                None
            }
        });
        Self::new(primary)
    }

    /// Never fails: falls back to [`StaticDirectory`]
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        match self.list_endpoints().await {
            Ok(endpoints) => endpoints,
            Err(_) => static_endpoints(),
        }
    }
}

#[async_trait::async_trait]
impl EndpointDirectory for FallbackDirectory {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, DirectoryError> {
        let Some(primary) = &self.primary else {
            info!("No endpoint directory configured, using static list");
            return Ok(static_endpoints());
        };

        match primary.list_endpoints().await {
            Ok(endpoints) if !endpoints.is_empty() => Ok(endpoints),
            Ok(_) => {
                warn!("Endpoint directory returned no endpoints, using static list");
                Ok(static_endpoints())
            }
            Err(e) => {
                warn!("Endpoint directory unavailable, using static list: {}", e);
                Ok(static_endpoints())
            }
        }
    }
}

fn isp(name: &str, asn: &str, country: &str, region: Option<&str>, city: &str) -> Endpoint {
    let endpoint = Endpoint::new(name, country).with_asn(asn).with_city(city);
    match region {
        Some(region) => endpoint.with_region(region),
        None => endpoint,
    }
}

/// The built-in list, in a fixed order
pub fn static_endpoints() -> Vec<Endpoint> {
    vec![
        isp("AT&T Internet Services", "AS7018", "United States", Some("California"), "Los Angeles"),
        isp("Verizon Business", "AS701", "United States", Some("New York"), "New York"),
        isp("Comcast Cable", "AS7922", "United States", Some("Pennsylvania"), "Philadelphia"),
        isp("Deutsche Telekom AG", "AS3320", "Germany", Some("Bavaria"), "Munich"),
        isp("British Telecom", "AS2856", "United Kingdom", Some("England"), "London"),
        isp("Orange S.A.", "AS3215", "France", Some("Île-de-France"), "Paris"),
        isp("Vodafone Italia", "AS30722", "Italy", Some("Lombardy"), "Milan"),
        isp("Telefonica Spain", "AS3352", "Spain", Some("Madrid"), "Madrid"),
        isp("KPN Netherlands", "AS1136", "Netherlands", Some("North Holland"), "Amsterdam"),
        isp("Swisscom", "AS3303", "Switzerland", Some("Zurich"), "Zurich"),
        isp("NTT Communications", "AS2914", "Japan", Some("Tokyo"), "Tokyo"),
        isp("China Telecom", "AS4134", "China", Some("Beijing"), "Beijing"),
        isp("KDDI Corporation", "AS2516", "Japan", Some("Osaka"), "Osaka"),
        isp("Singtel", "AS7473", "Singapore", None, "Singapore"),
        isp("Telstra Corporation", "AS1221", "Australia", Some("New South Wales"), "Sydney"),
        isp("Optus Australia", "AS4804", "Australia", Some("Victoria"), "Melbourne"),
        isp("Bell Canada", "AS577", "Canada", Some("Ontario"), "Toronto"),
        isp("Rogers Communications", "AS812", "Canada", Some("Ontario"), "Toronto"),
        isp("Telmex Colombia", "AS10620", "Colombia", None, "Bogota"),
        isp("Claro Brasil", "AS28573", "Brazil", Some("São Paulo"), "São Paulo"),
        isp("Telefonica Argentina", "AS7303", "Argentina", None, "Buenos Aires"),
        isp("Tata Communications", "AS6453", "India", Some("Maharashtra"), "Mumbai"),
        isp("Airtel India", "AS45609", "India", Some("Delhi"), "New Delhi"),
        isp("Etisalat UAE", "AS5384", "United Arab Emirates", None, "Dubai"),
        isp("MTN South Africa", "AS36994", "South Africa", None, "Johannesburg"),
        isp("Turkcell", "AS47524", "Turkey", None, "Istanbul"),
        isp("Cox Communications", "AS22773", "United States", Some("Arizona"), "Phoenix"),
        isp("Charter Communications", "AS20115", "United States", Some("Missouri"), "St. Louis"),
        isp("CenturyLink", "AS209", "United States", Some("Louisiana"), "Monroe"),
        isp("Cogent Communications", "AS174", "United States", Some("District of Columbia"), "Washington"),
        isp("Level 3 Communications", "AS3356", "United States", Some("Colorado"), "Broomfield"),
        isp("Hurricane Electric", "AS6939", "United States", Some("California"), "Fremont"),
        isp("NTT America", "AS2914", "United States", Some("Virginia"), "Ashburn"),
        isp("Zayo Bandwidth", "AS8218", "United States", Some("Colorado"), "Boulder"),
        isp("GTT Communications", "AS3257", "United States", Some("Virginia"), "McLean"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_static_list_is_stable() {
        let first = static_endpoints();
        assert_eq!(first.len(), 35);
        assert_eq!(first, static_endpoints());
        assert_eq!(first[0].isp_name, "AT&T Internet Services");
        assert!(first.iter().all(|e| !e.isp_name.is_empty() && !e.country.is_empty()));
    }

    #[tokio::test]
    async fn test_unconfigured_uses_static_list() {
        let directory = FallbackDirectory::new(None);
        assert_eq!(directory.list_endpoints().await.unwrap(), static_endpoints());
    }

    #[tokio::test]
    async fn test_remote_directory_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Zeta Net", "country": "Norway"},
                {"ispName": "Alpha Net", "country": "Finland", "city": "Helsinki"}
            ])))
            .mount(&server)
            .await;

        let directory = FallbackDirectory::from_url(Some(&server.uri()), Duration::from_secs(5));
        let endpoints = directory.endpoints().await;
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].isp_name, "Zeta Net");
        assert_eq!(endpoints[1].city.as_deref(), Some("Helsinki"));
    }

    #[tokio::test]
    async fn test_failing_directory_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let directory = FallbackDirectory::from_url(Some(&server.uri()), Duration::from_secs(5));
        assert_eq!(directory.list_endpoints().await.unwrap(), static_endpoints());
    }

    #[tokio::test]
    async fn test_empty_directory_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let directory = FallbackDirectory::from_url(Some(&server.uri()), Duration::from_secs(5));
        assert_eq!(directory.endpoints().await, static_endpoints());
    }
}
