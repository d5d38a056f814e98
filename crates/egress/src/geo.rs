use std::net::IpAddr;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::EnrichmentError;
use crate::model::EnrichmentInfo;

const NOT_AVAILABLE: &str = "N/A";
const FREE_API_KEY: &str = "free";

/// Geolocation lookup for an egress address
#[async_trait::async_trait]
pub trait GeoLookup: Send + Sync {
    /// `Ok(None)` when the provider has no record for `ip`
    async fn lookup(&self, ip: IpAddr) -> Result<Option<EnrichmentInfo>, EnrichmentError>;
}

/// Response from the db-ip.com v2 API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DbIpResponse {
    ip_address: Option<String>,
    continent_code: Option<String>,
    continent_name: Option<String>,
    country_code: Option<String>,
    country_name: Option<String>,
    state_prov: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    asn: Option<String>,
    organization: Option<String>,
    error: Option<String>,
}

impl DbIpResponse {
    fn into_info(self, ip: IpAddr) -> EnrichmentInfo {
        let or_na = |value: Option<String>| {
            value.filter(|v| !v.is_empty()).unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };

        EnrichmentInfo {
            ip_address: self.ip_address.filter(|v| !v.is_empty()).unwrap_or_else(|| ip.to_string()),
            continent_code: or_na(self.continent_code),
            continent_name: or_na(self.continent_name),
            country_code: or_na(self.country_code),
            country_name: or_na(self.country_name),
            state_prov: or_na(self.state_prov),
            city: or_na(self.city),
            isp: or_na(self.isp),
            asn: or_na(self.asn),
            organization: or_na(self.organization),
        }
    }
}

/// Client for the db-ip.com address lookup API
pub struct DbIpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DbIpClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.unwrap_or_else(|| FREE_API_KEY.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl GeoLookup for DbIpClient {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<EnrichmentInfo>, EnrichmentError> {
        let url = format!("{}/{}/{}", self.base_url, self.api_key, ip);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(EnrichmentError::Lookup(format!("HTTP error! status: {}", response.status())));
        }

        let body = response.json::<DbIpResponse>().await?;
        if let Some(error) = body.error {
            return Err(EnrichmentError::Lookup(error));
        }

        Ok(Some(body.into_info(ip)))
    }
}
