use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProbeError;

/// An egress point to probe, identified by ISP and location.
///
/// Two endpoints are the same only if every field matches; duplicates in a
/// run are probed independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// ISP name (e.g., "Deutsche Telekom AG")
    #[serde(alias = "name", alias = "isp")]
    pub isp_name: String,

    /// Autonomous system number (e.g., "AS3320")
    #[serde(alias = "asn", default, skip_serializing_if = "Option::is_none")]
    pub autonomous_system_id: Option<String>,

    /// Country name
    pub country: String,

    /// State or province
    #[serde(alias = "state", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// City name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Endpoint {
    pub fn new(isp_name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            isp_name: isp_name.into(),
            autonomous_system_id: None,
            country: country.into(),
            region: None,
            city: None,
        }
    }

    pub fn with_asn(mut self, asn: impl Into<String>) -> Self {
        self.autonomous_system_id = Some(asn.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Location summary carried by every result for this endpoint
    pub fn summary(&self) -> EndpointLocationSummary {
        EndpointLocationSummary {
            isp_name: self.isp_name.clone(),
            autonomous_system_id: self.autonomous_system_id.clone(),
            country: self.country.clone(),
            region: self.region.clone(),
            city: self.city.clone(),
        }
    }
}

/// Endpoint fields copied onto a probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointLocationSummary {
    pub isp_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autonomous_system_id: Option<String>,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Status of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Testing,
    Success,
    Failed,
    Timeout,
}

impl ProbeStatus {
    /// Whether the probe has reached a final state
    pub fn is_final(self) -> bool {
        !matches!(self, ProbeStatus::Testing)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Testing => write!(f, "testing"),
            ProbeStatus::Success => write!(f, "success"),
            ProbeStatus::Failed => write!(f, "failed"),
            ProbeStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Geolocation data for the address a probe egressed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentInfo {
    pub ip_address: String,
    pub continent_code: String,
    pub continent_name: String,
    pub country_code: String,
    pub country_name: String,
    pub state_prov: String,
    pub city: String,
    pub isp: String,
    pub asn: String,
    pub organization: String,
}

/// Result of probing one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Stable within a run; the placeholder and the final result share it
    pub id: Uuid,

    pub endpoint: EndpointLocationSummary,

    /// HEAD round trip through the egress point, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_latency_ms: Option<f64>,

    /// Full GET round trip through the egress point, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_time_ms: Option<f64>,

    /// Sum of ping and HTTP time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time_ms: Option<f64>,

    pub status: ProbeStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentInfo>,

    /// 1-based position among successful results, set once the run completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl ProbeResult {
    /// Create the placeholder published while a probe is in flight
    pub fn testing(id: Uuid, endpoint: &Endpoint) -> Self {
        Self {
            id,
            endpoint: endpoint.summary(),
            ping_latency_ms: None,
            http_response_time_ms: None,
            total_time_ms: None,
            status: ProbeStatus::Testing,
            error_message: None,
            enrichment: None,
            rank: None,
        }
    }

    /// Mark the probe as successful with both measured latencies
    pub fn success(mut self, ping_ms: f64, http_ms: f64) -> Self {
        let ping_ms = round_latency(ping_ms);
        let http_ms = round_latency(http_ms);
        self.status = ProbeStatus::Success;
        self.ping_latency_ms = Some(ping_ms);
        self.http_response_time_ms = Some(http_ms);
        self.total_time_ms = Some(round_latency(ping_ms + http_ms));
        self.error_message = None;
        self
    }

    /// Mark the probe as failed or timed out, dropping any latency
    pub fn failure(mut self, error: &ProbeError) -> Self {
        self.status = error.status();
        self.ping_latency_ms = None;
        self.http_response_time_ms = None;
        self.total_time_ms = None;
        self.enrichment = None;
        self.error_message = Some(error.to_string());
        self
    }

    pub fn with_enrichment(mut self, enrichment: EnrichmentInfo) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }
}

/// Round milliseconds to two decimals, never below zero.
pub fn round_latency(ms: f64) -> f64 {
    if !ms.is_finite() || ms <= 0.0 {
        return 0.0;
    }
    (ms * 100.0).round() / 100.0
}

/// Counters describing how far a run has progressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub running: usize,
    pub failed: usize,
    pub successful: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { total, ..Self::default() }
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}
