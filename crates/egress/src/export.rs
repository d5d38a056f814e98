//! CSV and JSON renderings of a run's results.

use std::fmt::Write as _;

use crate::model::ProbeResult;

const CSV_HEADER: &str =
    "Rank,ISP,Country,Region,City,ASN,Ping (ms),HTTP Time (ms),Total Time (ms),Status,Error";

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn render(self, results: &[ProbeResult]) -> Result<String, serde_json::Error> {
        match self {
            ExportFormat::Csv => Ok(to_csv(results)),
            ExportFormat::Json => to_json(results),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unsupported export format: {other}")),
        }
    }
}

/// One header line plus one row per result, in the given order
pub fn to_csv(results: &[ProbeResult]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for result in results {
        let endpoint = &result.endpoint;
        let row = [
            result.rank.map(|r| r.to_string()).unwrap_or_default(),
            escape(&endpoint.isp_name),
            escape(&endpoint.country),
            escape(endpoint.region.as_deref().unwrap_or_default()),
            escape(endpoint.city.as_deref().unwrap_or_default()),
            escape(endpoint.autonomous_system_id.as_deref().unwrap_or_default()),
            millis(result.ping_latency_ms),
            millis(result.http_response_time_ms),
            millis(result.total_time_ms),
            result.status.to_string(),
            escape(result.error_message.as_deref().unwrap_or_default()),
        ];
        let _ = writeln!(out, "{}", row.join(","));
    }

    out
}

/// Pretty-printed JSON array of the full result objects
pub fn to_json(results: &[ProbeResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}

fn millis(value: Option<f64>) -> String {
    value.map(|ms| format!("{ms:.2}")).unwrap_or_default()
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::model::Endpoint;
    use uuid::Uuid;

    fn results() -> Vec<ProbeResult> {
        let ok = Endpoint::new("Orange S.A.", "France")
            .with_asn("AS3215")
            .with_region("Île-de-France")
            .with_city("Paris");
        let mut first = ProbeResult::testing(Uuid::new_v4(), &ok).success(12.5, 80.0);
        first.rank = Some(1);

        let bad = Endpoint::new("Telmex, Colombia", "Colombia");
        let second = ProbeResult::testing(Uuid::new_v4(), &bad).failure(&ProbeError::Network {
            stage: "full fetch",
            message: "proxy said \"no\"".into(),
        });
        vec![first, second]
    }

    #[test]
    fn test_csv_rows() {
        let csv = to_csv(&results());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1,Orange S.A.,France,Île-de-France,Paris,AS3215,12.50,80.00,92.50,success,");
        assert!(lines[2].starts_with(",\"Telmex, Colombia\",Colombia,,,,,,,failed,"));
        assert!(lines[2].contains("\"\"no\"\""));
    }

    #[test]
    fn test_csv_empty() {
        assert_eq!(to_csv(&[]), format!("{CSV_HEADER}\n"));
    }

    #[test]
    fn test_json_is_full_objects() {
        let json = to_json(&results()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["endpoint"]["city"], "Paris");
        assert_eq!(value[0]["totalTimeMs"], 92.5);
        assert_eq!(value[1]["status"], "failed");
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
    }
}
