//! Plain-text tables for terminal output.

use std::fmt::Write as _;

use egress::{Endpoint, ProbeResult, RunSummary};

fn millis(value: Option<f64>) -> String {
    value.map(|ms| format!("{ms:.2}")).unwrap_or_else(|| "-".to_string())
}

fn line(cells: &[&str], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Render rows under a header, padding every column to its widest cell
fn render(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut out = String::new();
    let _ = writeln!(out, "{}", line(header, &widths));
    let _ = writeln!(out, "{}", line(&rule.iter().map(String::as_str).collect::<Vec<_>>(), &widths));
    for row in rows {
        let _ = writeln!(out, "{}", line(&row.iter().map(String::as_str).collect::<Vec<_>>(), &widths));
    }
    out
}

pub fn endpoints(endpoints: &[Endpoint]) -> String {
    let rows: Vec<Vec<String>> = endpoints
        .iter()
        .map(|e| {
            vec![
                e.isp_name.clone(),
                e.autonomous_system_id.clone().unwrap_or_default(),
                e.country.clone(),
                e.region.clone().unwrap_or_default(),
                e.city.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render(&["ISP", "ASN", "Country", "Region", "City"], &rows)
}

pub fn results(results: &[ProbeResult]) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            let location = match &r.endpoint.city {
                Some(city) => format!("{}, {}", city, r.endpoint.country),
                None => r.endpoint.country.clone(),
            };
            vec![
                r.rank.map(|rank| format!("#{rank}")).unwrap_or_else(|| "-".to_string()),
                r.endpoint.isp_name.clone(),
                location,
                millis(r.ping_latency_ms),
                millis(r.http_response_time_ms),
                millis(r.total_time_ms),
                r.status.to_string(),
                r.error_message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render(&["Rank", "ISP", "Location", "Ping (ms)", "HTTP (ms)", "Total (ms)", "Status", "Error"], &rows)
}

pub fn summary(summary: &RunSummary) -> String {
    let mut out = format!("\n{} successful, {} failed", summary.successful, summary.failed);
    if let Some(average) = summary.average_total_time_ms {
        let _ = write!(out, ", average total {average:.2} ms");
    }
    if let Some(best) = &summary.best {
        let _ = write!(out, ", fastest: {}", best.isp_name);
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_aligned() {
        let table = endpoints(&[
            Endpoint::new("Singtel", "Singapore"),
            Endpoint::new("Telstra Corporation", "Australia").with_city("Sydney"),
        ]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ISP                  ASN"));
        assert!(lines[1].starts_with("-------------------  ---"));
        assert_eq!(lines[2].find("Singapore"), lines[3].find("Australia"));
    }

    #[test]
    fn test_summary_line() {
        let summary = RunSummary { successful: 2, failed: 1, average_total_time_ms: Some(41.5), best: None };
        assert_eq!(super::summary(&summary), "\n2 successful, 1 failed, average total 41.50 ms\n");
    }
}
