//! Post-run ranking and summary of probe results.

use serde::{Deserialize, Serialize};

use crate::model::{EndpointLocationSummary, ProbeResult, ProbeStatus, round_latency};

/// Assign dense 1-based ranks to successful results by ascending total time.
///
/// Ties keep the order of `results`. Every other result has its rank
/// cleared, so calling this twice gives the same ranks.
pub fn assign_ranks(results: &mut [ProbeResult]) {
    let mut ranked: Vec<(usize, f64)> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status == ProbeStatus::Success)
        .filter_map(|(i, r)| r.total_time_ms.map(|total| (i, total)))
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    for result in results.iter_mut() {
        result.rank = None;
    }
    for (position, (index, _)) in ranked.into_iter().enumerate() {
        results[index].rank = Some(position as u32 + 1);
    }
}

/// Results ordered by rank, unranked ones last in their original order
pub fn sorted_by_rank(results: &[ProbeResult]) -> Vec<ProbeResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by_key(|r| r.rank.unwrap_or(u32::MAX));
    sorted
}

/// Headline numbers for a set of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub successful: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_total_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<EndpointLocationSummary>,
}

impl RunSummary {
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let successes: Vec<&ProbeResult> = results.iter().filter(|r| r.is_success()).collect();
        let failed = results
            .iter()
            .filter(|r| matches!(r.status, ProbeStatus::Failed | ProbeStatus::Timeout))
            .count();

        let totals: Vec<f64> = successes.iter().filter_map(|r| r.total_time_ms).collect();
        let average_total_time_ms = if totals.is_empty() {
            None
        } else {
            Some(round_latency(totals.iter().sum::<f64>() / totals.len() as f64))
        };

        let best = successes
            .iter()
            .filter(|r| r.total_time_ms.is_some())
            .min_by(|a, b| {
                let (a, b) = (a.total_time_ms.unwrap_or(f64::MAX), b.total_time_ms.unwrap_or(f64::MAX));
                a.total_cmp(&b)
            })
            .map(|r| r.endpoint.clone());

        Self { successful: successes.len(), failed, average_total_time_ms, best }
    }
}
