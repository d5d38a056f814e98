//! Validation of run submissions.
//!
//! Everything here runs synchronously before a run is created, so a rejected
//! submission never leaves a session behind.

use crate::config::SchedulerConfig;
use crate::error::ValidationError;
use crate::model::Endpoint;

/// Upper bound on concurrency regardless of configuration
pub const MAX_CONCURRENCY: usize = 50;

/// Validate a submission and return the concurrency limit to run it with
pub fn validate_run(
    endpoints: &[Endpoint],
    requested: Option<usize>,
    config: &SchedulerConfig,
) -> Result<usize, ValidationError> {
    validate_endpoints(endpoints)?;
    resolve_concurrency(requested, config)
}

/// Non-empty list, every endpoint naming an ISP and a country
pub fn validate_endpoints(endpoints: &[Endpoint]) -> Result<(), ValidationError> {
    if endpoints.is_empty() {
        return Err(ValidationError::EmptyEndpoints);
    }

    for (index, endpoint) in endpoints.iter().enumerate() {
        if endpoint.isp_name.trim().is_empty() {
            return Err(ValidationError::InvalidEndpoint { index, reason: "ISP name is empty" });
        }
        if endpoint.country.trim().is_empty() {
            return Err(ValidationError::InvalidEndpoint { index, reason: "country is empty" });
        }
    }

    Ok(())
}

/// Apply the configured default and reject limits outside `1..=max`
pub fn resolve_concurrency(
    requested: Option<usize>,
    config: &SchedulerConfig,
) -> Result<usize, ValidationError> {
    let max = config.max_concurrency.clamp(1, MAX_CONCURRENCY);
    let value = requested.unwrap_or_else(|| config.default_concurrency.clamp(1, max));

    if !(1..=max).contains(&value) {
        return Err(ValidationError::ConcurrencyOutOfRange { value, min: 1, max });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Vec<Endpoint> {
        vec![Endpoint::new("Turkcell", "Turkey"), Endpoint::new("Singtel", "Singapore")]
    }

    #[test]
    fn test_empty_list_rejected() {
        let result = validate_run(&[], Some(5), &SchedulerConfig::default());
        assert_eq!(result, Err(ValidationError::EmptyEndpoints));
        assert_eq!(ValidationError::EmptyEndpoints.to_string(), "No endpoints provided");
    }

    #[test]
    fn test_default_concurrency() {
        assert_eq!(validate_run(&endpoints(), None, &SchedulerConfig::default()), Ok(10));
    }

    #[test]
    fn test_concurrency_bounds() {
        let config = SchedulerConfig::default();
        assert_eq!(resolve_concurrency(Some(1), &config), Ok(1));
        assert_eq!(resolve_concurrency(Some(50), &config), Ok(50));
        assert_eq!(
            resolve_concurrency(Some(0), &config),
            Err(ValidationError::ConcurrencyOutOfRange { value: 0, min: 1, max: 50 })
        );
        assert!(resolve_concurrency(Some(51), &config).is_err());
    }

    #[test]
    fn test_configured_max_cannot_exceed_hard_cap() {
        let config = SchedulerConfig { default_concurrency: 10, max_concurrency: 500 };
        assert!(resolve_concurrency(Some(100), &config).is_err());

        let tight = SchedulerConfig { default_concurrency: 10, max_concurrency: 4 };
        assert_eq!(resolve_concurrency(None, &tight), Ok(4));
        assert!(resolve_concurrency(Some(5), &tight).is_err());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut list = endpoints();
        list[1].country = "  ".into();
        assert_eq!(
            validate_endpoints(&list),
            Err(ValidationError::InvalidEndpoint { index: 1, reason: "country is empty" })
        );

        list[0].isp_name = String::new();
        assert!(matches!(
            validate_endpoints(&list),
            Err(ValidationError::InvalidEndpoint { index: 0, .. })
        ));
    }
}
