//! Latency probing and ranking of proxy egress points.
//!
//! A run probes a list of [`Endpoint`]s through a bounded worker pool. Each
//! probe measures a reachability check and a full fetch through the endpoint's
//! egress route. Progress is recorded in a [`SessionStore`] that callers poll,
//! and successful results are ranked by total time once the run completes.

pub mod config;
pub mod context;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod executor;
pub mod export;
pub mod geo;
pub mod model;
pub mod progress;
pub mod ranker;
pub mod retention;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod validation;

pub use config::Config;
pub use context::EgressContext;
pub use error::{ConfigurationError, ProbeError, StoreError, ValidationError};
pub use executor::{ProbeExecutor, ProbeSettings};
pub use model::{Endpoint, EndpointLocationSummary, EnrichmentInfo, ProbeResult, ProbeStatus, Progress};
pub use progress::{ProbeEvent, ProgressAggregator};
pub use ranker::{RunSummary, assign_ranks};
pub use runner::{RunRequest, RunService};
pub use scheduler::ProbeScheduler;
pub use store::{RunSnapshot, SessionStore};
