//! Process-wide tracing setup shared by the egress binaries.

mod subscriber;

pub use subscriber::{LogFormat, init as init_tracing, init_with_level};
pub use tracing::level_filters::LevelFilter;
