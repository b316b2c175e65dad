mod log_utils;

pub use log_utils::{DEFAULT_LOG_FILTER, log_init};
// Re-exported so that dependent crates log through the same `tracing` version
pub use tracing::{debug, error, info, trace, warn};
