use std::sync::Once;

use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

static LOG_INIT: Once = Once::new();

/// Filter used when neither an explicit filter nor `RUST_LOG` is provided
pub const DEFAULT_LOG_FILTER: &str = "info,cosmian_oidc_auth=info,cosmian_oidc_cli=info";

/// Initialize the global tracing subscriber once for the whole process.
///
/// `rust_log` takes precedence over the `RUST_LOG` environment variable,
/// which itself takes precedence over [`DEFAULT_LOG_FILTER`].
///
/// Logs are written to the standard error.
/// Calling this function more than once is a no-op. If another global
/// subscriber has already been installed, the error is printed and ignored.
pub fn log_init(rust_log: Option<&str>) {
    LOG_INIT.call_once(|| {
        if let Err(e) = tracing_setup(build_filter(rust_log)) {
            eprintln!("unable to install the tracing subscriber: {e}");
        }
    });
}

fn build_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        EnvFilter::new,
    )
}

fn tracing_setup(filter: EnvFilter) -> Result<(), TryInitError> {
    subscriber(filter).try_init()
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    let format = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry().with(filter).with(format)
}
