//! Tracing subscriber initialisation from logger configuration.
//!
//! `RUST_LOG` takes precedence over the configured level, matching the
//! usual operator expectation.

use tracing_subscriber::EnvFilter;

use crate::config::LoggerSettings;

pub fn init(settings: &LoggerSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

    let json = settings.format.eq_ignore_ascii_case("json");
    let to_stderr = settings.output.eq_ignore_ascii_case("stderr");

    match (json, to_stderr) {
        (true, true) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        (true, false) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        (false, true) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        (false, false) => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    }
    .map_err(|err| anyhow::anyhow!("initialising tracing subscriber: {err}"))
}
