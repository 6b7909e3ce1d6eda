use anyhow::{Result, anyhow};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

/// `RUST_LOG` wins over the configured level; a bad directive falls back to `info`.
pub(crate) fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let directives = filter.to_string();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    debug!(filter = %directives, "logging initialised");
    Ok(())
}
