//! Logging setup for the binary
//!
//! The subscriber goes in before the configuration is read, so config
//! loading can log. The configured level is applied afterwards through a
//! reload handle unless `RUST_LOG` is set.

use crate::error::ConfigError;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

pub type LevelHandle = reload::Handle<EnvFilter, Registry>;

/// Installs the global subscriber: `RUST_LOG` if set, otherwise `info`
pub fn init_logging() -> LevelHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    handle
}

pub fn apply_log_level(handle: &LevelHandle, level: &str) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| ConfigError::Invalid(format!("log_level '{}': {}", level, e)))?;
    handle
        .reload(filter)
        .map_err(|e| ConfigError::Invalid(format!("log_level '{}': {}", level, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_configured_level_replaces_provisional_one() {
        let (filter, handle) = reload::Layer::new(EnvFilter::new("info"));
        let _subscriber = tracing_subscriber::registry().with(filter);

        apply_log_level(&handle, "debug").unwrap();
        let level = handle.with_current(|f| f.max_level_hint()).unwrap();
        assert_eq!(level, Some(LevelFilter::DEBUG));

        // A bad level keeps the current filter
        assert!(matches!(
            apply_log_level(&handle, "info,tb3=notalevel"),
            Err(ConfigError::Invalid(_))
        ));
        let level = handle.with_current(|f| f.max_level_hint()).unwrap();
        assert_eq!(level, Some(LevelFilter::DEBUG));
    }
}
