//! Diagnostics via `tracing` + `tracing-subscriber`.
//!
//! Priority for the level:
//! 1. `--log-level` flag
//! 2. `JOBSH_LOG` environment variable (e.g. "debug")
//! 3. `warn`
//!
//! Events go to stderr. Shell output proper (job notices, builtin output) is
//! written directly and never goes through the subscriber.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt;

pub const LOG_ENV_VAR: &str = "JOBSH_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<&str>) -> Result<()> {
    let level = match cli_level {
        Some(s) => parse_level_str(s).ok_or_else(|| anyhow!("unknown log level '{s}'"))?,
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::WARN),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_level_str("DEBUG"), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level_str(" warning "), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }
}
