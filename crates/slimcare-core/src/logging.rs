//! Structured logging setup.
//!
//! The library only emits `tracing` events; hosts call [`init_logging`] once
//! to print them.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "SLIMCARE_LOG";

/// Install a global fmt subscriber filtered at `level` for this workspace.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            EnvFilter::new(format!("slimcare_core={level},slimcare_ai={level}"))
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init_logging("debug");
        assert!(!init_logging("debug"));
    }
}
