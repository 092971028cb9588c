//! Tracing subscriber setup

use crate::error::SessionError;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber
///
/// `RUST_LOG` overrides `default_filter` when set.
///
/// # Errors
/// - `SessionError::Telemetry` if the filter is invalid or a global
///   subscriber is already installed
pub fn init_tracing(default_filter: &str) -> Result<(), SessionError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| SessionError::Telemetry(format!("invalid filter {default_filter:?}: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| SessionError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_error_instead_of_panicking() {
        // Whichever call comes first may succeed; the second must not panic
        let _ = init_tracing("warn");
        assert!(init_tracing("warn").is_err());
    }
}
