//! CLI Error Types
//!
//! Wraps the simulator's own errors with the hint a person at a terminal
//! needs to fix them.

use tagsim_core::TagError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file could not be read, parsed or validated
    #[error("Invalid configuration: {source}\n  Hint: Run 'tagsim --print-config' to see a valid configuration")]
    Config {
        #[source]
        source: TagError,
    },

    /// Any other simulator failure (startup, shutdown, teardown)
    #[error("Simulator error [{code:#06x}]: {source}")]
    Simulator {
        code: u32,
        #[source]
        source: TagError,
    },

    /// Installing the Ctrl-C / SIGTERM handlers failed
    #[error("Signal handling failed: {0}")]
    Signal(#[source] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<TagError> for CliError {
    fn from(source: TagError) -> Self {
        match source.error_category() {
            0x4000 | 0x8000 | 0x9000 => Self::Config { source },
            _ => Self::Simulator {
                code: source.error_code(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_carry_hint() {
        let err = CliError::from(TagError::InvalidConfiguration {
            parameter: "update_interval_ms".to_string(),
            reason: "must be greater than zero".to_string(),
        });
        assert!(matches!(err, CliError::Config { .. }));
        assert!(err.to_string().contains("--print-config"));
    }

    #[test]
    fn test_other_errors_show_code() {
        let err = CliError::from(TagError::TeardownBlocked { holders: 2 });
        assert!(err.to_string().starts_with("Simulator error [0x7003]"));
    }
}
