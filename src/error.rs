// src/error.rs
// Error types for harness setup, readiness and teardown

use thiserror::Error;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("workload exited unexpectedly: exit_code={code}")]
    ExitedEarly { code: i32 },

    #[error("workload not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience type alias for Result using HarnessError
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // Display tests
    // ============================================================================

    #[test]
    fn test_missing_env_error() {
        let err = HarnessError::MissingEnv("DOCKER_NETWORK");
        assert!(err.to_string().contains("missing required environment variable"));
        assert!(err.to_string().contains("DOCKER_NETWORK"));
    }

    #[test]
    fn test_invalid_env_error() {
        let err = HarnessError::InvalidEnv {
            name: "PROXY_HARNESS_PORT",
            value: "eighty".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value for PROXY_HARNESS_PORT: eighty");
    }

    #[test]
    fn test_exited_early_reports_code() {
        let err = HarnessError::ExitedEarly { code: 125 };
        assert!(err.to_string().contains("exit_code=125"));
    }

    #[test]
    fn test_not_ready_reports_attempts() {
        let err = HarnessError::NotReady { attempts: 20 };
        assert!(err.to_string().contains("20 attempts"));
    }

    #[test]
    fn test_launch_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = HarnessError::Launch {
            program: "docker".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("`docker`"));
        assert!(std::error::Error::source(&err).is_some());
    }

    // ============================================================================
    // Conversion tests
    // ============================================================================

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: HarnessError = io_err.into();
        assert!(matches!(err, HarnessError::Io(_)));
    }
}
