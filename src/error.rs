// ABOUTME: Error types for the clone-and-dump workflow
// ABOUTME: Each variant names the instance or file involved so failures are actionable

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarbonCopyError {
    #[error(
        "Instance identifier '{0}' is not in the whitelist. Add a production:development pair to the whitelist file"
    )]
    UnauthorizedIdentifier(String),

    #[error("Refusing to dump '{0}': it is a production instance identifier")]
    ProductionTarget(String),

    #[error("Control plane operation '{operation}' failed for '{identifier}'")]
    ControlPlane {
        operation: &'static str,
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Credentials for '{username}' on {host} still not usable after {attempts} attempts")]
    Connectivity {
        host: String,
        username: String,
        attempts: u32,
    },

    #[error("Failed to provision read-only user on {host}")]
    Rotation {
        host: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Dump of '{database}' into {} failed: {reason}", path.display())]
    DumpProcess {
        database: String,
        path: PathBuf,
        #[source]
        reason: DumpFailure,
    },

    #[error("Interrupted before {0}")]
    Interrupted(String),

    #[error("Invalid whitelist: {0}")]
    Whitelist(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CarbonCopyError {
    pub(crate) fn control_plane(
        operation: &'static str,
        identifier: &str,
        source: anyhow::Error,
    ) -> Self {
        CarbonCopyError::ControlPlane {
            operation,
            identifier: identifier.to_string(),
            source,
        }
    }
}

/// Why a supervised dump process did not produce a complete file.
#[derive(Debug, Error)]
pub enum DumpFailure {
    #[error("could not start dump process")]
    Spawn(#[source] std::io::Error),

    #[error("i/o error while supervising dump process")]
    Io(#[source] std::io::Error),

    #[error("dump process exited with {}", describe_exit(*code))]
    Exited { code: Option<i32> },

    #[error("dump process still running after {0:?}")]
    TimedOut(Duration),

    #[error("dump cancelled")]
    Cancelled,
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message_names_identifier() {
        let err = CarbonCopyError::UnauthorizedIdentifier("prod-1".to_string());
        assert!(err.to_string().contains("'prod-1'"));
    }

    #[test]
    fn test_dump_failure_exit_codes() {
        assert_eq!(
            DumpFailure::Exited { code: Some(2) }.to_string(),
            "dump process exited with status 2"
        );
        assert!(DumpFailure::Exited { code: None }
            .to_string()
            .contains("signal"));
    }

    #[test]
    fn test_interrupted_names_skipped_step() {
        let err = CarbonCopyError::Interrupted("provisioning 'prod-1'".to_string());
        assert_eq!(err.to_string(), "Interrupted before provisioning 'prod-1'");
    }

    #[test]
    fn test_control_plane_error_keeps_source() {
        let err = CarbonCopyError::control_plane(
            "delete_instance",
            "dev-1",
            anyhow::anyhow!("throttled"),
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("throttled"));
    }
}
