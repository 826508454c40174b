//! Error types raised by the convergence engine itself.
//!
//! Errors coming from concrete providers (state inspection, handlers,
//! converge bodies) are never wrapped: they travel through `anyhow::Error`
//! unchanged. Only conditions the engine detects on its own are listed here.

use std::path::PathBuf;
use thiserror::Error;

/// Conditions detected by the engine.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// The provider has no handler registered for the requested action
    #[error("{resource}: no such action '{action}'")]
    NoSuchAction {
        /// Requested action name
        action: String,
        /// Resource the provider was bound to, as `type[name]`
        resource: String,
    },

    /// No resource with this `type[name]` key in the collection
    #[error("resource not found: {key}")]
    ResourceNotFound {
        /// Key that was looked up
        key: String,
    },

    /// A command run through `shell_out_checked` exited unsuccessfully
    #[error("command failed: {command} (exit {status}): {stderr}")]
    CommandFailed {
        /// Command line as it was run
        command: String,
        /// Exit code, or `signal` when the process was killed
        status: String,
        /// Trimmed standard error
        stderr: String,
    },

    /// Configuration file could not be parsed
    #[error("invalid config {}: {message}", path.display())]
    Config {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_action_message() {
        let err = ConvergeError::NoSuchAction {
            action: "explode".to_string(),
            resource: "file[/tmp/x]".to_string(),
        };
        assert_eq!(err.to_string(), "file[/tmp/x]: no such action 'explode'");
    }

    #[test]
    fn test_errors_survive_anyhow() {
        let err: anyhow::Error = ConvergeError::ResourceNotFound {
            key: "user[bob]".to_string(),
        }
        .into();
        assert!(matches!(
            err.downcast_ref::<ConvergeError>(),
            Some(ConvergeError::ResourceNotFound { key }) if key == "user[bob]"
        ));
    }
}
