//! Error types for provisioning operations.
//!
//! Job-level errors never escape a job: they are reported on the error
//! channel and turned into a [`JobState::Aborted`](crate::JobState) outcome.
//! The variants here are what transports and sessions return, plus the
//! selection and credential errors that stop a run before it starts.

use thiserror::Error;

/// Errors that can occur while provisioning hosts.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not open a session to a host
    #[error("connection to {host} failed: {message}")]
    Connect {
        /// Host label
        host: String,
        /// What went wrong
        message: String,
    },

    /// A command exited unsuccessfully
    #[error("command `{command}` failed: {message}")]
    Command {
        /// Command line that was run
        command: String,
        /// Exit status and captured stderr
        message: String,
    },

    /// A process could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Reading a local file or writing a remote one failed
    #[error("transfer of {path} failed: {message}")]
    Transfer {
        /// File involved
        path: String,
        /// What went wrong
        message: String,
    },

    /// Credentials for a password-auth host could not be collected
    #[error("no credentials for {host}: {message}")]
    Credential {
        /// Host label
        host: String,
        /// What went wrong
        message: String,
    },

    /// The host inventory is empty
    #[error("no hosts configured")]
    NoHostsConfigured,

    /// No configured host matches the search term
    #[error("no hosts match '{term}'")]
    NoTargets {
        /// Host name or spec group searched for
        term: String,
    },
}

impl Error {
    /// Build a command error from a finished process
    pub fn command_failed(command: &str, status: std::process::ExitStatus, stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr);
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {stderr}")
        };
        Self::Command {
            command: command.to_string(),
            message,
        }
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;
