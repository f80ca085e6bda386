//! Transport abstraction for reaching hosts.
//!
//! The [`Transport`] trait opens [`Session`]s; a session runs shell commands
//! and hands out a [`FileClient`] for writing files on the other side. This
//! allows for different implementations:
//! - [`ssh::SshTransport`] over the system OpenSSH client
//! - [`local::LocalTransport`] for configuring this machine
//! - Mock implementations for testing
//!
//! Every handle releases what it holds when dropped, so a job that bails out
//! halfway never leaks a connection or a half-written file.

pub mod local;
pub mod ssh;

use crate::error::Result;
use crate::types::{Credential, Host};
use std::io::Write;
use std::time::Duration;

/// Opens sessions to hosts
pub trait Transport: Send + Sync {
    /// Connect to a host, giving up after `timeout`
    fn connect(
        &self,
        host: &Host,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> Result<Box<dyn Session>>;
}

/// An open connection owned by exactly one job
pub trait Session: Send {
    /// Run a shell command, returning its captured stdout
    ///
    /// A non-zero exit is an error.
    fn run_command(&mut self, command: &str) -> Result<String>;

    /// Open a channel for writing files
    fn open_file_channel(&mut self) -> Result<Box<dyn FileClient + '_>>;
}

/// Creates files on the session's host
pub trait FileClient {
    /// Create (or truncate) a file, returning a handle to write its contents
    fn create_remote_file(&mut self, path: &str) -> Result<Box<dyn RemoteFile + '_>>;
}

/// A file being written on the session's host
pub trait RemoteFile: Write {
    /// Flush and close the file, reporting any error from the far side
    ///
    /// Dropping without calling this discards the write.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Quote a string for POSIX `sh`
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%=,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
