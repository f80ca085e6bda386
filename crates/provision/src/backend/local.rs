//! Session that runs everything on this machine.

use crate::backend::{FileClient, RemoteFile, Session, Transport};
use crate::error::{Error, Result};
use crate::types::{Credential, Host};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Transport whose sessions all run on this machine
#[derive(Debug, Default)]
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn connect(
        &self,
        host: &Host,
        _credential: Option<&Credential>,
        _timeout: Duration,
    ) -> Result<Box<dyn Session>> {
        log::debug!("{} handled by the local transport", host.label());
        Ok(Box::new(LocalSession::new()))
    }
}

/// Runs commands through `sh -c` and writes files directly
#[derive(Debug, Default)]
pub struct LocalSession;

impl LocalSession {
    pub fn new() -> Self {
        Self
    }
}

impl Session for LocalSession {
    fn run_command(&mut self, command: &str) -> Result<String> {
        log::trace!("local: {command}");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                program: "sh".into(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::command_failed(command, output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn open_file_channel(&mut self) -> Result<Box<dyn FileClient + '_>> {
        Ok(Box::new(LocalFileClient))
    }
}

struct LocalFileClient;

impl FileClient for LocalFileClient {
    fn create_remote_file(&mut self, path: &str) -> Result<Box<dyn RemoteFile + '_>> {
        let file = File::create(path).map_err(|e| Error::Transfer {
            path: path.to_string(),
            message: format!("could not create file: {e}"),
        })?;
        Ok(Box::new(LocalFile {
            path: path.to_string(),
            writer: BufWriter::new(file),
        }))
    }
}

struct LocalFile {
    path: String,
    writer: BufWriter<File>,
}

impl Write for LocalFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl RemoteFile for LocalFile {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all())
            .map_err(|e| Error::Transfer {
                path: self.path.clone(),
                message: format!("could not write file: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_command_captures_stdout() {
        let mut session = LocalSession::new();
        let out = session.run_command("echo hello").unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_run_command_failure() {
        let mut session = LocalSession::new();
        let err = session.run_command("echo oops >&2; exit 3").unwrap_err();
        match err {
            Error::Command { command, message } => {
                assert_eq!(command, "echo oops >&2; exit 3");
                assert!(message.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");
        let path = path.to_str().unwrap();

        let mut session = LocalSession::new();
        {
            let mut channel = session.open_file_channel().unwrap();
            let mut file = channel.create_remote_file(path).unwrap();
            file.write_all(b"contents").unwrap();
            file.finish().unwrap();
        }

        assert_eq!(fs::read_to_string(path).unwrap(), "contents");
    }

    #[test]
    fn test_local_transport_connects() {
        let host = Host::new("me", "localhost", "root", "base", crate::types::AuthMode::Key);
        let mut session = LocalTransport
            .connect(&host, None, Duration::from_secs(1))
            .unwrap();
        assert_eq!(session.run_command("printf ok").unwrap(), "ok");
    }

    #[test]
    fn test_create_file_in_missing_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing/out.txt");

        let mut session = LocalSession::new();
        let mut channel = session.open_file_channel().unwrap();
        let result = channel.create_remote_file(path.to_str().unwrap());
        assert!(matches!(result, Err(Error::Transfer { .. })));
    }
}
