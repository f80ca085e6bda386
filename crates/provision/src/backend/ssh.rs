//! Transport over the system OpenSSH client.
//!
//! Each session starts an ssh control master (`-M -N`) bound to a private
//! socket; commands and file writes then reuse that authenticated connection.
//! Password-auth hosts go through `sshpass -e`, with the password handed to
//! the child process environment only.

use crate::backend::{FileClient, RemoteFile, Session, Transport, shell_quote};
use crate::error::{Error, Result};
use crate::types::{Credential, Host};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How often to check whether the control master is up
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opens ssh sessions through the `ssh` binary on `PATH`
#[derive(Debug, Clone)]
pub struct SshTransport {
    /// Deadline for each read/write on an established connection
    operation_timeout: Duration,
    /// Where control sockets live
    socket_dir: PathBuf,
}

impl SshTransport {
    pub fn new(operation_timeout: Duration) -> Self {
        Self {
            operation_timeout,
            socket_dir: std::env::temp_dir(),
        }
    }

    /// Override the control socket directory
    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    fn socket_path(&self) -> PathBuf {
        let id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.socket_dir
            .join(format!("fleetform-{}-{id}.sock", std::process::id()))
    }
}

impl Transport for SshTransport {
    fn connect(
        &self,
        host: &Host,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> Result<Box<dyn Session>> {
        let socket = self.socket_path();
        let connect_error = |message: String| Error::Connect {
            host: host.label(),
            message,
        };

        let mut command = match credential {
            Some(credential) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", credential.expose());
                cmd
            }
            None => Command::new("ssh"),
        };

        command
            .arg("-M")
            .arg("-N")
            .arg("-S")
            .arg(&socket)
            .args(option("ConnectTimeout", timeout.as_secs().max(1)))
            .args(option("ServerAliveInterval", self.operation_timeout.as_secs().max(1)))
            .args(option("ServerAliveCountMax", 1))
            .args(option("StrictHostKeyChecking", "accept-new"));

        if credential.is_some() {
            command
                .args(option("PreferredAuthentications", "password,keyboard-interactive"))
                .args(option("PubkeyAuthentication", "no"));
        } else {
            command.args(option("BatchMode", "yes"));
        }

        command
            .arg("-p")
            .arg(host.port().to_string())
            .arg(host.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        log::debug!("Starting ssh control master for {}", host.label());
        let master = command.spawn().map_err(|source| Error::Spawn {
            program: (if credential.is_some() { "sshpass" } else { "ssh" }).into(),
            source,
        })?;

        let mut session = SshSession {
            destination: host.destination(),
            port: host.port(),
            socket,
            operation_timeout: self.operation_timeout,
            master,
        };

        // Slack on top of ConnectTimeout for authentication
        let deadline = Instant::now() + timeout + Duration::from_secs(2);
        loop {
            if let Some(status) = session.master.try_wait().map_err(|e| connect_error(e.to_string()))? {
                let stderr = session.master.stderr.take();
                return Err(connect_error(exit_reason(status, stderr)));
            }

            if session.is_connected() {
                return Ok(Box::new(session));
            }

            if Instant::now() >= deadline {
                return Err(connect_error(format!("timed out after {}s", timeout.as_secs())));
            }

            thread::sleep(CONNECT_POLL_INTERVAL);
        }
    }
}

/// An authenticated ssh connection
pub struct SshSession {
    destination: String,
    port: u16,
    socket: PathBuf,
    operation_timeout: Duration,
    master: Child,
}

impl SshSession {
    /// ssh invocation multiplexed over the control socket
    fn ssh(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-S")
            .arg(&self.socket)
            .args(option("ServerAliveInterval", self.operation_timeout.as_secs().max(1)))
            .args(option("ServerAliveCountMax", 1))
            .arg("-p")
            .arg(self.port.to_string());
        cmd
    }

    fn is_connected(&self) -> bool {
        self.ssh()
            .arg("-O")
            .arg("check")
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Session for SshSession {
    fn run_command(&mut self, command: &str) -> Result<String> {
        log::trace!("{}: {command}", self.destination);
        let output = self
            .ssh()
            .arg(&self.destination)
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                program: "ssh".into(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::command_failed(command, output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn open_file_channel(&mut self) -> Result<Box<dyn FileClient + '_>> {
        Ok(Box::new(SshFileClient { session: self }))
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        log::debug!("Closing ssh session to {}", self.destination);
        let _ = self
            .ssh()
            .arg("-O")
            .arg("exit")
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        let _ = self.master.kill();
        let _ = self.master.wait();
        let _ = std::fs::remove_file(&self.socket);
    }
}

struct SshFileClient<'s> {
    session: &'s SshSession,
}

impl FileClient for SshFileClient<'_> {
    fn create_remote_file(&mut self, path: &str) -> Result<Box<dyn RemoteFile + '_>> {
        let mut child = self
            .session
            .ssh()
            .arg(&self.session.destination)
            .arg("--")
            .arg(format!("cat > {}", shell_quote(path)))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: "ssh".into(),
                source,
            })?;

        let stdin = child.stdin.take();
        Ok(Box::new(SshRemoteFile {
            path: path.to_string(),
            child: Some(child),
            stdin,
        }))
    }
}

/// Remote file fed through `cat` on the far side
struct SshRemoteFile {
    path: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl SshRemoteFile {
    fn transfer_error(&self, message: impl Into<String>) -> Error {
        Error::Transfer {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl Write for SshRemoteFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write(buf),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "remote file already closed",
            )),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }
}

impl RemoteFile for SshRemoteFile {
    fn finish(mut self: Box<Self>) -> Result<()> {
        // Closing stdin lets the remote `cat` exit
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Err(self.transfer_error("remote file already closed"));
        };

        let output = child
            .wait_with_output()
            .map_err(|e| self.transfer_error(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.transfer_error(format!("{}: {}", output.status, stderr.trim())));
        }

        Ok(())
    }
}

impl Drop for SshRemoteFile {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// `-o Key=value` argument pair
/// Why a control master exited: its stderr, or the exit status if it printed nothing
fn exit_reason(status: impl std::fmt::Display, stderr: Option<impl Read>) -> String {
    let mut output = String::new();
    if let Some(mut pipe) = stderr {
        if let Err(e) = pipe.read_to_string(&mut output) {
            log::trace!("Could not read ssh master stderr: {e}");
        }
    }
    let output = output.trim();
    if output.is_empty() {
        status.to_string()
    } else {
        output.to_string()
    }
}

fn option(key: &str, value: impl std::fmt::Display) -> [String; 2] {
    ["-o".to_string(), format!("{key}={value}")]
}
