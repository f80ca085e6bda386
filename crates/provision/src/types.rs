//! Core types for provisioning runs

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default ssh port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How a host authenticates ssh logins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Key-based (agent or default identities)
    #[default]
    Key,
    /// Password entered interactively before each run
    Password,
}

/// A configured target host
///
/// This is the persisted record. Passwords are never part of it; see
/// [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Unique identifier
    pub name: String,
    /// Hostname or IP address
    pub address: String,
    /// Login user
    pub username: String,
    /// Spec group label
    pub spec: String,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Host {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
        spec: impl Into<String>,
        auth: AuthMode,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            username: username.into(),
            spec: spec.into(),
            auth,
            port: None,
        }
    }

    /// Label used to attribute job output, e.g. `[web-1 - 10.0.0.5]`
    pub fn label(&self) -> String {
        format!("[{} - {}]", self.name, self.address)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// `user@address` destination for ssh
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.address)
    }

    pub fn requires_password(&self) -> bool {
        self.auth == AuthMode::Password
    }

    /// Whether a search term selects this host (spec group or name, exact)
    pub fn matches(&self, term: &str) -> bool {
        self.spec == term || self.name == term
    }
}

/// A password held in memory for the duration of one job
///
/// Not serializable, and redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    password: String,
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Severity of a job message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

/// One line of job output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    /// Label of the job that emitted it
    pub target: String,
    /// Position in the emitting job's output, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl Message {
    pub fn new(level: Level, target: impl Into<String>, seq: u64, text: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            seq,
            timestamp: Local::now(),
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >> {}", self.target, self.text)
    }
}

/// Pipeline phase of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Connect,
    Elevate,
    PreCommands,
    Packages,
    Files,
    PostCommands,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Elevate => "elevate",
            Self::PreCommands => "pre-configure",
            Self::Packages => "package install",
            Self::Files => "file transfer",
            Self::PostCommands => "post-configure",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a job is in its pipeline
///
/// States only move forward. Any failure in a fail-fast phase moves to
/// `Aborted`; post-command failures don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Init,
    Connected,
    Elevated,
    PreConfigured,
    PackagesInstalled,
    FilesTransferred,
    PostConfigured,
    Done,
    /// A fail-fast phase failed; nothing after it ran
    Aborted { phase: Phase },
    /// The job thread panicked
    Crashed,
}

impl JobState {
    /// Whether the job is finished, one way or another
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted { .. } | Self::Crashed)
    }
}

/// Final result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Job label
    pub target: String,
    pub state: JobState,
    /// Post-commands that failed (they don't abort the job)
    pub post_failures: usize,
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    /// Done with every post-command succeeding
    pub fn is_clean(&self) -> bool {
        self.is_done() && self.post_failures == 0
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, JobState::Aborted { .. } | JobState::Crashed)
    }

    /// Phase that aborted the job, if any
    pub fn aborted_phase(&self) -> Option<Phase> {
        match self.state {
            JobState::Aborted { phase } => Some(phase),
            _ => None,
        }
    }
}

/// Outcomes of every job in a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Jobs that finished with no failures at all
    pub fn clean(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_clean()).count()
    }

    /// Jobs that finished but had post-command failures
    pub fn partial(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.is_done() && o.post_failures > 0)
            .count()
    }

    pub fn aborted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_aborted()).count()
    }

    /// Check if every job reached `Done`
    pub fn is_success(&self) -> bool {
        self.aborted() == 0
    }

    pub fn add_outcome(&mut self, outcome: JobOutcome) {
        self.outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(state: JobState, post_failures: usize) -> JobOutcome {
        JobOutcome {
            target: "[t]".into(),
            state,
            post_failures,
        }
    }

    #[test]
    fn test_host_matches_name_or_spec() {
        let host = Host::new("web-1", "10.0.0.5", "ubuntu", "web", AuthMode::Key);
        assert!(host.matches("web"));
        assert!(host.matches("web-1"));
        assert!(!host.matches("Web"));
        assert!(!host.matches("10.0.0.5"));
    }

    #[test]
    fn test_host_label_and_destination() {
        let mut host = Host::new("db", "db.internal", "admin", "postgres", AuthMode::Password);
        assert_eq!(host.label(), "[db - db.internal]");
        assert_eq!(host.destination(), "admin@db.internal");
        assert_eq!(host.port(), 22);
        assert!(host.requires_password());

        host.port = Some(2222);
        assert_eq!(host.port(), 2222);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::password("hunter2");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.expose(), "hunter2");
    }

    #[test]
    fn test_message_display() {
        let msg = Message::new(Level::Error, "[local]", 3, "Post-configure failed");
        assert!(msg.is_error());
        assert_eq!(msg.to_string(), "[local] >> Post-configure failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Crashed.is_terminal());
        assert!(
            JobState::Aborted {
                phase: Phase::Files
            }
            .is_terminal()
        );
        assert!(!JobState::PostConfigured.is_terminal());
    }

    #[test]
    fn test_run_summary_counts() {
        let mut summary = RunSummary::default();
        summary.add_outcome(outcome(JobState::Done, 0));
        summary.add_outcome(outcome(JobState::Done, 2));
        summary.add_outcome(outcome(
            JobState::Aborted {
                phase: Phase::Packages,
            },
            0,
        ));
        summary.add_outcome(outcome(JobState::Crashed, 0));

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.clean(), 1);
        assert_eq!(summary.partial(), 1);
        assert_eq!(summary.aborted(), 2);
        assert!(!summary.is_success());
        assert_eq!(
            summary.outcomes[2].aborted_phase(),
            Some(Phase::Packages)
        );
    }
}
