//! Provider traits for the orchestrator
//!
//! These keep the provisioning engine free of any particular UI or prompt
//! implementation.

use crate::error::{Error, Result};
use crate::types::{Credential, Host, Message};

/// Receives job output from the consumer thread
///
/// Called for every message of every job, one at a time. Messages from
/// different jobs arrive interleaved; within one job they arrive in the order
/// the job emitted them on each channel (use [`Message::seq`] to order across
/// the two channels).
pub trait ProgressSink: Send {
    /// Called for progress messages
    fn on_info(&mut self, message: &Message);

    /// Called for error messages
    fn on_error(&mut self, message: &Message);
}

/// Progress sink that discards everything
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_info(&mut self, _message: &Message) {}
    fn on_error(&mut self, _message: &Message) {}
}

/// Progress sink that keeps every message, in arrival order
#[derive(Debug, Default)]
pub struct CollectProgress {
    pub messages: Vec<Message>,
}

impl CollectProgress {
    /// Messages emitted by one job, in that job's order
    pub fn for_target(&self, target: &str) -> Vec<&Message> {
        let mut messages: Vec<_> = self
            .messages
            .iter()
            .filter(|m| m.target == target)
            .collect();
        messages.sort_by_key(|m| m.seq);
        messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_error())
    }
}

impl ProgressSink for CollectProgress {
    fn on_info(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }

    fn on_error(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }
}

/// Supplies passwords for password-auth hosts before a run starts
pub trait CredentialProvider {
    /// Get the credential for a host
    fn credential_for(&mut self, host: &Host) -> Result<Credential>;
}

impl<F> CredentialProvider for F
where
    F: FnMut(&Host) -> Result<Credential>,
{
    fn credential_for(&mut self, host: &Host) -> Result<Credential> {
        self(host)
    }
}

/// Credential provider for runs where no host may use password auth
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credential_for(&mut self, host: &Host) -> Result<Credential> {
        Err(Error::Credential {
            host: host.label(),
            message: "password authentication is not available".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthMode, Level};

    #[test]
    fn test_collect_progress_orders_by_seq() {
        let mut sink = CollectProgress::default();
        sink.on_error(&Message::new(Level::Error, "[a]", 1, "failed"));
        sink.on_info(&Message::new(Level::Info, "[b]", 0, "other job"));
        sink.on_info(&Message::new(Level::Info, "[a]", 0, "starting"));

        let texts: Vec<_> = sink
            .for_target("[a]")
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["starting", "failed"]);
        assert_eq!(sink.errors().count(), 1);
    }

    #[test]
    fn test_closure_credential_provider() {
        let host = Host::new("db", "10.0.0.9", "admin", "postgres", AuthMode::Password);
        let mut provider = |_: &Host| -> Result<Credential> { Ok(Credential::password("secret")) };
        assert_eq!(
            provider.credential_for(&host).unwrap().expose(),
            "secret"
        );
    }

    #[test]
    fn test_no_credentials_errors() {
        let host = Host::new("db", "10.0.0.9", "admin", "postgres", AuthMode::Password);
        assert!(matches!(
            NoCredentials.credential_for(&host),
            Err(Error::Credential { .. })
        ));
    }
}
