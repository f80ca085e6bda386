//! # provision
//!
//! Concurrent provisioning of hosts from resolved spec manifests.
//!
//! Each selected host gets a [`Job`] that walks a fixed pipeline over its own
//! [`Session`]: elevation check, pre-commands, package install, file transfer
//! and post-commands. The [`Orchestrator`] runs every job on its own thread
//! and funnels their output through a single [`ProgressSink`].
//!
//! ## Example
//!
//! ```no_run
//! use provision::{NoCredentials, NoProgress, Orchestrator, PipelineOptions, SshTransport};
//! use std::time::Duration;
//!
//! # fn targets() -> Vec<(provision::Host, specgraph::ResolvedManifest)> { Vec::new() }
//! let transport = SshTransport::new(Duration::from_secs(300));
//! let orchestrator = Orchestrator::new(&transport, PipelineOptions::default());
//! let summary = orchestrator.run_remote(targets(), &mut NoCredentials, &mut NoProgress)?;
//! println!("{} of {} hosts configured", summary.clean(), summary.total());
//! # Ok::<(), provision::Error>(())
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod targets;
pub mod types;

pub use backend::local::{LocalSession, LocalTransport};
pub use backend::ssh::SshTransport;
pub use backend::{FileClient, RemoteFile, Session, Transport, shell_quote};
pub use context::{CollectProgress, CredentialProvider, NoCredentials, NoProgress, ProgressSink};
pub use error::{Error, Result};
pub use job::{Job, JobTarget, LOCAL_LABEL, PipelineOptions, Reporter};
pub use orchestrator::{DEFAULT_CHANNEL_CAPACITY, Orchestrator};
pub use targets::select_targets;
pub use types::{
    AuthMode, Credential, DEFAULT_SSH_PORT, Host, JobOutcome, JobState, Level, Message, Phase,
    RunSummary,
};
