//! Fan-out of provisioning jobs
//!
//! Every job runs on its own thread and reports through two bounded channels,
//! one for progress and one for errors. A single consumer thread owns the
//! [`ProgressSink`] and drains both channels until every sender is gone, so
//! nothing a job emitted is lost when the run returns.

use crate::backend::Transport;
use crate::context::{CredentialProvider, ProgressSink};
use crate::error::Result;
use crate::job::{Job, PipelineOptions, Reporter};
use crate::types::{Host, JobOutcome, JobState, Level, Message, RunSummary};
use crossbeam_channel::{Receiver, bounded, never, select};
use specgraph::ResolvedManifest;
use std::thread;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Crash reports are numbered after anything the job could have emitted
const CRASH_SEQ: u64 = u64::MAX;

pub struct Orchestrator<'t> {
    transport: &'t dyn Transport,
    options: PipelineOptions,
    channel_capacity: usize,
}

impl<'t> Orchestrator<'t> {
    pub fn new(transport: &'t dyn Transport, options: PipelineOptions) -> Self {
        Self {
            transport,
            options,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Build remote jobs, asking for passwords where a host needs one
    ///
    /// Prompts run one host at a time. Nothing is started, so callers can
    /// finish all interaction before progress output begins.
    pub fn prepare_jobs<C: CredentialProvider>(
        targets: Vec<(Host, ResolvedManifest)>,
        credentials: &mut C,
    ) -> Result<Vec<Job>> {
        let mut jobs = Vec::with_capacity(targets.len());
        for (host, manifest) in targets {
            let credential = if host.requires_password() {
                Some(credentials.credential_for(&host)?)
            } else {
                None
            };
            jobs.push(Job::remote(host, credential, manifest));
        }
        Ok(jobs)
    }

    /// Provision remote hosts
    ///
    /// Passwords are requested up front, before any job starts.
    pub fn run_remote<C, P>(
        &self,
        targets: Vec<(Host, ResolvedManifest)>,
        credentials: &mut C,
        sink: &mut P,
    ) -> Result<RunSummary>
    where
        C: CredentialProvider,
        P: ProgressSink,
    {
        let jobs = Self::prepare_jobs(targets, credentials)?;
        Ok(self.run(jobs, sink))
    }

    /// Provision this machine
    pub fn run_local<P: ProgressSink>(&self, manifest: ResolvedManifest, sink: &mut P) -> RunSummary {
        self.run(vec![Job::local(manifest)], sink)
    }

    /// Run all jobs concurrently and wait for every one of them
    ///
    /// Returns after the last job has finished and the consumer has handed
    /// every message to `sink`.
    pub fn run<P: ProgressSink>(&self, jobs: Vec<Job>, sink: &mut P) -> RunSummary {
        log::info!("Starting {} job(s)", jobs.len());
        let (info_tx, info_rx) = bounded(self.channel_capacity);
        let (error_tx, error_rx) = bounded(self.channel_capacity);

        thread::scope(|scope| {
            let consumer = scope.spawn(move || consume(&info_rx, &error_rx, sink));

            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let label = job.label();
                    let reporter = Reporter::new(label.clone(), info_tx.clone(), error_tx.clone());
                    let handle =
                        scope.spawn(move || job.execute(self.transport, &self.options, reporter));
                    (label, handle)
                })
                .collect();

            let mut summary = RunSummary::default();
            for (label, handle) in handles {
                let outcome = handle.join().unwrap_or_else(|_| {
                    log::error!("{label} job panicked");
                    let report = Message::new(Level::Error, label.clone(), CRASH_SEQ, "Job crashed");
                    if error_tx.send(report).is_err() {
                        log::trace!("{label} error channel closed");
                    }
                    JobOutcome {
                        target: label,
                        state: JobState::Crashed,
                        post_failures: 0,
                    }
                });
                summary.add_outcome(outcome);
            }

            // Last senders; the consumer exits once both channels are drained
            drop(info_tx);
            drop(error_tx);
            if consumer.join().is_err() {
                log::error!("Progress consumer panicked; some output may be missing");
            }

            log::info!(
                "Finished: {} clean, {} partial, {} aborted",
                summary.clean(),
                summary.partial(),
                summary.aborted()
            );
            summary
        })
    }
}

fn consume<P: ProgressSink>(info: &Receiver<Message>, errors: &Receiver<Message>, sink: &mut P) {
    let closed = never();
    let mut info = info;
    let mut errors = errors;

    while !(info.same_channel(&closed) && errors.same_channel(&closed)) {
        let (level, received) = select! {
            recv(info) -> message => (Level::Info, message),
            recv(errors) -> message => (Level::Error, message),
        };

        match (level, received) {
            (Level::Info, Ok(message)) => sink.on_info(&message),
            (Level::Error, Ok(message)) => sink.on_error(&message),
            (Level::Info, Err(_)) => info = &closed,
            (Level::Error, Err(_)) => errors = &closed,
        }
    }
}
