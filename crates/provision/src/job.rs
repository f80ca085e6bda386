//! Job state machine - runs one host's provisioning pipeline
//!
//! ```text
//! Init → Connected → Elevated → PreConfigured → PackagesInstalled
//!      → FilesTransferred → PostConfigured → Done
//! ```
//!
//! Connect, elevate, pre-commands, package install and file transfer are
//! fail-fast: the first failure moves the job to `Aborted` and nothing after
//! it runs. Post-commands are best-effort: failures are reported and the
//! remaining post-commands still run. Local jobs start at pre-commands.
//!
//! Every command and every file gets one "starting" message followed by
//! exactly one success or failure message.

use crate::backend::local::LocalSession;
use crate::backend::{Session, Transport, shell_quote};
use crate::error::{Error, Result};
use crate::types::{Credential, Host, JobOutcome, JobState, Level, Message, Phase};
use crossbeam_channel::Sender;
use specgraph::{FileTransfer, ResolvedManifest};
use std::fs;
use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Label used for local jobs
pub const LOCAL_LABEL: &str = "[local]";

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Knobs shared by every job in a run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Bound on opening a connection
    pub connect_timeout: Duration,
    /// Prefix for commands that need root, e.g. `sudo`; empty runs them as-is
    pub elevate: String,
    /// Command proving the login user can elevate without a prompt
    pub elevation_probe: String,
    /// Package index refresh, run before installing
    pub refresh_command: String,
    /// Install command; the package list is appended
    pub install_command: String,
    /// Remote directory files are uploaded to before being moved into place
    pub staging_dir: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(7),
            elevate: "sudo".into(),
            elevation_probe: "sudo -n true".into(),
            refresh_command: "apt-get update".into(),
            install_command: "apt-get install -y".into(),
            staging_dir: "/tmp/fleetform".into(),
        }
    }
}

impl PipelineOptions {
    /// Prefix a command with the elevation command
    pub fn elevated(&self, command: &str) -> String {
        if self.elevate.is_empty() {
            command.to_string()
        } else {
            format!("{} {command}", self.elevate)
        }
    }

    /// Commands that install `packages`, in order
    pub fn package_commands(&self, packages: &[String]) -> Vec<String> {
        if packages.is_empty() {
            return Vec::new();
        }
        let mut commands = Vec::with_capacity(2);
        if !self.refresh_command.is_empty() {
            commands.push(self.elevated(&self.refresh_command));
        }
        commands.push(self.elevated(&format!(
            "{} {}",
            self.install_command,
            packages.join(" ")
        )));
        commands
    }

    /// Private staging directory for one job, below `staging_dir`
    ///
    /// Unique per process and job so that jobs sharing a box never touch
    /// each other's files.
    pub fn staging_root(&self, job_id: u64) -> String {
        format!(
            "{}/job-{}-{job_id}",
            self.staging_dir.trim_end_matches('/'),
            process::id()
        )
    }
}

/// What a job runs against
#[derive(Debug)]
pub enum JobTarget {
    Remote {
        host: Host,
        credential: Option<Credential>,
    },
    Local,
}

/// One host's provisioning attempt
#[derive(Debug)]
pub struct Job {
    id: u64,
    target: JobTarget,
    manifest: ResolvedManifest,
}

impl Job {
    pub fn remote(host: Host, credential: Option<Credential>, manifest: ResolvedManifest) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            target: JobTarget::Remote { host, credential },
            manifest,
        }
    }

    pub fn local(manifest: ResolvedManifest) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            target: JobTarget::Local,
            manifest,
        }
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn target(&self) -> &JobTarget {
        &self.target
    }

    pub fn label(&self) -> String {
        match &self.target {
            JobTarget::Remote { host, .. } => host.label(),
            JobTarget::Local => LOCAL_LABEL.to_string(),
        }
    }

    pub fn manifest(&self) -> &ResolvedManifest {
        &self.manifest
    }

    /// Run the whole pipeline, reporting through `reporter`
    pub fn execute(
        self,
        transport: &dyn Transport,
        options: &PipelineOptions,
        mut reporter: Reporter,
    ) -> JobOutcome {
        let label = reporter.target().to_string();
        log::debug!("{label} job {} starting", self.id);
        let staging_root = options.staging_root(self.id);

        let (state, post_failures) = match self.target {
            JobTarget::Remote { host, credential } => {
                let session =
                    connect(transport, &host, credential.as_ref(), options, &mut reporter);
                // The password is only needed to open the session
                drop(credential);
                match session {
                    Some(mut session) => {
                        Pipeline::new(
                            session.as_mut(),
                            &self.manifest,
                            options,
                            &staging_root,
                            &mut reporter,
                        )
                        .run_remote()
                    }
                    None => (JobState::Aborted { phase: Phase::Connect }, 0),
                }
            }
            JobTarget::Local => {
                let mut session = LocalSession::new();
                Pipeline::new(
                    &mut session,
                    &self.manifest,
                    options,
                    &staging_root,
                    &mut reporter,
                )
                .run_local()
            }
        };

        log::debug!("{label} job finished: {state:?}");
        JobOutcome {
            target: label,
            state,
            post_failures,
        }
    }
}

fn connect(
    transport: &dyn Transport,
    host: &Host,
    credential: Option<&Credential>,
    options: &PipelineOptions,
    reporter: &mut Reporter,
) -> Option<Box<dyn Session>> {
    reporter.info(format!("Connecting to {}:{}...", host.address, host.port()));
    match transport.connect(host, credential, options.connect_timeout) {
        Ok(session) => {
            reporter.info("Connected");
            Some(session)
        }
        Err(e) => {
            reporter.error(format!(
                "Connect failed: {e}. Aborting further tasks for this host"
            ));
            None
        }
    }
}

/// Write side of the two output channels for one job
///
/// Numbers messages so the job's order survives the split into two channels.
pub struct Reporter {
    target: String,
    info: Sender<Message>,
    errors: Sender<Message>,
    seq: u64,
}

impl Reporter {
    pub fn new(target: impl Into<String>, info: Sender<Message>, errors: Sender<Message>) -> Self {
        Self {
            target: target.into(),
            info,
            errors,
            seq: 0,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let message = self.next(Level::Info, text.into());
        if self.info.send(message).is_err() {
            log::trace!("{} progress channel closed", self.target);
        }
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let message = self.next(Level::Error, text.into());
        if self.errors.send(message).is_err() {
            log::trace!("{} error channel closed", self.target);
        }
    }

    fn next(&mut self, level: Level, text: String) -> Message {
        let message = Message::new(level, self.target.clone(), self.seq, text);
        self.seq += 1;
        message
    }
}

/// Phases after the connection is up
struct Pipeline<'a> {
    session: &'a mut dyn Session,
    manifest: &'a ResolvedManifest,
    options: &'a PipelineOptions,
    staging_root: &'a str,
    reporter: &'a mut Reporter,
    state: JobState,
}

impl<'a> Pipeline<'a> {
    fn new(
        session: &'a mut dyn Session,
        manifest: &'a ResolvedManifest,
        options: &'a PipelineOptions,
        staging_root: &'a str,
        reporter: &'a mut Reporter,
    ) -> Self {
        Self {
            session,
            manifest,
            options,
            staging_root,
            reporter,
            state: JobState::Init,
        }
    }

    fn run_remote(mut self) -> (JobState, usize) {
        self.state = JobState::Connected;

        let options = self.options;
        if !self.run_unit(Phase::Elevate, &options.elevation_probe) {
            return self.abort(Phase::Elevate);
        }
        self.state = JobState::Elevated;

        self.provision()
    }

    fn run_local(self) -> (JobState, usize) {
        self.provision()
    }

    fn provision(mut self) -> (JobState, usize) {
        let manifest = self.manifest;
        if !self.run_fail_fast(Phase::PreCommands, &manifest.pre_commands) {
            return self.abort(Phase::PreCommands);
        }
        self.state = JobState::PreConfigured;

        let package_commands = self.options.package_commands(&manifest.packages);
        if package_commands.is_empty() {
            self.reporter.info("No packages to install");
        } else if !self.run_fail_fast(Phase::Packages, &package_commands) {
            return self.abort(Phase::Packages);
        }
        self.state = JobState::PackagesInstalled;

        if !self.transfer_files() {
            return self.abort(Phase::Files);
        }
        self.state = JobState::FilesTransferred;

        let failures = self.post_configure();
        self.state = JobState::PostConfigured;

        if failures == 0 {
            self.reporter.info("Done");
        } else {
            self.reporter
                .info(format!("Done with {failures} failed post-configure command(s)"));
        }
        (JobState::Done, failures)
    }

    fn abort(mut self, phase: Phase) -> (JobState, usize) {
        log::debug!(
            "{} aborted in {phase} (reached {:?})",
            self.reporter.target(),
            self.state
        );
        self.reporter.error(format!(
            "{} failed! Aborting further tasks for this host",
            capitalize(phase.label())
        ));
        (JobState::Aborted { phase }, 0)
    }

    /// Run one command with its start/result messages
    fn run_unit(&mut self, phase: Phase, command: &str) -> bool {
        self.reporter.info(format!("Running {phase} command: {command}"));
        match self.session.run_command(command) {
            Ok(_) => {
                self.reporter.info(format!("Succeeded: {command}"));
                true
            }
            Err(e) => {
                self.reporter.error(format!("{} failed: {e}", capitalize(phase.label())));
                false
            }
        }
    }

    fn run_fail_fast(&mut self, phase: Phase, commands: &[String]) -> bool {
        commands.iter().all(|command| self.run_unit(phase, command))
    }

    /// Returns the number of failed post-commands
    fn post_configure(&mut self) -> usize {
        let manifest = self.manifest;
        manifest
            .post_commands
            .iter()
            .filter(|command| !self.run_unit(Phase::PostCommands, command))
            .count()
    }

    fn transfer_files(&mut self) -> bool {
        let manifest = self.manifest;
        let transfers = &manifest.file_transfers;
        if transfers.is_empty() {
            self.reporter.info("No files to transfer");
            return true;
        }

        self.reporter
            .info(format!("Starting file copy ({} files)...", transfers.len()));

        let mut staging = match StagingArea::create(
            &mut *self.session,
            &self.options.staging_dir,
            self.staging_root,
        ) {
            Ok(staging) => staging,
            Err(e) => {
                self.reporter
                    .error(format!("Could not create staging area: {e}"));
                return false;
            }
        };
        for transfer in transfers {
            self.reporter
                .info(format!("Copying file: {}", transfer.destination));
            match staging.copy_file(self.options, transfer) {
                Ok(()) => self
                    .reporter
                    .info(format!("Copied file: {}", transfer.destination)),
                Err(e) => {
                    self.reporter.error(format!(
                        "Copy of {} failed: {e}",
                        transfer.destination
                    ));
                    return false;
                }
            }
        }
        true
    }
}

/// Job-private staging directory that is removed when dropped
struct StagingArea<'s> {
    session: &'s mut dyn Session,
    root: String,
}

impl<'s> StagingArea<'s> {
    /// Create `root` below `base`; fails if `root` already exists
    fn create(session: &'s mut dyn Session, base: &str, root: &str) -> Result<Self> {
        session.run_command(&format!(
            "mkdir -p {} && mkdir -m 700 {}",
            shell_quote(base),
            shell_quote(root)
        ))?;
        Ok(Self {
            session,
            root: root.to_string(),
        })
    }

    /// Stage one file and move it into place
    fn copy_file(&mut self, options: &PipelineOptions, transfer: &FileTransfer) -> Result<()> {
        let staged = format!("{}{}", self.root, transfer.destination);
        let staged_folder = format!("{}{}", self.root, transfer.folder);
        let session = &mut *self.session;

        session.run_command(&format!("mkdir -p {}", shell_quote(&staged_folder)))?;
        session.run_command(&options.elevated(&format!("mkdir -p {}", shell_quote(&transfer.folder))))?;

        let contents = fs::read(&transfer.source).map_err(|e| Error::Transfer {
            path: transfer.source.display().to_string(),
            message: format!("could not read local file: {e}"),
        })?;

        {
            let mut channel = session.open_file_channel()?;
            let mut file = channel.create_remote_file(&staged)?;
            file.write_all(&contents).map_err(|e| Error::Transfer {
                path: staged.clone(),
                message: e.to_string(),
            })?;
            file.finish()?;
        }

        session.run_command(&options.elevated(&format!(
            "mv {} {}",
            shell_quote(&staged),
            shell_quote(&transfer.destination)
        )))?;
        Ok(())
    }
}

impl Drop for StagingArea<'_> {
    fn drop(&mut self) {
        let command = format!("rm -rf {}", shell_quote(&self.root));
        if let Err(e) = self.session.run_command(&command) {
            log::warn!("Failed to clean up staging area {}: {e}", self.root);
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::{FileClient, RemoteFile};
    use crate::types::AuthMode;
    use crossbeam_channel::unbounded;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Transport that records everything and fails on request
    #[derive(Default, Clone)]
    pub(crate) struct MockTransport {
        pub fail_connect: bool,
        /// Commands containing any of these fail
        pub fail_on: Vec<String>,
        /// Remote paths whose upload fails
        pub fail_upload: Vec<String>,
        pub commands: Arc<Mutex<Vec<String>>>,
        pub files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    }

    impl MockTransport {
        pub fn failing_on(pattern: &str) -> Self {
            Self {
                fail_on: vec![pattern.to_string()],
                ..Self::default()
            }
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn connect(
            &self,
            host: &Host,
            _credential: Option<&Credential>,
            _timeout: Duration,
        ) -> Result<Box<dyn Session>> {
            if self.fail_connect {
                return Err(Error::Connect {
                    host: host.address.clone(),
                    message: "connection refused".into(),
                });
            }
            Ok(Box::new(MockSession {
                transport: self.clone(),
            }))
        }
    }

    pub(crate) struct MockSession {
        pub transport: MockTransport,
    }

    impl Session for MockSession {
        fn run_command(&mut self, command: &str) -> Result<String> {
            self.transport
                .commands
                .lock()
                .unwrap()
                .push(command.to_string());
            if self.transport.fail_on.iter().any(|p| command.contains(p)) {
                return Err(Error::Command {
                    command: command.to_string(),
                    message: "exit status: 1".into(),
                });
            }
            Ok(String::new())
        }

        fn open_file_channel(&mut self) -> Result<Box<dyn FileClient + '_>> {
            Ok(Box::new(MockFileClient {
                transport: &self.transport,
            }))
        }
    }

    struct MockFileClient<'t> {
        transport: &'t MockTransport,
    }

    impl FileClient for MockFileClient<'_> {
        fn create_remote_file(&mut self, path: &str) -> Result<Box<dyn RemoteFile + '_>> {
            Ok(Box::new(MockFile {
                transport: self.transport,
                path: path.to_string(),
                buffer: Vec::new(),
            }))
        }
    }

    struct MockFile<'t> {
        transport: &'t MockTransport,
        path: String,
        buffer: Vec<u8>,
    }

    impl Write for MockFile<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl RemoteFile for MockFile<'_> {
        fn finish(self: Box<Self>) -> Result<()> {
            if self.transport.fail_upload.contains(&self.path) {
                return Err(Error::Transfer {
                    path: self.path,
                    message: "broken pipe".into(),
                });
            }
            self.transport
                .files
                .lock()
                .unwrap()
                .insert(self.path, self.buffer);
            Ok(())
        }
    }

    pub(crate) fn host(name: &str) -> Host {
        Host::new(name, format!("10.0.0.{}", name.len()), "admin", "web", AuthMode::Key)
    }

    fn manifest(dir: &Path) -> ResolvedManifest {
        fs::write(dir.join("nginx.conf"), "worker_processes 1;").unwrap();
        ResolvedManifest {
            spec: "web".into(),
            packages: vec!["nginx".into(), "curl".into()],
            pre_commands: vec!["echo pre".into()],
            post_commands: vec!["systemctl restart nginx".into(), "echo post".into()],
            file_transfers: vec![FileTransfer::new(
                dir.join("nginx.conf"),
                "/etc/nginx/nginx.conf",
            )],
        }
    }

    fn run(transport: &MockTransport, job: Job) -> (JobOutcome, Vec<Message>) {
        let (info_tx, info_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();
        let reporter = Reporter::new(job.label(), info_tx, error_tx);
        let outcome = job.execute(transport, &PipelineOptions::default(), reporter);

        let mut messages: Vec<Message> = info_rx.try_iter().chain(error_rx.try_iter()).collect();
        messages.sort_by_key(|m| m.seq);
        (outcome, messages)
    }

    #[test]
    fn test_package_commands() {
        let options = PipelineOptions::default();
        assert!(options.package_commands(&[]).is_empty());
        assert_eq!(
            options.package_commands(&["vim".into(), "git".into()]),
            vec!["sudo apt-get update", "sudo apt-get install -y vim git"]
        );

        let options = PipelineOptions {
            elevate: String::new(),
            refresh_command: String::new(),
            ..PipelineOptions::default()
        };
        assert_eq!(
            options.package_commands(&["vim".into()]),
            vec!["apt-get install -y vim"]
        );
    }

    #[test]
    fn test_full_pipeline() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::default();
        let job = Job::remote(host("web1"), None, manifest(temp.path()));
        let root = PipelineOptions::default().staging_root(job.id());

        let (outcome, messages) = run(&transport, job);

        assert_eq!(outcome.state, JobState::Done);
        assert!(outcome.is_clean());
        assert_eq!(outcome.target, "[web1 - 10.0.0.4]");
        assert!(messages.iter().all(|m| !m.is_error()));
        assert_eq!(messages.last().unwrap().text, "Done");

        let commands = transport.commands();
        assert_eq!(commands[0], "sudo -n true");
        assert_eq!(commands[1], "echo pre");
        assert_eq!(commands[2], "sudo apt-get update");
        assert_eq!(commands[3], "sudo apt-get install -y nginx curl");
        assert!(commands.contains(&format!(
            "mkdir -p /tmp/fleetform && mkdir -m 700 {root}"
        )));
        assert!(commands.contains(&format!("mkdir -p {root}/etc/nginx")));
        assert!(commands.contains(&"sudo mkdir -p /etc/nginx".to_string()));
        assert!(commands.contains(&format!(
            "sudo mv {root}/etc/nginx/nginx.conf /etc/nginx/nginx.conf"
        )));
        assert_eq!(&commands[commands.len() - 2..], [
            "systemctl restart nginx",
            "echo post"
        ]);
        assert!(commands.contains(&format!("rm -rf {root}")));
        assert!(!commands.contains(&"rm -rf /tmp/fleetform".to_string()));

        let files = transport.files.lock().unwrap();
        assert_eq!(
            files.get(&format!("{root}/etc/nginx/nginx.conf")).unwrap(),
            b"worker_processes 1;"
        );
    }

    #[test]
    fn test_install_failure_skips_remaining_phases() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::failing_on("apt-get install");
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (outcome, messages) = run(&transport, job);

        assert_eq!(
            outcome.state,
            JobState::Aborted {
                phase: Phase::Packages
            }
        );
        let commands = transport.commands();
        assert!(!commands.iter().any(|c| c.contains("mv ")));
        assert!(!commands.iter().any(|c| c.contains("systemctl")));
        assert!(transport.files.lock().unwrap().is_empty());

        let errors: Vec<_> = messages.iter().filter(|m| m.is_error()).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].text.contains("Aborting further tasks"));
    }

    #[test]
    fn test_post_failure_continues() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::failing_on("systemctl");
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (outcome, messages) = run(&transport, job);

        assert_eq!(outcome.state, JobState::Done);
        assert_eq!(outcome.post_failures, 1);
        assert!(!outcome.is_clean());
        assert_eq!(transport.commands().last().unwrap(), "echo post");
        assert_eq!(messages.iter().filter(|m| m.is_error()).count(), 1);
    }

    #[test]
    fn test_connect_failure() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport {
            fail_connect: true,
            ..MockTransport::default()
        };
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (outcome, messages) = run(&transport, job);

        assert_eq!(outcome.aborted_phase(), Some(Phase::Connect));
        assert!(transport.commands().is_empty());
        let errors: Vec<_> = messages.iter().filter(|m| m.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].text.contains("connection refused"));
    }

    #[test]
    fn test_elevation_failure() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::failing_on("sudo -n true");
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (outcome, _) = run(&transport, job);

        assert_eq!(outcome.aborted_phase(), Some(Phase::Elevate));
        assert_eq!(transport.commands(), vec!["sudo -n true"]);
    }

    #[test]
    fn test_pre_command_failure() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::failing_on("echo pre");
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (outcome, _) = run(&transport, job);

        assert_eq!(outcome.aborted_phase(), Some(Phase::PreCommands));
        assert!(!transport.commands().iter().any(|c| c.contains("apt-get")));
    }

    #[test]
    fn test_failed_upload_cleans_staging() {
        let temp = TempDir::new().unwrap();
        let job = Job::remote(host("web1"), None, manifest(temp.path()));
        let root = PipelineOptions::default().staging_root(job.id());
        let transport = MockTransport {
            fail_upload: vec![format!("{root}/etc/nginx/nginx.conf")],
            ..MockTransport::default()
        };

        let (outcome, _) = run(&transport, job);

        assert_eq!(outcome.aborted_phase(), Some(Phase::Files));
        let commands = transport.commands();
        assert_eq!(commands.last().unwrap(), &format!("rm -rf {root}"));
        assert!(!commands.iter().any(|c| c.contains("systemctl")));
    }

    #[test]
    fn test_staging_root_is_unique_per_job() {
        let temp = TempDir::new().unwrap();
        let first = Job::remote(host("web1"), None, manifest(temp.path()));
        let second = Job::remote(host("web1"), None, manifest(temp.path()));
        assert_ne!(first.id(), second.id());

        let options = PipelineOptions {
            staging_dir: "/var/tmp/stage/".into(),
            ..PipelineOptions::default()
        };
        let root = options.staging_root(first.id());
        assert!(root.starts_with("/var/tmp/stage/job-"));
        assert_ne!(root, options.staging_root(second.id()));
    }

    #[test]
    fn test_staging_creation_failure_aborts_transfer() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::failing_on("mkdir -m 700");
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (outcome, messages) = run(&transport, job);

        assert_eq!(outcome.aborted_phase(), Some(Phase::Files));
        let commands = transport.commands();
        assert!(!commands.iter().any(|c| c.starts_with("rm -rf")));
        assert!(!commands.iter().any(|c| c.contains("mv ")));
        assert!(
            messages
                .iter()
                .any(|m| m.is_error() && m.text.starts_with("Could not create staging area"))
        );
    }

    #[test]
    fn test_missing_local_source_aborts_transfer() {
        let temp = TempDir::new().unwrap();
        let mut manifest = manifest(temp.path());
        manifest.file_transfers = vec![FileTransfer::new(
            temp.path().join("gone.conf"),
            "/etc/gone.conf",
        )];
        let transport = MockTransport::default();

        let (outcome, _) = run(&transport, Job::remote(host("web1"), None, manifest));

        assert_eq!(outcome.aborted_phase(), Some(Phase::Files));
    }

    #[test]
    fn test_empty_manifest() {
        let transport = MockTransport::default();
        let job = Job::remote(host("web1"), None, ResolvedManifest::default());

        let (outcome, messages) = run(&transport, job);

        assert!(outcome.is_clean());
        assert_eq!(transport.commands(), vec!["sudo -n true"]);
        assert!(messages.iter().any(|m| m.text == "No packages to install"));
    }

    #[test]
    fn test_messages_bracket_each_unit() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::default();
        let job = Job::remote(host("web1"), None, manifest(temp.path()));

        let (_, messages) = run(&transport, job);

        let seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
        let expected: Vec<u64> = (0..messages.len() as u64).collect();
        assert_eq!(seqs, expected);
        let started = messages
            .iter()
            .filter(|m| m.text.starts_with("Running "))
            .count();
        let succeeded = messages
            .iter()
            .filter(|m| m.text.starts_with("Succeeded: "))
            .count();
        assert_eq!(started, succeeded);
    }

    #[test]
    fn test_local_job_writes_files() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("motd");
        fs::write(&source, "hello").unwrap();
        let target = temp.path().join("out/motd");
        let manifest = ResolvedManifest {
            spec: "local".into(),
            pre_commands: vec!["true".into()],
            file_transfers: vec![FileTransfer::new(&source, target.to_str().unwrap())],
            ..ResolvedManifest::default()
        };
        let options = PipelineOptions {
            elevate: String::new(),
            staging_dir: temp.path().join("staging").to_str().unwrap().to_string(),
            ..PipelineOptions::default()
        };
        let (info_tx, _info_rx) = unbounded();
        let (error_tx, _error_rx) = unbounded();
        let job = Job::local(manifest);
        let reporter = Reporter::new(job.label(), info_tx, error_tx);

        let outcome = job.execute(&MockTransport::default(), &options, reporter);

        assert_eq!(outcome.target, LOCAL_LABEL);
        assert!(outcome.is_clean());
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        assert_eq!(fs::read_dir(temp.path().join("staging")).unwrap().count(), 0);
    }
}
