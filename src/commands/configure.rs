use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use provision::{
    Credential, CredentialProvider, Host, JobState, LocalTransport, Message, Orchestrator,
    ProgressSink, RunSummary, SshTransport, select_targets,
};
use specgraph::ResolvedManifest;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::Context;
use crate::commands::specs;
use crate::config::{Inventory, Settings};
use crate::runner;
use crate::ui;

/// Configure every host matching `search`
pub fn remote(ctx: &Context, search: &str, yes: bool) -> Result<()> {
    let inventory = Inventory::load()?;
    let hosts = select_targets(&inventory.hosts, search)?;
    preflight(&hosts)?;

    let store = specs::load_store(&inventory.settings)?;
    let mut manifests: BTreeMap<String, ResolvedManifest> = BTreeMap::new();
    for host in &hosts {
        if !manifests.contains_key(&host.spec) {
            let manifest = specs::resolve_named(&store, &host.spec)
                .with_context(|| format!("Cannot configure {}", host.label()))?;
            manifests.insert(host.spec.clone(), manifest);
        }
    }

    ui::header(&format!("Remote Configure: {search}"));
    let rows: Vec<Vec<String>> = hosts
        .iter()
        .map(|h| {
            vec![
                h.name.clone(),
                format!("{}:{}", h.address, h.port()),
                h.username.clone(),
                h.spec.clone(),
            ]
        })
        .collect();
    ui::table(&["Name", "Address", "User", "Spec"], &rows);
    println!();

    if !yes && !confirm(&format!("Configure {} host(s)?", hosts.len()))? {
        ui::info("Cancelled");
        return Ok(());
    }

    let targets: Vec<(Host, ResolvedManifest)> = hosts
        .into_iter()
        .filter_map(|host| {
            let manifest = manifests.get(&host.spec)?.clone();
            Some((host, manifest))
        })
        .collect();

    let settings = &inventory.settings;
    let transport = SshTransport::new(settings.operation_timeout());
    let orchestrator = build_orchestrator(&transport, settings);
    let mut credentials = prompt_password;

    let (summary, sink) = run_prompted(&orchestrator, targets, &mut credentials, || {
        TerminalSink::new(ctx.quiet)
    })?;
    sink.finish();
    report(&summary)
}

/// Collect every password first, then start the sink and run the jobs
///
/// The spinner redraws the terminal, so it must not be running while a
/// password prompt is waiting for input.
fn run_prompted<C, P>(
    orchestrator: &Orchestrator<'_>,
    targets: Vec<(Host, ResolvedManifest)>,
    credentials: &mut C,
    start_sink: impl FnOnce() -> P,
) -> provision::Result<(RunSummary, P)>
where
    C: CredentialProvider,
    P: ProgressSink,
{
    let jobs = Orchestrator::prepare_jobs(targets, credentials)?;
    let mut sink = start_sink();
    let summary = orchestrator.run(jobs, &mut sink);
    Ok((summary, sink))
}

/// Configure this machine with `spec`
pub fn local(ctx: &Context, spec: &str, yes: bool) -> Result<()> {
    let inventory = Inventory::load()?;
    let store = specs::load_store(&inventory.settings)?;
    let manifest = specs::resolve_named(&store, spec)?;

    ui::header(&format!("Local Configure: {spec}"));
    ui::kv("Packages", &ui::list_cell(&manifest.packages));
    ui::kv("Files", &manifest.file_transfers.len().to_string());
    ui::kv(
        "Commands",
        &(manifest.pre_commands.len() + manifest.post_commands.len()).to_string(),
    );
    println!();

    if !yes && !confirm("Configure this machine?")? {
        ui::info("Cancelled");
        return Ok(());
    }

    let orchestrator = build_orchestrator(&LocalTransport, &inventory.settings);
    let mut sink = TerminalSink::new(ctx.quiet);
    let summary = orchestrator.run_local(manifest, &mut sink);
    sink.finish();
    report(&summary)
}

fn build_orchestrator<'t>(
    transport: &'t dyn provision::Transport,
    settings: &Settings,
) -> Orchestrator<'t> {
    Orchestrator::new(transport, settings.pipeline_options())
        .with_channel_capacity(settings.channel_capacity)
}

/// Make sure the ssh tooling the run needs is installed
fn preflight(hosts: &[Host]) -> Result<()> {
    if !runner::command_exists("ssh") {
        bail!("ssh is not installed or not on PATH");
    }
    if hosts.iter().any(Host::requires_password) && !runner::command_exists("sshpass") {
        bail!("sshpass is required for hosts using password authentication");
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn prompt_password(host: &Host) -> provision::Result<Credential> {
    Password::new()
        .with_prompt(format!("Password for {}", host.destination()))
        .interact()
        .map(Credential::password)
        .map_err(|e| provision::Error::Credential {
            host: host.label(),
            message: e.to_string(),
        })
}

fn report(summary: &RunSummary) -> Result<()> {
    ui::header("Summary");
    for outcome in &summary.outcomes {
        match outcome.state {
            JobState::Done if outcome.post_failures == 0 => {
                ui::success(&format!("{} configured", outcome.target));
            }
            JobState::Done => ui::warn(&format!(
                "{} configured, {} post-configure command(s) failed",
                outcome.target, outcome.post_failures
            )),
            JobState::Aborted { phase } => {
                ui::error(&format!("{} aborted during {phase}", outcome.target));
            }
            JobState::Crashed => ui::error(&format!("{} crashed", outcome.target)),
            state => ui::warn(&format!("{} stopped in {state:?}", outcome.target)),
        }
    }

    println!();
    ui::kv("Clean", &summary.clean().to_string());
    ui::kv("Partial", &summary.partial().to_string());
    ui::kv("Failed", &summary.aborted().to_string());

    if !summary.is_success() {
        bail!("{} of {} job(s) failed", summary.aborted(), summary.total());
    }
    Ok(())
}

/// Prints job output above a spinner
struct TerminalSink {
    bar: ProgressBar,
    quiet: bool,
}

impl TerminalSink {
    fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message("Starting...");
        Self { bar, quiet }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn format_line(message: &Message) -> String {
    let time = message.timestamp.format("%H:%M:%S").to_string();
    let text = if message.is_error() {
        message.text.red().to_string()
    } else {
        message.text.clone()
    };
    format!("{} {} >> {}", time.dimmed(), message.target.cyan(), text)
}

impl ProgressSink for TerminalSink {
    fn on_info(&mut self, message: &Message) {
        if self.quiet {
            return;
        }
        self.bar.println(format_line(message));
        self.bar.set_message(format!(
            "{} {}",
            message.target,
            ui::truncate(&message.text, 60)
        ));
    }

    fn on_error(&mut self, message: &Message) {
        if self.quiet {
            eprintln!("{}", format_line(message));
        } else {
            self.bar.println(format_line(message));
        }
    }
}
