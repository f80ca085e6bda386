mod cli;
mod commands;
mod config;
mod paths;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context { quiet: cli.quiet };

    match cli.command {
        Command::ListHosts => commands::hosts::list(&ctx),
        Command::AddHost(args) => commands::hosts::add(&ctx, args),
        Command::DeleteHost { name, yes } => commands::hosts::delete(&ctx, name.as_deref(), yes),
        Command::AvailableSpecs => commands::specs::list(&ctx),
        Command::ShowSpec { spec, json } => commands::specs::show(&ctx, &spec, json),
        Command::RemoteConfigure { search, yes } => {
            commands::configure::remote(&ctx, &search, yes)
        }
        Command::LocalConfigure { spec, yes } => commands::configure::local(&ctx, &spec, yes),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "fleetform", &mut io::stdout());
            Ok(())
        }
    }
}
