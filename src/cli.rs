use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "fleetform")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision fleets of hosts from declarative specs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured hosts
    #[command(visible_alias = "l")]
    ListHosts,

    /// Add a host to the inventory
    #[command(visible_alias = "a")]
    AddHost(AddHostArgs),

    /// Remove a host from the inventory
    #[command(visible_alias = "d")]
    DeleteHost {
        /// Host name (prompts with a list if omitted)
        name: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List the specs found on the spec search path
    #[command(visible_alias = "s")]
    AvailableSpecs,

    /// Show what a spec resolves to
    #[command(visible_alias = "ss")]
    ShowSpec {
        /// Spec name
        spec: String,

        /// Print the resolved manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configure every host whose name or spec group matches
    #[command(visible_alias = "rc")]
    RemoteConfigure {
        /// Host name or spec group
        search: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Configure this machine with a spec
    #[command(visible_alias = "lc")]
    LocalConfigure {
        /// Spec name
        spec: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Host fields; anything left out is prompted for
#[derive(Parser, Default)]
pub struct AddHostArgs {
    /// Unique host name
    #[arg(long)]
    pub name: Option<String>,

    /// Hostname or IP address
    #[arg(long)]
    pub address: Option<String>,

    /// Login user
    #[arg(long)]
    pub username: Option<String>,

    /// Spec group this host belongs to
    #[arg(long)]
    pub spec: Option<String>,

    /// Authenticate with a password instead of a key
    #[arg(long)]
    pub password_auth: bool,

    /// ssh port
    #[arg(long)]
    pub port: Option<u16>,
}
