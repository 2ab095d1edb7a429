//! Argument definitions for the `rivalwatch` binary.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use rivalwatch_core::EventKind;

#[derive(Debug, Parser)]
#[command(
    name = "rivalwatch",
    about = "Tail real-time competitor-intelligence event streams",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Profile name from the config file
    #[arg(long, global = true, env = "RIVALWATCH_PROFILE")]
    pub profile: Option<String>,

    /// Stream endpoint base URL (overrides the profile)
    #[arg(long, global = true, env = "RIVALWATCH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Project identifier (overrides the profile)
    #[arg(long, global = true, env = "RIVALWATCH_PROJECT")]
    pub project: Option<String>,

    /// User segment for a per-user channel (overrides the profile)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Bearer token for the stream (overrides the credential chain)
    #[arg(long, global = true, hide_env_values = true, env = "RIVALWATCH_TOKEN")]
    pub token: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream events to stdout until interrupted
    Tail(TailArgs),

    /// Connect once, report connection state and recent activity
    Status,

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Only show these event kinds (repeatable)
    #[arg(long, value_name = "KIND")]
    pub kind: Vec<EventKind>,

    /// Emit events as JSON lines instead of formatted text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration as TOML
    Show,

    /// Print the config file path
    Path,

    /// Write a starter config file with an example profile
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
