use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

mod command_flows;
mod completion;
mod config;
mod credentials;
mod dispatch;
mod http;
mod render;


#[derive(Parser, Debug)]
#[command(name = "launchkit")]
#[command(about = "Desktop launcher for a multi-source app catalog", long_about = None)]
struct Cli {
    /// Launcher root directory (defaults to the per-user location)
    #[arg(long)]
    root: Option<PathBuf>,
    /// Disable colors and progress bars
    #[arg(long)]
    plain: bool,
    /// Answer yes to every confirmation prompt
    #[arg(long)]
    assume_yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured sources, flagging deprecated and restricted ones
    Sources,
    /// Register a new source by its manifest URL
    AddSource {
        url: String,
        /// Override the name advertised by the source manifest
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a source and every app installed from it
    RemoveSource { name: String },
    /// Fetch all sources and show the downloadable apps
    List,
    /// Show locally installed apps
    Local,
    /// Fetch all sources and persist the app-info snapshot
    Refresh,
    /// Install an app: <source>/<app>[@version]
    Install { spec: String },
    /// Upgrade an installed app, or switch it to a specific version
    Upgrade { spec: String },
    /// Remove an installed app: <source>/<app>
    Remove { spec: String },
    /// Run the startup sequence (migrations, consent, source checks)
    Startup,
    /// Run the background update checks
    UpdateCheck,
    /// Inspect or store the restricted-source access token
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Generate a shell completion script
    Completion { shell: Shell },
}

#[derive(Subcommand, Debug)]
enum TokenCommands {
    Show,
    Set { value: String },
}

fn main() -> Result<()> {
    dispatch::run_cli(Cli::parse())
}
