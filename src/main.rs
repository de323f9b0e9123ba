mod commands;

use clap::{Parser, Subcommand};
use commands::GlobalArgs;
use shield::hook::HookFlavor;
use shield::{logging, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shield")]
#[command(version)]
#[command(about = "Seal files matching .shield patterns before they reach git", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and tag every matching plaintext file
    #[command(visible_alias = "encrypt")]
    Seal,

    /// Decrypt every matching sealed file
    #[command(visible_alias = "decrypt")]
    Unseal,

    /// List matching files that are not sealed
    Check,

    /// Check staged files the way the pre-commit hook does
    Scan,

    /// Write the git pre-commit hook
    GenerateHooks {
        /// Script flavor (defaults to the current platform)
        #[arg(long, value_enum)]
        flavor: Option<HookFlavor>,
    },

    /// Print version information
    Version,

    /// Copy this binary onto PATH
    Install {
        /// Destination (defaults to the system binary directory)
        #[arg(long)]
        target: Option<PathBuf>,
    },
}

fn main() {
    logging::init("info");

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Seal => commands::seal(&cli.global),
        Commands::Unseal => commands::unseal(&cli.global),
        Commands::Check => commands::check(&cli.global),
        Commands::Scan => commands::scan(&cli.global),
        Commands::GenerateHooks { flavor } => {
            commands::generate_hooks(&cli.global, flavor.unwrap_or_else(HookFlavor::native))
        }
        Commands::Version => commands::version(&cli.global),
        Commands::Install { target } => commands::install(target.as_deref()),
    }
}
