use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "kce")]
#[command(version, about = "Komodo Codex environment setup for Flutter development")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip interactive confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the environment setup
    Setup {
        /// Run only these steps (comma-separated ids)
        #[arg(long)]
        only: Option<String>,

        /// Skip these steps (comma-separated ids)
        #[arg(long)]
        skip: Option<String>,

        /// Maximum steps running concurrently
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Stop on any step failure, critical or not
        #[arg(long)]
        fail_fast: bool,

        /// UI output mode: full, minimal, json
        #[arg(long, default_value = "full")]
        ui: String,

        /// Show the execution plan without running anything
        #[arg(long)]
        dry_run: bool,

        /// Flutter version to install
        #[arg(long)]
        flutter_version: Option<String>,

        /// Build target platforms (comma-separated)
        #[arg(long)]
        platforms: Option<String>,

        /// Skip the Android SDK step entirely
        #[arg(long)]
        no_android: bool,
    },
    /// List the configured steps and their execution stages
    List,
    /// Check which required system dependencies are present
    CheckDeps,
    /// Show installed tool versions and the last run record
    Status,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default komodo.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Setup {
            only,
            skip,
            max_parallel,
            fail_fast,
            ui,
            dry_run,
            flutter_version,
            platforms,
            no_android,
        } => {
            let options = cmd::SetupOptions {
                only: cmd::split_ids(only.as_deref()),
                skip: cmd::split_ids(skip.as_deref()),
                max_parallel: *max_parallel,
                fail_fast: *fail_fast,
                ui: ui.clone(),
                dry_run: *dry_run,
                flutter_version: flutter_version.clone(),
                platforms: platforms.as_deref().map(cmd::split_list),
                no_android: *no_android,
            };
            let exit_code = cmd::cmd_setup(&project_dir, &cli, options).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Commands::List => cmd::cmd_list(&project_dir)?,
        Commands::CheckDeps => cmd::cmd_check_deps(&project_dir).await?,
        Commands::Status => cmd::cmd_status(&project_dir).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
