//! Configuration view and validation commands — `kce config`.

use anyhow::Result;

use super::super::ConfigCommands;
use komodo_codex_env::config::EnvironmentConfig;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = project_dir.join("komodo.toml");

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Komodo Environment Configuration");
            println!("================================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No komodo.toml found at {}", config_path.display());
                println!("Using defaults. Run 'kce config init' to create one.");
            }
            println!();

            let mut config = EnvironmentConfig::load_or_default(project_dir)?;
            config.apply_environment();

            println!("Effective values (with env overrides):");
            println!("  flutter_version = \"{}\"", config.flutter_version);
            println!("  platforms = [{}]", config.platforms.join(", "));
            println!("  install_android_sdk = {}", config.install_android_sdk);
            println!("  android_api_level = \"{}\"", config.android_api_level);
            println!(
                "  android_build_tools_version = \"{}\"",
                config.android_build_tools_version
            );
            println!(
                "  fetch_all_remote_branches = {}",
                config.fetch_all_remote_branches
            );
            println!("  fetch_agents_docs = {}", config.fetch_agents_docs);
            println!("  max_parallel_jobs = {}", config.max_parallel_jobs);
            println!("  command_timeout_secs = {}", config.command_timeout_secs);
            println!("  android_home = {}", config.android_home().display());
            println!("  fvm_dir = {}", config.fvm_dir().display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let mut config = EnvironmentConfig::load_or_default(project_dir)?;
            config.apply_environment();
            let warnings = config.validate()?;

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("komodo.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            let config = EnvironmentConfig::default();
            config.save(&config_path)?;

            println!("Created komodo.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - flutter_version, platforms");
            println!("  - install_android_sdk, android_api_level");
            println!("  - max_parallel_jobs, command_timeout_secs");
            println!();
        }
    }

    Ok(())
}
