//! The orchestrated environment setup — `kce setup`.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::sync::Arc;

use super::super::Cli;
use komodo_codex_env::config::EnvironmentConfig;
use komodo_codex_env::graph::Scheduler;
use komodo_codex_env::orchestrator::{Orchestrator, StepEvent};
use komodo_codex_env::report::ResultReporter;
use komodo_codex_env::steps::{default_steps, select_steps};
use komodo_codex_env::ui::{SetupUi, UiMode};
use tokio::sync::mpsc;

/// Name of the advisory lock file guarding concurrent runs.
const LOCK_FILE: &str = ".kce.lock";

/// Parsed `kce setup` flags.
pub struct SetupOptions {
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub max_parallel: Option<usize>,
    pub fail_fast: bool,
    pub ui: String,
    pub dry_run: bool,
    pub flutter_version: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub no_android: bool,
}

/// Merge CLI overrides into the loaded configuration.
fn apply_cli_overrides(config: &mut EnvironmentConfig, options: &SetupOptions) {
    if let Some(version) = &options.flutter_version {
        config.flutter_version = version.clone();
    }
    if let Some(platforms) = &options.platforms {
        config.platforms = platforms.clone();
    }
    if let Some(jobs) = options.max_parallel {
        config.max_parallel_jobs = jobs;
    }
    if options.no_android {
        config.install_android_sdk = false;
    }
}

pub async fn cmd_setup(
    project_dir: &std::path::Path,
    cli: &Cli,
    options: SetupOptions,
) -> Result<i32> {
    let mut config = EnvironmentConfig::load_or_default(project_dir)?;
    config.apply_environment();
    apply_cli_overrides(&mut config, &options);

    let warnings = config.validate()?;
    for warning in &warnings {
        eprintln!(
            "{} {}",
            console::style("warning:").yellow().bold(),
            warning
        );
    }

    let steps = select_steps(default_steps(&config), &options.only, &options.skip);
    if steps.is_empty() {
        println!("No steps selected.");
        return Ok(0);
    }

    let specs = steps.iter().map(|s| s.spec().clone()).collect();
    let scheduler = Scheduler::new(specs).context("Failed to build step graph")?;
    let frontiers = scheduler.compute_frontiers();

    let ui_mode = UiMode::parse(&options.ui);
    let ui = Arc::new(SetupUi::new(steps.len(), ui_mode, cli.verbose));

    if ui_mode == UiMode::Full {
        println!();
        println!(
            "{}",
            console::style("Komodo Codex Environment Setup").bold().cyan()
        );
        println!("──────────────────────────────");
        println!("Flutter: {}", config.flutter_version);
        println!("Platforms: {}", config.platforms.join(", "));
        println!("Max parallel: {}", config.max_parallel_jobs);
        if options.fail_fast {
            println!("Mode: fail-fast");
        }
        ui.print_plan(&frontiers);
    }

    if options.dry_run {
        println!("Dry run, nothing executed.");
        return Ok(0);
    }

    if !cli.yes && ui_mode != UiMode::Json {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Proceed with setup? This installs software on this machine")
            .default(true)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Aborted.");
            return Ok(0);
        }
    }

    // One setup run per project directory at a time.
    let lock_path = config.project_dir.join(LOCK_FILE);
    let lock_file = std::fs::File::create(&lock_path)
        .with_context(|| format!("Failed to create lock file at {}", lock_path.display()))?;
    lock_file.try_lock_exclusive().with_context(|| {
        format!(
            "Another setup run is already in progress (lock held on {})",
            lock_path.display()
        )
    })?;

    let (event_tx, mut event_rx) = mpsc::channel::<StepEvent>(100);
    let ui_task = Arc::clone(&ui);
    let display_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            ui_task.handle_event(&event);
        }
    });

    let config = Arc::new(config);
    let record = {
        let orchestrator = Orchestrator::new(Arc::clone(&config), steps)
            .with_fail_fast(options.fail_fast)
            .with_event_channel(event_tx);
        orchestrator.run().await?
    };
    // The orchestrator (and its channel sender) is gone, so the display
    // task drains remaining events and exits.
    display_handle.await.ok();

    if let Err(err) = record.save(&config.project_dir) {
        eprintln!(
            "{} could not save run record: {}",
            console::style("warning:").yellow().bold(),
            err
        );
    }

    let reporter = ResultReporter::new(cli.verbose);
    match ui_mode {
        UiMode::Json => println!("{}", reporter.render_json(&record)?),
        _ => println!("{}", reporter.render(&record)),
    }

    fs2::FileExt::unlock(&lock_file).ok();
    Ok(record.verdict.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SetupOptions {
        SetupOptions {
            only: vec![],
            skip: vec![],
            max_parallel: None,
            fail_fast: false,
            ui: "full".to_string(),
            dry_run: false,
            flutter_version: None,
            platforms: None,
            no_android: false,
        }
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let mut config = EnvironmentConfig::default();
        let mut opts = options();
        opts.flutter_version = Some("3.24.0".to_string());
        opts.platforms = Some(vec!["web".to_string(), "apk".to_string()]);
        opts.max_parallel = Some(2);
        opts.no_android = true;

        apply_cli_overrides(&mut config, &opts);

        assert_eq!(config.flutter_version, "3.24.0");
        assert_eq!(config.platforms, vec!["web", "apk"]);
        assert_eq!(config.max_parallel_jobs, 2);
        assert!(!config.install_android_sdk);
    }

    #[test]
    fn test_absent_overrides_leave_config_alone() {
        let mut config = EnvironmentConfig::default();
        let before = config.clone();
        apply_cli_overrides(&mut config, &options());
        assert_eq!(config.flutter_version, before.flutter_version);
        assert_eq!(config.install_android_sdk, before.install_android_sdk);
    }
}
