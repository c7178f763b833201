//! Step listing and dependency probing — `kce list`, `kce check-deps`.

use anyhow::{Context, Result};

use komodo_codex_env::config::EnvironmentConfig;
use komodo_codex_env::graph::Scheduler;
use komodo_codex_env::runner::CommandRunner;
use komodo_codex_env::steps::system_deps::{REQUIRED_DEPENDENCIES, SystemDepsStep};
use komodo_codex_env::steps::default_steps;
use komodo_codex_env::ui::icons::{CHECK, CROSS};

/// Show the configured steps and the stages they would execute in.
pub fn cmd_list(project_dir: &std::path::Path) -> Result<()> {
    let mut config = EnvironmentConfig::load_or_default(project_dir)?;
    config.apply_environment();

    let steps = default_steps(&config);
    let specs: Vec<_> = steps.iter().map(|s| s.spec().clone()).collect();

    println!();
    println!("{}", console::style("Setup Steps").bold().cyan());
    println!("───────────");
    for spec in &specs {
        let criticality = if spec.critical {
            console::style("critical").red().to_string()
        } else {
            console::style("optional").dim().to_string()
        };
        let deps = if spec.depends_on.is_empty() {
            "-".to_string()
        } else {
            spec.depends_on.join(", ")
        };
        println!(
            "  {:<18} {:<22} {:<10} after: {}",
            console::style(&spec.id).yellow(),
            spec.title,
            criticality,
            deps
        );
    }

    let scheduler = Scheduler::new(specs).context("Failed to build step graph")?;
    let frontiers = scheduler.compute_frontiers();
    println!();
    println!("{}", console::style("Execution stages").bold());
    for (i, frontier) in frontiers.iter().enumerate() {
        println!("  Stage {}: [{}]", i + 1, frontier.join(", "));
    }
    println!();

    Ok(())
}

/// Probe required system dependencies and report which are missing.
pub async fn cmd_check_deps(project_dir: &std::path::Path) -> Result<()> {
    let runner = CommandRunner::new(project_dir);

    let Some(pm) = SystemDepsStep::detect_manager(&runner).await else {
        anyhow::bail!("no supported package manager found (need apt, brew or pacman)");
    };

    println!();
    println!(
        "{} (package manager: {})",
        console::style("System dependencies").bold().cyan(),
        pm.command()
    );
    println!("───────────────────");

    let mut missing = 0;
    for dep in REQUIRED_DEPENDENCIES {
        if SystemDepsStep::is_installed(&runner, pm, dep).await {
            println!("  {} {}", CHECK, dep);
        } else {
            println!("  {} {}", CROSS, console::style(dep).red());
            missing += 1;
        }
    }
    println!();

    if missing > 0 {
        println!(
            "{} missing; run {} to install them.",
            missing,
            console::style("kce setup --only system-deps").yellow()
        );
    } else {
        println!("All required dependencies are present.");
    }
    println!();

    Ok(())
}
