//! Environment status — `kce status`.

use anyhow::Result;

use komodo_codex_env::config::EnvironmentConfig;
use komodo_codex_env::graph::RunRecord;
use komodo_codex_env::report::ResultReporter;
use komodo_codex_env::runner::CommandRunner;
use komodo_codex_env::ui::icons::{CHECK, CROSS};

/// Tools probed by `kce status`, with the command printing their version.
const TOOLS: &[(&str, &str)] = &[
    ("git", "git --version"),
    ("curl", "curl --version"),
    ("fvm", "fvm --version"),
    ("flutter", "fvm flutter --version"),
    ("dart", "fvm dart --version"),
    ("java", "java -version"),
];

/// First non-empty line of a command's output.
///
/// `java -version` writes to stderr, so stdout alone is not enough.
fn version_line(stdout: &str, stderr: &str) -> Option<String> {
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}

pub async fn cmd_status(project_dir: &std::path::Path) -> Result<()> {
    let mut config = EnvironmentConfig::load_or_default(project_dir)?;
    config.apply_environment();

    let runner = CommandRunner::new(&config.project_dir);

    println!();
    println!("{}", console::style("Tool versions").bold().cyan());
    println!("─────────────");
    for (name, command) in TOOLS {
        let outcome = runner.run(command).await;
        if outcome.success() {
            let version = version_line(&outcome.stdout, &outcome.stderr)
                .unwrap_or_else(|| "unknown version".to_string());
            println!("  {} {:<8} {}", CHECK, name, console::style(version).dim());
        } else {
            println!(
                "  {} {:<8} {}",
                CROSS,
                name,
                console::style("not installed").red()
            );
        }
    }
    println!();

    match RunRecord::load(&config.project_dir)? {
        Some(record) => {
            println!(
                "{} {}",
                console::style("Last run:").bold(),
                record.started_at.to_rfc3339()
            );
            println!("{}", ResultReporter::new(false).render(&record));
        }
        None => {
            println!("No previous run recorded. Run {} first.",
                console::style("kce setup").yellow());
            println!();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line_prefers_stdout() {
        assert_eq!(
            version_line("git version 2.43.0\n", ""),
            Some("git version 2.43.0".to_string())
        );
    }

    #[test]
    fn test_version_line_falls_back_to_stderr() {
        let stderr = "openjdk version \"17.0.1\" 2021-10-19\n";
        assert_eq!(
            version_line("", stderr),
            Some("openjdk version \"17.0.1\" 2021-10-19".to_string())
        );
    }

    #[test]
    fn test_version_line_empty_output() {
        assert_eq!(version_line("", "\n\n"), None);
    }
}
