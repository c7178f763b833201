//! Agent documentation download.
//!
//! Fetches AGENTS.md from the configured gist into the project directory
//! and hides it from git via .git/info/exclude. The exclude update is
//! marker-guarded so repeated runs never duplicate patterns.

use crate::errors::StepError;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;
use std::path::Path;

/// Patterns kept out of the working tree's git status.
const EXCLUDE_PATTERNS: &[&str] = &["AGENTS.md", "AGENTS_*.md"];

/// Downloads AGENTS.md into the project directory.
pub struct DocsStep {
    spec: StepSpec,
}

impl DocsStep {
    pub fn new() -> Self {
        Self {
            spec: StepSpec::new(
                "docs",
                "Agent docs",
                false,
                vec!["system-deps".to_string()],
            ),
        }
    }
}

impl Default for DocsStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `patterns` to a git exclude file, skipping lines already present.
///
/// Returns how many patterns were added.
fn update_exclude_file(exclude_file: &Path, patterns: &[&str]) -> std::io::Result<usize> {
    let existing = match std::fs::read_to_string(exclude_file) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err),
    };
    let present: std::collections::HashSet<&str> = existing.lines().collect();

    let missing: Vec<&str> = patterns
        .iter()
        .copied()
        .filter(|p| !present.contains(p))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for pattern in &missing {
        content.push_str(pattern);
        content.push('\n');
    }
    std::fs::write(exclude_file, content)?;
    Ok(missing.len())
}

#[async_trait]
impl Step for DocsStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::ok();
        let url = ctx.config.agents_doc_url();
        let target = ctx.config.project_dir.join("AGENTS.md");

        ctx.progress.log("fetching AGENTS.md").await;
        let command = format!("curl -fsSL -o {} {}", target.display(), url);
        let outcome = ctx.runner.run(&command).await;
        if !outcome.success() {
            return Err(outcome.to_step_error(&command, ctx.runner.timeout_secs()));
        }

        let exclude_file = ctx
            .config
            .project_dir
            .join(".git")
            .join("info")
            .join("exclude");
        if exclude_file.parent().is_some_and(|dir| dir.is_dir()) {
            match update_exclude_file(&exclude_file, EXCLUDE_PATTERNS) {
                Ok(0) => {}
                Ok(added) => {
                    ctx.progress
                        .log(format!("added {} patterns to .git/info/exclude", added))
                        .await;
                }
                Err(err) => {
                    report.add_warning(format!("could not update .git/info/exclude: {}", err));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_spec_shape() {
        let step = DocsStep::new();
        assert_eq!(step.spec().id, "docs");
        assert!(!step.spec().critical);
        assert_eq!(step.spec().depends_on, vec!["system-deps"]);
    }

    #[test]
    fn test_exclude_file_created_with_patterns() {
        let dir = TempDir::new().unwrap();
        let exclude = dir.path().join("exclude");

        let added = update_exclude_file(&exclude, EXCLUDE_PATTERNS).unwrap();
        assert_eq!(added, 2);

        let content = std::fs::read_to_string(&exclude).unwrap();
        assert!(content.contains("AGENTS.md"));
        assert!(content.contains("AGENTS_*.md"));
    }

    #[test]
    fn test_exclude_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let exclude = dir.path().join("exclude");

        update_exclude_file(&exclude, EXCLUDE_PATTERNS).unwrap();
        let added = update_exclude_file(&exclude, EXCLUDE_PATTERNS).unwrap();
        assert_eq!(added, 0);

        let content = std::fs::read_to_string(&exclude).unwrap();
        assert_eq!(content.matches("AGENTS.md").count(), 2); // AGENTS.md + AGENTS_*.md
    }

    #[test]
    fn test_exclude_preserves_existing_lines() {
        let dir = TempDir::new().unwrap();
        let exclude = dir.path().join("exclude");
        std::fs::write(&exclude, "*.log\nAGENTS.md").unwrap();

        let added = update_exclude_file(&exclude, EXCLUDE_PATTERNS).unwrap();
        assert_eq!(added, 1);

        let content = std::fs::read_to_string(&exclude).unwrap();
        assert!(content.starts_with("*.log\nAGENTS.md\n"));
        assert!(content.ends_with("AGENTS_*.md\n"));
    }
}
