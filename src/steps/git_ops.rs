//! Git repository upkeep.
//!
//! Marks the project directory as a git safe.directory and fetches all
//! remote branches. The step succeeds trivially outside a git repository,
//! and anything unusual inside one degrades to a warning; network flakiness
//! must not sink a setup run.

use crate::errors::StepError;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetches remote branches for the project repository.
pub struct GitOpsStep {
    spec: StepSpec,
}

impl GitOpsStep {
    pub fn new() -> Self {
        Self {
            spec: StepSpec::new(
                "git-ops",
                "Git branches",
                false,
                vec!["system-deps".to_string()],
            ),
        }
    }

    async fn is_git_repo(ctx: &StepContext) -> bool {
        ctx.runner
            .run("git rev-parse --is-inside-work-tree")
            .await
            .success()
    }
}

impl Default for GitOpsStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for GitOpsStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::ok();

        if !Self::is_git_repo(ctx).await {
            ctx.progress
                .log("not a git repository, nothing to fetch")
                .await;
            return Ok(report);
        }

        // Container checkouts are often owned by another uid; without this
        // git refuses to operate on the repository at all.
        let safe = ctx
            .runner
            .run(&format!(
                "git config --global --add safe.directory {}",
                ctx.config.project_dir.display()
            ))
            .await;
        if !safe.success() {
            report.add_warning(format!(
                "could not mark {} as a safe directory: {}",
                ctx.config.project_dir.display(),
                safe.stderr_tail()
            ));
        }

        let origin = ctx.runner.run("git remote get-url origin").await;
        if !origin.success() {
            report.add_warning("no origin remote configured, skipping fetch".to_string());
            return Ok(report);
        }

        ctx.progress.log("fetching all remote branches").await;
        let fetch = ctx
            .runner
            .run_with_timeout("git fetch --all", FETCH_TIMEOUT)
            .await;
        if !fetch.success() {
            report.add_warning(format!(
                "git fetch --all failed: {}",
                fetch.stderr_tail()
            ));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_shape() {
        let step = GitOpsStep::new();
        assert_eq!(step.spec().id, "git-ops");
        assert!(!step.spec().critical);
        assert_eq!(step.spec().depends_on, vec!["system-deps"]);
    }
}
