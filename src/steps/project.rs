//! Flutter project setup.
//!
//! Runs only when the project directory holds a pubspec.yaml: fetches pub
//! dependencies, runs build_runner code generation and builds the
//! configured platform targets. Code generation and builds are optional
//! sub-actions; only `pub get` can fail the step.

use crate::errors::StepError;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;
use std::time::Duration;

/// build_runner and platform builds routinely take several minutes.
const BUILD_TIMEOUT: Duration = Duration::from_secs(900);

/// Prepares the Flutter project in the project directory.
pub struct ProjectSetupStep {
    spec: StepSpec,
}

impl ProjectSetupStep {
    pub fn new() -> Self {
        Self {
            spec: StepSpec::new(
                "project-setup",
                "Project setup",
                false,
                vec!["flutter".to_string(), "shell-integration".to_string()],
            ),
        }
    }
}

impl Default for ProjectSetupStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for ProjectSetupStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::ok();

        if !ctx.config.project_dir.join("pubspec.yaml").is_file() {
            ctx.progress
                .log("no pubspec.yaml, nothing to set up")
                .await;
            return Ok(report);
        }

        ctx.progress.log("running flutter pub get").await;
        let command = "fvm flutter pub get";
        let outcome = ctx.runner.run_with_timeout(command, BUILD_TIMEOUT).await;
        if !outcome.success() {
            return Err(outcome.to_step_error(command, BUILD_TIMEOUT.as_secs()));
        }

        ctx.progress.log("running build_runner").await;
        let codegen = ctx
            .runner
            .run_with_timeout(
                "fvm dart run build_runner build --delete-conflicting-outputs",
                BUILD_TIMEOUT,
            )
            .await;
        if !codegen.success() {
            report.add_warning(format!(
                "build_runner failed: {}",
                codegen.stderr_tail()
            ));
        }

        for platform in &ctx.config.platforms {
            ctx.progress
                .log(format!("building {} target", platform))
                .await;
            let command = format!("fvm flutter build {}", platform);
            let outcome = ctx.runner.run_with_timeout(&command, BUILD_TIMEOUT).await;
            if !outcome.success() {
                report.add_warning(format!(
                    "{} build failed: {}",
                    platform,
                    outcome.stderr_tail()
                ));
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_shape() {
        let step = ProjectSetupStep::new();
        assert_eq!(step.spec().id, "project-setup");
        assert!(!step.spec().critical);
        assert_eq!(
            step.spec().depends_on,
            vec!["flutter", "shell-integration"]
        );
    }
}
