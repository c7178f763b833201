//! Step abstraction for the setup orchestrator.
//!
//! A step is a named unit of installation work with a stable id, a
//! criticality flag and a set of dependencies. Steps are idempotent: they
//! probe current machine state before mutating it, so re-running a
//! partially failed setup is always safe.

use crate::config::EnvironmentConfig;
use crate::errors::StepError;
use crate::orchestrator::StepEvent;
use crate::runner::CommandRunner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Static description of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Stable identifier, used in dependency edges and `--only`/`--skip`.
    pub id: String,
    /// Human-readable title for reports and progress output.
    pub title: String,
    /// A critical step aborts the run when it fails; a non-critical one
    /// only degrades the verdict.
    pub critical: bool,
    /// Ids of steps that must terminate before this one starts.
    pub depends_on: Vec<String>,
}

impl StepSpec {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        critical: bool,
        depends_on: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            critical,
            depends_on,
        }
    }
}

/// What a successfully finished step hands back to the orchestrator.
///
/// Warnings record optional sub-actions that failed without failing the
/// step (for example a melos activation that did not go through).
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub warnings: Vec<String>,
}

impl StepReport {
    /// A clean success.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Record an optional sub-action failure.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.add_warning(warning);
        self
    }
}

/// Live diagnostics hook handed to a running step.
///
/// Lines logged here reach the progress UI while the step is still
/// running; they are not part of the final run record.
#[derive(Debug, Clone)]
pub struct StepProgress {
    step_id: String,
    tx: Option<mpsc::Sender<StepEvent>>,
}

impl StepProgress {
    pub fn new(step_id: impl Into<String>, tx: mpsc::Sender<StepEvent>) -> Self {
        Self {
            step_id: step_id.into(),
            tx: Some(tx),
        }
    }

    /// A progress hook that drops everything. Used by tests and dry runs.
    pub fn disabled(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            tx: None,
        }
    }

    /// Emit one diagnostic line.
    pub async fn log(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(step = %self.step_id, "{}", line);
        if let Some(ref tx) = self.tx {
            tx.send(StepEvent::Log {
                step: self.step_id.clone(),
                line,
            })
            .await
            .ok();
        }
    }
}

/// Everything a step needs at execution time.
pub struct StepContext {
    /// Read-only merged configuration.
    pub config: Arc<EnvironmentConfig>,
    /// Command execution handle.
    pub runner: CommandRunner,
    /// Live diagnostics hook.
    pub progress: StepProgress,
}

/// A unit of installation work.
#[async_trait]
pub trait Step: Send + Sync {
    /// The step's static description.
    fn spec(&self) -> &StepSpec;

    /// Run the step. Implementations must be idempotent.
    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopStep {
        spec: StepSpec,
    }

    #[async_trait]
    impl Step for NoopStep {
        fn spec(&self) -> &StepSpec {
            &self.spec
        }

        async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
            ctx.progress.log("doing nothing").await;
            Ok(StepReport::ok().with_warning("nothing was done"))
        }
    }

    fn test_context() -> StepContext {
        let mut config = EnvironmentConfig::default();
        config.project_dir = std::env::temp_dir();
        StepContext {
            config: Arc::new(config),
            runner: CommandRunner::new(std::env::temp_dir()),
            progress: StepProgress::disabled("noop"),
        }
    }

    #[test]
    fn test_step_spec_shape() {
        let spec = StepSpec::new("flutter", "Flutter SDK", true, vec!["system-deps".into()]);
        assert_eq!(spec.id, "flutter");
        assert!(spec.critical);
        assert_eq!(spec.depends_on, vec!["system-deps"]);
    }

    #[test]
    fn test_report_accumulates_warnings() {
        let mut report = StepReport::ok();
        assert!(report.warnings.is_empty());
        report.add_warning("melos activation failed");
        report.add_warning("JDK install skipped");
        assert_eq!(report.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_step_runs_through_trait_object() {
        let step: Box<dyn Step> = Box::new(NoopStep {
            spec: StepSpec::new("noop", "No-op", false, vec![]),
        });
        let ctx = test_context();
        let report = step.execute(&ctx).await.unwrap();
        assert_eq!(report.warnings, vec!["nothing was done"]);
    }

    #[tokio::test]
    async fn test_disabled_progress_is_silent() {
        let progress = StepProgress::disabled("x");
        progress.log("goes nowhere").await;
    }

    #[tokio::test]
    async fn test_progress_delivers_log_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let progress = StepProgress::new("flutter", tx);
        progress.log("installing fvm").await;

        match rx.recv().await {
            Some(StepEvent::Log { step, line }) => {
                assert_eq!(step, "flutter");
                assert_eq!(line, "installing fvm");
            }
            other => panic!("Expected Log event, got {:?}", other),
        }
    }
}
