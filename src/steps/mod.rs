//! Concrete setup steps and the default step registry.
//!
//! `default_steps` assembles the step graph for a configuration: optional
//! steps are present only when the config enables them, and the
//! shell-integration step only depends on the android step when that step
//! is actually in the graph.

pub mod android;
pub mod docs;
pub mod flutter;
pub mod git_ops;
pub mod project;
pub mod shell_profile;
pub mod system_deps;

pub use android::AndroidStep;
pub use docs::DocsStep;
pub use flutter::FlutterStep;
pub use git_ops::GitOpsStep;
pub use project::ProjectSetupStep;
pub use shell_profile::ShellIntegrationStep;
pub use system_deps::SystemDepsStep;

use crate::config::EnvironmentConfig;
use crate::step::Step;
use std::collections::HashSet;
use std::sync::Arc;

/// Build the default step set for the given configuration.
pub fn default_steps(config: &EnvironmentConfig) -> Vec<Arc<dyn Step>> {
    let mut steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(SystemDepsStep::new()),
        Arc::new(FlutterStep::new()),
    ];

    if config.install_android_sdk {
        steps.push(Arc::new(AndroidStep::new()));
    }
    if config.fetch_all_remote_branches {
        steps.push(Arc::new(GitOpsStep::new()));
    }
    if config.fetch_agents_docs {
        steps.push(Arc::new(DocsStep::new()));
    }

    steps.push(Arc::new(ShellIntegrationStep::new(
        config.install_android_sdk,
    )));
    steps.push(Arc::new(ProjectSetupStep::new()));

    steps
}

/// Restrict a step set with `--only` / `--skip` filters.
///
/// Dependency edges into removed steps are pruned so the remaining graph
/// still builds. The caller owns the consequences: running `--only flutter`
/// assumes system deps are already in place.
pub fn select_steps(
    steps: Vec<Arc<dyn Step>>,
    only: &[String],
    skip: &[String],
) -> Vec<Arc<dyn Step>> {
    let only: HashSet<&str> = only.iter().map(String::as_str).collect();
    let skip: HashSet<&str> = skip.iter().map(String::as_str).collect();

    let kept: Vec<Arc<dyn Step>> = steps
        .into_iter()
        .filter(|s| {
            let id = s.spec().id.as_str();
            !skip.contains(id) && (only.is_empty() || only.contains(id))
        })
        .collect();

    let kept_ids: HashSet<String> = kept.iter().map(|s| s.spec().id.clone()).collect();

    kept.into_iter()
        .map(|step| {
            let mut spec = step.spec().clone();
            spec.depends_on.retain(|dep| kept_ids.contains(dep));
            if spec.depends_on == step.spec().depends_on {
                step
            } else {
                Arc::new(Respecced { inner: step, spec }) as Arc<dyn Step>
            }
        })
        .collect()
}

/// A step wrapper carrying a pruned spec.
struct Respecced {
    inner: Arc<dyn Step>,
    spec: crate::step::StepSpec,
}

#[async_trait::async_trait]
impl Step for Respecced {
    fn spec(&self) -> &crate::step::StepSpec {
        &self.spec
    }

    async fn execute(
        &self,
        ctx: &crate::step::StepContext,
    ) -> Result<crate::step::StepReport, crate::errors::StepError> {
        self.inner.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(steps: &[Arc<dyn Step>]) -> Vec<String> {
        steps.iter().map(|s| s.spec().id.clone()).collect()
    }

    #[test]
    fn test_default_steps_full_config() {
        let config = EnvironmentConfig::default();
        let steps = default_steps(&config);
        assert_eq!(
            ids(&steps),
            vec![
                "system-deps",
                "flutter",
                "android",
                "git-ops",
                "docs",
                "shell-integration",
                "project-setup"
            ]
        );
    }

    #[test]
    fn test_optional_steps_respect_config() {
        let mut config = EnvironmentConfig::default();
        config.install_android_sdk = false;
        config.fetch_all_remote_branches = false;
        config.fetch_agents_docs = false;

        let steps = default_steps(&config);
        assert_eq!(
            ids(&steps),
            vec!["system-deps", "flutter", "shell-integration", "project-setup"]
        );

        // Without android in the graph, shell-integration must not name it
        let shell = steps
            .iter()
            .find(|s| s.spec().id == "shell-integration")
            .unwrap();
        assert_eq!(shell.spec().depends_on, vec!["flutter"]);
    }

    #[test]
    fn test_shell_integration_depends_on_android_when_present() {
        let config = EnvironmentConfig::default();
        let steps = default_steps(&config);
        let shell = steps
            .iter()
            .find(|s| s.spec().id == "shell-integration")
            .unwrap();
        assert!(shell.spec().depends_on.contains(&"android".to_string()));
    }

    #[test]
    fn test_select_steps_skip() {
        let config = EnvironmentConfig::default();
        let steps = select_steps(default_steps(&config), &[], &["android".to_string()]);
        assert!(!ids(&steps).contains(&"android".to_string()));

        // The edge into the skipped step is pruned
        let shell = steps
            .iter()
            .find(|s| s.spec().id == "shell-integration")
            .unwrap();
        assert!(!shell.spec().depends_on.contains(&"android".to_string()));
    }

    #[test]
    fn test_select_steps_only() {
        let config = EnvironmentConfig::default();
        let steps = select_steps(
            default_steps(&config),
            &["flutter".to_string()],
            &[],
        );
        assert_eq!(ids(&steps), vec!["flutter"]);
        // flutter's dependency on the removed system-deps step is pruned
        assert!(steps[0].spec().depends_on.is_empty());
    }
}
