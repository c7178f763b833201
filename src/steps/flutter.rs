//! Flutter SDK installation via FVM.
//!
//! Installs FVM with the official installer script when missing, then
//! installs and activates the configured Flutter version. Melos activation
//! is an optional sub-action: its failure degrades to a warning.

use crate::errors::StepError;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;
use std::time::Duration;

/// FVM installer endpoint.
const FVM_INSTALL_SCRIPT: &str = "https://fvm.app/install.sh";

/// Flutter SDK downloads are slow; give installs their own budget.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Installs FVM, Flutter and melos.
pub struct FlutterStep {
    spec: StepSpec,
}

impl FlutterStep {
    pub fn new() -> Self {
        Self {
            spec: StepSpec::new(
                "flutter",
                "Flutter SDK",
                true,
                vec!["system-deps".to_string()],
            ),
        }
    }

    /// Find a usable fvm invocation.
    ///
    /// The installer script drops the binary into `~/.pub-cache/bin`, which
    /// is usually not on PATH yet in the same session, so fall back to the
    /// absolute path when the bare command is unavailable.
    async fn resolve_fvm(ctx: &StepContext) -> Option<String> {
        if ctx.runner.command_exists("fvm").await {
            return Some("fvm".to_string());
        }
        let candidate = ctx.config.pub_cache_bin_dir().join("fvm");
        if candidate.is_file() {
            return Some(candidate.to_string_lossy().into_owned());
        }
        None
    }

    async fn ensure_fvm(ctx: &StepContext) -> Result<String, StepError> {
        if let Some(fvm) = Self::resolve_fvm(ctx).await {
            ctx.progress.log("fvm already installed").await;
            return Ok(fvm);
        }

        ctx.progress.log("installing fvm").await;
        let command = format!("curl -fsSL {} | bash", FVM_INSTALL_SCRIPT);
        let outcome = ctx.runner.run_with_timeout(&command, INSTALL_TIMEOUT).await;
        if !outcome.success() {
            return Err(outcome.to_step_error(&command, INSTALL_TIMEOUT.as_secs()));
        }

        Self::resolve_fvm(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("fvm installer ran but fvm is not usable").into())
    }
}

impl Default for FlutterStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `fvm list` output already shows the wanted version.
fn list_contains_version(output: &str, version: &str) -> bool {
    output.lines().any(|line| line.contains(version))
}

#[async_trait]
impl Step for FlutterStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::ok();
        let version = &ctx.config.flutter_version;

        let fvm = Self::ensure_fvm(ctx).await?;

        let listed = ctx.runner.run(&format!("{} list", fvm)).await;
        if listed.success() && list_contains_version(&listed.stdout, version) {
            ctx.progress
                .log(format!("Flutter {} already installed", version))
                .await;
        } else {
            ctx.progress
                .log(format!("installing Flutter {} via fvm", version))
                .await;
            let command = format!("{} install {}", fvm, version);
            let outcome = ctx.runner.run_with_timeout(&command, INSTALL_TIMEOUT).await;
            if !outcome.success() {
                return Err(outcome.to_step_error(&command, INSTALL_TIMEOUT.as_secs()));
            }
        }

        ctx.progress
            .log(format!("setting Flutter {} as global default", version))
            .await;
        let global = ctx
            .runner
            .run(&format!("{} global {}", fvm, version))
            .await;
        if !global.success() {
            report.add_warning(format!(
                "could not set Flutter {} as global default: {}",
                version,
                global.stderr_tail()
            ));
        }

        // Verify the toolchain answers before declaring success
        let verify_command = format!("{} flutter --version", fvm);
        let verify = ctx.runner.run(&verify_command).await;
        if !verify.success() {
            return Err(verify.to_step_error(&verify_command, ctx.runner.timeout_secs()));
        }

        ctx.progress.log("activating melos").await;
        let melos = ctx
            .runner
            .run(&format!("{} dart pub global activate melos", fvm))
            .await;
        if !melos.success() {
            report.add_warning(format!(
                "melos activation failed: {}",
                melos.stderr_tail()
            ));
        }

        Ok(report)
    }
}
