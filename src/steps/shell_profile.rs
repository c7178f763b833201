//! Shell profile integration.
//!
//! Appends PATH entries for the FVM default SDK and the pub cache, plus
//! Android environment variables when the SDK is part of the run, to the
//! user's shell profile. Every append is scan-before-write under a marker
//! comment so repeated runs leave the profile untouched.

use crate::errors::StepError;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;
use std::path::Path;

pub const PROFILE_MARKER: &str = "# Added by Komodo Codex Environment Setup";

/// Makes the installed toolchain reachable from new shells.
pub struct ShellIntegrationStep {
    spec: StepSpec,
    with_android: bool,
}

impl ShellIntegrationStep {
    pub fn new(with_android: bool) -> Self {
        let mut depends_on = vec!["flutter".to_string()];
        if with_android {
            depends_on.push("android".to_string());
        }
        Self {
            spec: StepSpec::new("shell-integration", "Shell integration", true, depends_on),
            with_android,
        }
    }
}

/// Lines to append to the profile for the given toolchain layout.
fn profile_lines(
    flutter_bin: &Path,
    pub_cache_bin: &Path,
    android_home: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![
        format!("export PATH=\"{}:$PATH\"", flutter_bin.display()),
        format!("export PATH=\"{}:$PATH\"", pub_cache_bin.display()),
    ];
    if let Some(home) = android_home {
        lines.push(format!("export ANDROID_HOME=\"{}\"", home.display()));
        lines.push(format!("export ANDROID_SDK_ROOT=\"{}\"", home.display()));
        lines.push(format!(
            "export PATH=\"{}:$PATH\"",
            home.join("cmdline-tools").join("latest").join("bin").display()
        ));
        lines.push(format!(
            "export PATH=\"{}:$PATH\"",
            home.join("platform-tools").display()
        ));
    }
    lines
}

/// Append `lines` to `profile`, skipping lines already present.
///
/// New lines go under the marker comment. Returns how many were added.
fn append_profile_lines(profile: &Path, lines: &[String]) -> std::io::Result<usize> {
    let existing = match std::fs::read_to_string(profile) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err),
    };

    let missing: Vec<&String> = lines
        .iter()
        .filter(|line| !existing.contains(line.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    if let Some(dir) = profile.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push('\n');
    content.push_str(PROFILE_MARKER);
    content.push('\n');
    for line in &missing {
        content.push_str(line);
        content.push('\n');
    }
    std::fs::write(profile, content)?;
    Ok(missing.len())
}

#[async_trait]
impl Step for ShellIntegrationStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let profile = ctx.config.shell_profile();
        let flutter_bin = ctx.config.flutter_bin_dir();
        let pub_cache_bin = ctx.config.pub_cache_bin_dir();
        let android_home = self.with_android.then(|| ctx.config.android_home());

        let lines = profile_lines(&flutter_bin, &pub_cache_bin, android_home.as_deref());

        match append_profile_lines(&profile, &lines) {
            Ok(0) => {
                ctx.progress
                    .log(format!("{} already up to date", profile.display()))
                    .await;
            }
            Ok(added) => {
                ctx.progress
                    .log(format!("added {} entries to {}", added, profile.display()))
                    .await;
            }
            Err(err) => {
                return Err(anyhow::anyhow!(
                    "could not update {}: {}",
                    profile.display(),
                    err
                )
                .into());
            }
        }

        Ok(StepReport::ok())
    }
}
