//! Android SDK installation.
//!
//! Ensures a JDK is present, downloads the command line tools for the host
//! OS, then installs the platform and build-tools packages the configured
//! API level needs. Individual sdkmanager package failures degrade to
//! warnings; a missing sdkmanager after extraction fails the step.

use crate::errors::StepError;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pinned command line tools build, per dl.google.com naming.
const CMDLINE_TOOLS_VERSION: &str = "11076708";

const REPOSITORY_BASE_URL: &str = "https://dl.google.com/android/repository";

/// The zip is ~150 MB; downloads and package installs get a wide budget.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const PACKAGE_TIMEOUT: Duration = Duration::from_secs(300);
const LICENSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Download URL for the host OS command line tools.
fn cmdline_tools_url(os: &str) -> String {
    let platform = match os {
        "macos" => "mac",
        "windows" => "win",
        _ => "linux",
    };
    format!(
        "{}/commandlinetools-{}-{}_latest.zip",
        REPOSITORY_BASE_URL, platform, CMDLINE_TOOLS_VERSION
    )
}

/// Installs the Android SDK under the configured `ANDROID_HOME`.
pub struct AndroidStep {
    spec: StepSpec,
}

impl AndroidStep {
    pub fn new() -> Self {
        Self {
            spec: StepSpec::new(
                "android",
                "Android SDK",
                false,
                vec!["system-deps".to_string()],
            ),
        }
    }

    fn sdkmanager_path(android_home: &Path) -> PathBuf {
        android_home
            .join("cmdline-tools")
            .join("latest")
            .join("bin")
            .join("sdkmanager")
    }

    async fn ensure_java(ctx: &StepContext, report: &mut StepReport) -> Result<(), StepError> {
        let has_java = ctx.runner.command_exists("java").await
            && ctx.runner.command_exists("javac").await;
        if has_java {
            ctx.progress.log("JDK already installed").await;
            return Ok(());
        }

        if std::env::consts::OS != "linux" {
            report.add_warning(
                "no JDK found; install one manually (https://adoptium.net/temurin/releases/)"
                    .to_string(),
            );
            return Ok(());
        }

        ctx.progress.log("installing OpenJDK 17").await;
        let outcome = ctx
            .runner
            .run_with_timeout("sudo apt-get install -y openjdk-17-jdk", PACKAGE_TIMEOUT)
            .await;
        if !outcome.success() {
            report.add_warning(format!(
                "could not install OpenJDK 17: {}",
                outcome.stderr_tail()
            ));
        }
        Ok(())
    }

    async fn install_cmdline_tools(
        ctx: &StepContext,
        android_home: &Path,
    ) -> Result<(), StepError> {
        let url = cmdline_tools_url(std::env::consts::OS);
        let zip_path = android_home.join("cmdline-tools.zip");
        let home = android_home.display();

        std::fs::create_dir_all(android_home).map_err(|source| StepError::Io {
            path: android_home.to_path_buf(),
            source,
        })?;

        ctx.progress.log("downloading Android command line tools").await;
        let download = format!("curl -fsSL -o {} {}", zip_path.display(), url);
        let outcome = ctx.runner.run_with_timeout(&download, DOWNLOAD_TIMEOUT).await;
        if !outcome.success() {
            return Err(outcome.to_step_error(&download, DOWNLOAD_TIMEOUT.as_secs()));
        }

        // The zip unpacks a bare `cmdline-tools/` directory; sdkmanager
        // expects to live under `cmdline-tools/latest/`.
        ctx.progress.log("extracting command line tools").await;
        let extract = format!(
            "unzip -q -o {zip} -d {home} \
             && mv {home}/cmdline-tools {home}/cmdline-tools-staging \
             && mkdir -p {home}/cmdline-tools \
             && mv {home}/cmdline-tools-staging {home}/cmdline-tools/latest \
             && rm -f {zip}",
            zip = zip_path.display(),
            home = home,
        );
        let outcome = ctx.runner.run_with_timeout(&extract, DOWNLOAD_TIMEOUT).await;
        if !outcome.success() {
            return Err(outcome.to_step_error("unzip cmdline-tools", DOWNLOAD_TIMEOUT.as_secs()));
        }

        if !Self::sdkmanager_path(android_home).is_file() {
            return Err(anyhow::anyhow!(
                "sdkmanager not found under {} after extraction",
                android_home.display()
            )
            .into());
        }
        Ok(())
    }

    async fn install_packages(
        ctx: &StepContext,
        android_home: &Path,
        report: &mut StepReport,
    ) -> Result<(), StepError> {
        let sdkmanager = Self::sdkmanager_path(android_home);
        let sdk_root = format!("--sdk_root={}", android_home.display());

        ctx.progress.log("accepting Android SDK licenses").await;
        let licenses = format!("yes | {} {} --licenses", sdkmanager.display(), sdk_root);
        let outcome = ctx.runner.run_with_timeout(&licenses, LICENSE_TIMEOUT).await;
        if !outcome.success() {
            report.add_warning(format!(
                "license acceptance did not complete cleanly: {}",
                outcome.stderr_tail()
            ));
        }

        let packages = [
            "platform-tools".to_string(),
            format!("platforms;android-{}", ctx.config.android_api_level),
            format!("build-tools;{}", ctx.config.android_build_tools_version),
        ];

        for package in &packages {
            ctx.progress.log(format!("installing {}", package)).await;
            let command = format!("{} {} '{}'", sdkmanager.display(), sdk_root, package);
            let outcome = ctx.runner.run_with_timeout(&command, PACKAGE_TIMEOUT).await;
            if !outcome.success() {
                report.add_warning(format!(
                    "could not install {}: {}",
                    package,
                    outcome.stderr_tail()
                ));
            }
        }
        Ok(())
    }
}

impl Default for AndroidStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for AndroidStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::ok();
        let android_home = ctx.config.android_home();

        Self::ensure_java(ctx, &mut report).await?;

        if Self::sdkmanager_path(&android_home).is_file() {
            ctx.progress.log("Android command line tools already installed").await;
        } else {
            Self::install_cmdline_tools(ctx, &android_home).await?;
        }

        Self::install_packages(ctx, &android_home, &mut report).await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_shape() {
        let step = AndroidStep::new();
        assert_eq!(step.spec().id, "android");
        assert!(!step.spec().critical);
        assert_eq!(step.spec().depends_on, vec!["system-deps"]);
    }

    #[test]
    fn test_cmdline_tools_url_per_os() {
        assert_eq!(
            cmdline_tools_url("linux"),
            "https://dl.google.com/android/repository/commandlinetools-linux-11076708_latest.zip"
        );
        assert!(cmdline_tools_url("macos").contains("commandlinetools-mac-"));
        assert!(cmdline_tools_url("windows").contains("commandlinetools-win-"));
        // Unknown platforms fall back to the Linux archive
        assert!(cmdline_tools_url("freebsd").contains("commandlinetools-linux-"));
    }

    #[test]
    fn test_sdkmanager_path_layout() {
        let path = AndroidStep::sdkmanager_path(Path::new("/home/dev/Android/Sdk"));
        assert_eq!(
            path,
            PathBuf::from("/home/dev/Android/Sdk/cmdline-tools/latest/bin/sdkmanager")
        );
    }
}
