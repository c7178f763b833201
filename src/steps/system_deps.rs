//! System dependency installation.
//!
//! Detects the host package manager, probes which required tools are
//! already present and installs only the missing set. Platform-agnostic
//! dependency names are mapped to per-manager package names; an empty
//! mapping means the dependency is not needed on that platform.

use crate::errors::StepError;
use crate::runner::CommandRunner;
use crate::step::{Step, StepContext, StepReport, StepSpec};
use async_trait::async_trait;

/// Dependencies every setup run needs, in platform-agnostic names.
pub const REQUIRED_DEPENDENCIES: &[&str] = &[
    "curl",
    "git",
    "unzip",
    "xz-utils",
    "zip",
    "libglu1-mesa",
    "build-essential",
];

/// Supported system package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Brew,
    Pacman,
}

impl PackageManager {
    /// All managers in probe order.
    pub const ALL: &'static [PackageManager] = &[Self::Apt, Self::Brew, Self::Pacman];

    /// The executable probed on PATH.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Brew => "brew",
            Self::Pacman => "pacman",
        }
    }

    /// Map a platform-agnostic dependency name to this manager's package.
    ///
    /// `None` means the dependency is not needed on this platform.
    pub fn package_for(&self, dep: &str) -> Option<&'static str> {
        match (self, dep) {
            (_, "curl") => Some("curl"),
            (_, "git") => Some("git"),
            (_, "unzip") => Some("unzip"),
            (_, "zip") => Some("zip"),
            (Self::Apt, "xz-utils") => Some("xz-utils"),
            (Self::Brew, "xz-utils") | (Self::Pacman, "xz-utils") => Some("xz"),
            (Self::Apt, "libglu1-mesa") => Some("libglu1-mesa"),
            (Self::Brew, "libglu1-mesa") => None,
            (Self::Pacman, "libglu1-mesa") => Some("glu"),
            (Self::Apt, "build-essential") => Some("build-essential"),
            (Self::Brew, "build-essential") => None,
            (Self::Pacman, "build-essential") => Some("base-devel"),
            _ => None,
        }
    }

    /// Shell command probing whether a package is installed.
    pub fn query_command(&self, package: &str) -> String {
        match self {
            Self::Apt => format!("dpkg -s {} >/dev/null 2>&1", package),
            Self::Brew => format!("brew list {} >/dev/null 2>&1", package),
            Self::Pacman => format!("pacman -Q {} >/dev/null 2>&1", package),
        }
    }
}

/// Installs missing system packages.
pub struct SystemDepsStep {
    spec: StepSpec,
}

impl SystemDepsStep {
    pub fn new() -> Self {
        Self {
            spec: StepSpec::new("system-deps", "System dependencies", true, vec![]),
        }
    }

    /// Some dependencies are probed as commands rather than packages.
    fn probe_command(dep: &str) -> Option<&'static str> {
        match dep {
            "curl" => Some("curl"),
            "git" => Some("git"),
            "unzip" => Some("unzip"),
            "zip" => Some("zip"),
            "xz-utils" => Some("xz"),
            _ => None,
        }
    }

    /// Probe which package manager this host uses.
    pub async fn detect_manager(runner: &CommandRunner) -> Option<PackageManager> {
        for pm in PackageManager::ALL {
            if runner.command_exists(pm.command()).await {
                return Some(*pm);
            }
        }
        None
    }

    /// Whether a required dependency is already present on this host.
    pub async fn is_installed(runner: &CommandRunner, pm: PackageManager, dep: &str) -> bool {
        if let Some(command) = Self::probe_command(dep) {
            return runner.command_exists(command).await;
        }
        // libglu1-mesa and build-essential may be unnecessary on this
        // platform; an unmapped dependency counts as present.
        match pm.package_for(dep) {
            Some(package) => runner.run(&pm.query_command(package)).await.success(),
            None => true,
        }
    }

    async fn install(
        ctx: &StepContext,
        pm: PackageManager,
        packages: &[&str],
        report: &mut StepReport,
    ) -> Result<(), StepError> {
        let list = packages.join(" ");
        let timeout = ctx.runner.timeout_secs();

        match pm {
            PackageManager::Apt => {
                ctx.progress.log("updating apt package list").await;
                let update = ctx.runner.run("sudo apt-get update -y").await;
                if !update.success() {
                    return Err(update.to_step_error("apt-get update", timeout));
                }
                let command = format!("sudo apt-get install -y {}", list);
                let outcome = ctx.runner.run(&command).await;
                if !outcome.success() {
                    return Err(outcome.to_step_error(&command, timeout));
                }
            }
            PackageManager::Brew => {
                // Homebrew installs one package at a time; individual
                // failures degrade to warnings like casks often do.
                for package in packages {
                    ctx.progress.log(format!("brew install {}", package)).await;
                    let outcome = ctx.runner.run(&format!("brew install {}", package)).await;
                    if !outcome.success() {
                        report.add_warning(format!(
                            "could not install {} via Homebrew: {}",
                            package,
                            outcome.stderr_tail()
                        ));
                    }
                }
            }
            PackageManager::Pacman => {
                ctx.progress.log("refreshing pacman database").await;
                let sync = ctx.runner.run("sudo pacman -Sy").await;
                if !sync.success() {
                    return Err(sync.to_step_error("pacman -Sy", timeout));
                }
                let command = format!("sudo pacman -S --noconfirm {}", list);
                let outcome = ctx.runner.run(&command).await;
                if !outcome.success() {
                    return Err(outcome.to_step_error(&command, timeout));
                }
            }
        }
        Ok(())
    }
}

impl Default for SystemDepsStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for SystemDepsStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let pm = Self::detect_manager(&ctx.runner).await.ok_or_else(|| {
            anyhow::anyhow!("no supported package manager found (need apt, brew or pacman)")
        })?;
        ctx.progress
            .log(format!("using package manager: {}", pm.command()))
            .await;

        let mut missing = Vec::new();
        for dep in REQUIRED_DEPENDENCIES {
            if !Self::is_installed(&ctx.runner, pm, dep).await {
                missing.push(*dep);
            }
        }

        if missing.is_empty() {
            ctx.progress.log("all system dependencies present").await;
            return Ok(StepReport::ok());
        }

        let packages: Vec<&str> = missing
            .iter()
            .filter_map(|dep| pm.package_for(dep))
            .collect();

        if packages.is_empty() {
            ctx.progress
                .log("missing dependencies are not needed on this platform")
                .await;
            return Ok(StepReport::ok());
        }

        ctx.progress
            .log(format!("installing: {}", packages.join(", ")))
            .await;

        let mut report = StepReport::ok();
        Self::install(ctx, pm, &packages, &mut report).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_shape() {
        let step = SystemDepsStep::new();
        assert_eq!(step.spec().id, "system-deps");
        assert!(step.spec().critical);
        assert!(step.spec().depends_on.is_empty());
    }

    #[test]
    fn test_package_mapping_apt() {
        let pm = PackageManager::Apt;
        assert_eq!(pm.package_for("xz-utils"), Some("xz-utils"));
        assert_eq!(pm.package_for("libglu1-mesa"), Some("libglu1-mesa"));
        assert_eq!(pm.package_for("build-essential"), Some("build-essential"));
    }

    #[test]
    fn test_package_mapping_brew_drops_linux_only_deps() {
        let pm = PackageManager::Brew;
        assert_eq!(pm.package_for("xz-utils"), Some("xz"));
        assert_eq!(pm.package_for("libglu1-mesa"), None);
        assert_eq!(pm.package_for("build-essential"), None);
    }

    #[test]
    fn test_package_mapping_pacman() {
        let pm = PackageManager::Pacman;
        assert_eq!(pm.package_for("xz-utils"), Some("xz"));
        assert_eq!(pm.package_for("libglu1-mesa"), Some("glu"));
        assert_eq!(pm.package_for("build-essential"), Some("base-devel"));
    }

    #[test]
    fn test_query_commands() {
        assert!(PackageManager::Apt.query_command("zip").starts_with("dpkg -s zip"));
        assert!(PackageManager::Brew.query_command("zip").starts_with("brew list zip"));
        assert!(PackageManager::Pacman.query_command("zip").starts_with("pacman -Q zip"));
    }

    #[test]
    fn test_command_probes() {
        assert_eq!(SystemDepsStep::probe_command("curl"), Some("curl"));
        assert_eq!(SystemDepsStep::probe_command("xz-utils"), Some("xz"));
        assert_eq!(SystemDepsStep::probe_command("build-essential"), None);
    }
}
