//! Layered configuration for the environment setup tool.
//!
//! Settings are merged from four layers, later layers winning:
//! 1. Built-in defaults
//! 2. `komodo.toml` in the project directory (optional)
//! 3. Environment variables (`KOMODO_*` plus the legacy unprefixed names)
//! 4. CLI flags
//!
//! The merged [`EnvironmentConfig`] is validated once at startup and then
//! shared read-only (`Arc`) with every step.
//!
//! # Configuration File Format
//!
//! ```toml
//! flutter_version = "3.32.0"
//! platforms = ["web", "android"]
//! install_android_sdk = true
//! android_api_level = "34"
//! android_build_tools_version = "34.0.0"
//! fetch_all_remote_branches = true
//! fetch_agents_docs = true
//! max_parallel_jobs = 4
//! command_timeout_secs = 300
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables read in layer 3, in (`KOMODO_*`, legacy) pairs.
const ENV_VARS: &[(&str, &str)] = &[
    ("KOMODO_FLUTTER_VERSION", "FLUTTER_VERSION"),
    ("KOMODO_PLATFORMS", "PLATFORMS"),
    ("KOMODO_INSTALL_ANDROID_SDK", "INSTALL_ANDROID_SDK"),
    ("KOMODO_FETCH_ALL_REMOTE_BRANCHES", "FETCH_ALL_REMOTE_BRANCHES"),
    ("KOMODO_FETCH_AGENTS_DOCS", "SHOULD_FETCH_AGENTS_DOCS"),
    ("KOMODO_MAX_PARALLEL_JOBS", "MAX_PARALLEL_JOBS"),
];

/// Complete configuration for a setup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Flutter version to install via FVM.
    #[serde(default = "default_flutter_version")]
    pub flutter_version: String,

    /// Target platforms for project builds.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,

    /// Whether the Android SDK step is part of the run.
    #[serde(default = "default_true")]
    pub install_android_sdk: bool,

    /// Android platform API level passed to sdkmanager.
    #[serde(default = "default_android_api_level")]
    pub android_api_level: String,

    /// Android build-tools version passed to sdkmanager.
    #[serde(default = "default_android_build_tools_version")]
    pub android_build_tools_version: String,

    /// Whether the git housekeeping step is part of the run.
    #[serde(default = "default_true")]
    pub fetch_all_remote_branches: bool,

    /// Whether the docs fetch step is part of the run.
    #[serde(default = "default_true")]
    pub fetch_agents_docs: bool,

    /// Upper bound on steps running in one frontier.
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,

    /// Per-command timeout in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Base URL for fetched project docs.
    #[serde(default = "default_gist_base_url")]
    pub gist_base_url: String,

    /// Project directory the run operates on. Not part of the config
    /// file; always derived from the invocation.
    #[serde(default = "default_project_dir", skip_serializing)]
    pub project_dir: PathBuf,

    /// Home directory, overridable for tests.
    #[serde(default = "default_home_dir", skip_serializing)]
    pub home_dir: PathBuf,

    /// Android SDK root. Defaults to `~/Android/Sdk`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_home: Option<PathBuf>,

    /// FVM directory. Defaults to `~/.fvm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fvm_dir: Option<PathBuf>,
}

fn default_flutter_version() -> String {
    "3.32.0".to_string()
}

fn default_platforms() -> Vec<String> {
    vec!["web".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_android_api_level() -> String {
    "34".to_string()
}

fn default_android_build_tools_version() -> String {
    "34.0.0".to_string()
}

fn default_max_parallel_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}

fn default_command_timeout_secs() -> u64 {
    crate::runner::DEFAULT_TIMEOUT_SECS
}

fn default_gist_base_url() -> String {
    "https://gist.githubusercontent.com/CharlVS/14233fff7e9b3d66a7268d578cc34b36/raw".to_string()
}

fn default_project_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            flutter_version: default_flutter_version(),
            platforms: default_platforms(),
            install_android_sdk: true,
            android_api_level: default_android_api_level(),
            android_build_tools_version: default_android_build_tools_version(),
            fetch_all_remote_branches: true,
            fetch_agents_docs: true,
            max_parallel_jobs: default_max_parallel_jobs(),
            command_timeout_secs: default_command_timeout_secs(),
            gist_base_url: default_gist_base_url(),
            project_dir: default_project_dir(),
            home_dir: default_home_dir(),
            android_home: None,
            fvm_dir: None,
        }
    }
}

impl EnvironmentConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse komodo.toml")
    }

    /// Load from `komodo.toml` in the project directory, falling back to
    /// defaults when the file does not exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join("komodo.toml");
        let mut config = if config_path.exists() {
            Self::load(&config_path)?
        } else {
            Self::default()
        };
        config.project_dir = project_dir.to_path_buf();
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize komodo.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply the environment variable layer.
    ///
    /// For each setting the `KOMODO_*` name wins over the legacy name the
    /// original shell tooling used.
    pub fn apply_environment(&mut self) {
        for (primary, legacy) in ENV_VARS {
            let Ok(value) = std::env::var(primary).or_else(|_| std::env::var(legacy)) else {
                continue;
            };
            match *primary {
                "KOMODO_FLUTTER_VERSION" => self.flutter_version = value,
                "KOMODO_PLATFORMS" => {
                    self.platforms = value
                        .split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect();
                }
                "KOMODO_INSTALL_ANDROID_SDK" => {
                    self.install_android_sdk = parse_bool(&value, self.install_android_sdk);
                }
                "KOMODO_FETCH_ALL_REMOTE_BRANCHES" => {
                    self.fetch_all_remote_branches =
                        parse_bool(&value, self.fetch_all_remote_branches);
                }
                "KOMODO_FETCH_AGENTS_DOCS" => {
                    self.fetch_agents_docs = parse_bool(&value, self.fetch_agents_docs);
                }
                "KOMODO_MAX_PARALLEL_JOBS" => {
                    if let Ok(jobs) = value.parse::<usize>() {
                        self.max_parallel_jobs = jobs;
                    }
                }
                _ => {}
            }
        }
    }

    /// Validate the merged configuration. Returns warnings for suspicious
    /// but workable settings; hard errors fail the run before any step.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if self.flutter_version.is_empty() {
            anyhow::bail!("flutter_version must not be empty");
        }
        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be at least 1");
        }
        if self.command_timeout_secs == 0 {
            anyhow::bail!("command_timeout_secs must be at least 1");
        }
        if !self.project_dir.exists() {
            anyhow::bail!(
                "project directory does not exist: {}",
                self.project_dir.display()
            );
        }

        if self.android_api_level.parse::<u32>().is_err() {
            warnings.push(format!(
                "android_api_level '{}' is not numeric; sdkmanager may reject it",
                self.android_api_level
            ));
        }
        for platform in &self.platforms {
            if !matches!(
                platform.as_str(),
                "web" | "android" | "apk" | "linux" | "macos" | "ios" | "windows"
            ) {
                warnings.push(format!("unknown platform '{}'", platform));
            }
        }

        Ok(warnings)
    }

    /// Android SDK root directory.
    pub fn android_home(&self) -> PathBuf {
        self.android_home
            .clone()
            .unwrap_or_else(|| self.home_dir.join("Android").join("Sdk"))
    }

    /// FVM directory.
    pub fn fvm_dir(&self) -> PathBuf {
        self.fvm_dir
            .clone()
            .unwrap_or_else(|| self.home_dir.join(".fvm"))
    }

    /// Bin directory of the FVM default Flutter SDK.
    pub fn flutter_bin_dir(&self) -> PathBuf {
        self.fvm_dir().join("default").join("bin")
    }

    /// Dart pub cache bin directory.
    pub fn pub_cache_bin_dir(&self) -> PathBuf {
        self.home_dir.join(".pub-cache").join("bin")
    }

    /// URL of the AGENTS.md document.
    pub fn agents_doc_url(&self) -> String {
        format!("{}/AGENTS.md", self.gist_base_url)
    }

    /// Shell profile file derived from `$SHELL`.
    pub fn shell_profile(&self) -> PathBuf {
        let shell = std::env::var("SHELL").unwrap_or_default();
        if shell.contains("zsh") {
            self.home_dir.join(".zshrc")
        } else if shell.contains("bash") {
            self.home_dir.join(".bashrc")
        } else {
            self.home_dir.join(".profile")
        }
    }
}

fn parse_bool(value: &str, fallback: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => fallback,
    }
}
