//! Immutable results a finished run leaves behind.
//!
//! [`RunRecord`] is the durable artifact of one orchestrator run: one
//! [`StepResult`] per step plus the overall [`Verdict`]. The record is
//! persisted as JSON under the project directory so `kce status` can show
//! the last run without re-executing anything.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Relative path of the persisted run record.
pub const RUN_RECORD_PATH: &str = ".komodo/last_run.json";

/// Terminal outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of one step as recorded after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step id
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Terminal state the step ended in
    pub state: StepState,
    /// Error message when the step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Warnings from optional sub-actions that did not fail the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Wall-clock time the step took; zero for skipped steps
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl StepResult {
    /// Record a successful step.
    pub fn succeeded(id: &str, title: &str, warnings: Vec<String>, duration: Duration) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            state: StepState::Succeeded,
            error: None,
            warnings,
            duration,
        }
    }

    /// Record a failed step.
    pub fn failed(id: &str, title: &str, error: &str, duration: Duration) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            state: StepState::Failed,
            error: Some(error.to_string()),
            warnings: Vec::new(),
            duration,
        }
    }

    /// Record a step that never ran because of the named blockers.
    pub fn skipped(id: &str, title: &str, blocked_on: &[String]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            state: StepState::Skipped,
            error: Some(format!("blocked on {}", blocked_on.join(", "))),
            warnings: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Verdict {
    /// Every step succeeded
    Success,
    /// Only non-critical steps failed or were skipped
    PartialSuccess { failed: Vec<String> },
    /// A critical step failed and aborted the run
    Failed { step: String },
}

impl Verdict {
    /// Process exit code for this verdict.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::PartialSuccess { .. } => 0,
            Self::Failed { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The durable record of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Total wall-clock time of the run
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Per-step results in graph order
    pub results: Vec<StepResult>,
    /// Overall verdict
    pub verdict: Verdict,
}

impl RunRecord {
    /// Number of steps that succeeded.
    pub fn succeeded_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == StepState::Succeeded)
            .count()
    }

    /// Number of steps that failed.
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == StepState::Failed)
            .count()
    }

    /// Number of steps that were skipped.
    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == StepState::Skipped)
            .count()
    }

    /// Where the record lives for a given project directory.
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(RUN_RECORD_PATH)
    }

    /// Persist the record under the project directory.
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let path = Self::path_for(project_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run record")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load the last run record, if one exists.
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(project_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(record))
    }
}

/// Tracks execution timing.
pub struct ExecutionTimer {
    start: Instant,
}

impl ExecutionTimer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Serde helpers for Duration serialization as milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> RunRecord {
        RunRecord {
            started_at: Utc::now(),
            duration: Duration::from_secs(42),
            results: vec![
                StepResult::succeeded("system-deps", "System dependencies", vec![], Duration::from_secs(10)),
                StepResult::succeeded(
                    "flutter",
                    "Flutter SDK",
                    vec!["melos activation failed".to_string()],
                    Duration::from_secs(30),
                ),
                StepResult::failed("android", "Android SDK", "sdkmanager exited 1", Duration::from_secs(2)),
                StepResult::skipped("project-setup", "Project setup", &["flutter".to_string()]),
            ],
            verdict: Verdict::PartialSuccess {
                failed: vec!["android".to_string()],
            },
        }
    }

    #[test]
    fn test_result_counts() {
        let record = sample_record();
        assert_eq!(record.succeeded_count(), 2);
        assert_eq!(record.failed_count(), 1);
        assert_eq!(record.skipped_count(), 1);
    }

    #[test]
    fn test_verdict_exit_codes() {
        assert_eq!(Verdict::Success.exit_code(), 0);
        assert_eq!(
            Verdict::PartialSuccess {
                failed: vec!["android".to_string()]
            }
            .exit_code(),
            0
        );
        assert_eq!(
            Verdict::Failed {
                step: "system-deps".to_string()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_skipped_result_mentions_blockers() {
        let result = StepResult::skipped("x", "X", &["flutter".to_string(), "android".to_string()]);
        assert_eq!(result.state, StepState::Skipped);
        assert_eq!(result.error.as_deref(), Some("blocked on flutter, android"));
        assert_eq!(result.duration, Duration::ZERO);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let record = sample_record();
        record.save(dir.path()).unwrap();

        let loaded = RunRecord::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.results.len(), 4);
        assert_eq!(loaded.duration, Duration::from_secs(42));
        assert_eq!(
            loaded.verdict,
            Verdict::PartialSuccess {
                failed: vec!["android".to_string()]
            }
        );
    }

    #[test]
    fn test_load_missing_record_is_none() {
        let dir = tempdir().unwrap();
        assert!(RunRecord::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_duration_serialized_as_millis() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"duration\":42000"));
    }

    #[test]
    fn test_timer_elapsed_moves_forward() {
        let timer = ExecutionTimer::start();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }
}
