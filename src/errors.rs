//! Typed error hierarchy for the environment setup tool.
//!
//! Two top-level enums cover the two subsystems:
//! - `GraphError` — dependency graph construction failures
//! - `StepError` — per-step execution failures

use thiserror::Error;

/// Errors from dependency graph construction.
///
/// These are build-time errors: a graph that constructs successfully
/// cannot fail structurally at run time.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Duplicate step id: {id}")]
    DuplicateId { id: String },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Cycle detected in step dependencies. Involved steps: {steps:?}")]
    CycleDetected { steps: Vec<String> },
}

/// Errors from a single step execution.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },

    #[error("Command '{command}' failed with exit code {exit_code}: {detail}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        detail: String,
    },

    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("Dependency unsatisfied: blocked on {blocked_on:?}")]
    DependencyUnsatisfied { blocked_on: Vec<String> },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_duplicate_id_carries_id() {
        let err = GraphError::DuplicateId {
            id: "flutter".to_string(),
        };
        match &err {
            GraphError::DuplicateId { id } => assert_eq!(id, "flutter"),
            _ => panic!("Expected DuplicateId"),
        }
        assert!(err.to_string().contains("flutter"));
    }

    #[test]
    fn graph_error_unknown_dependency_names_both_ends() {
        let err = GraphError::UnknownDependency {
            step: "android".to_string(),
            dependency: "nonexistent".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("android"));
        assert!(msg.contains("nonexistent"));
    }

    #[test]
    fn step_error_command_failed_carries_exit_code() {
        let err = StepError::CommandFailed {
            command: "apt-get install".to_string(),
            exit_code: 100,
            detail: "unable to locate package".to_string(),
        };
        match &err {
            StepError::CommandFailed { exit_code, .. } => assert_eq!(*exit_code, 100),
            _ => panic!("Expected CommandFailed"),
        }
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn step_error_timeout_is_distinct_from_failure() {
        let timeout = StepError::Timeout {
            command: "curl".to_string(),
            seconds: 300,
        };
        assert!(matches!(timeout, StepError::Timeout { .. }));
        assert!(!matches!(timeout, StepError::CommandFailed { .. }));
    }

    #[test]
    fn step_error_dependency_unsatisfied_lists_blockers() {
        let err = StepError::DependencyUnsatisfied {
            blocked_on: vec!["system-deps".to_string()],
        };
        assert!(err.to_string().contains("system-deps"));
    }

    #[test]
    fn step_error_converts_from_anyhow() {
        let inner = anyhow::anyhow!("profile not writable");
        let err: StepError = inner.into();
        assert!(matches!(err, StepError::Other(_)));
        assert!(err.to_string().contains("profile not writable"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let graph_err = GraphError::DuplicateId { id: "x".into() };
        assert_std_error(&graph_err);
        let step_err = StepError::CommandNotFound {
            command: "fvm".into(),
        };
        assert_std_error(&step_err);
    }
}
