//! Dependency graph construction and scheduling for setup steps.
//!
//! `builder` validates the step DAG at construction time, `scheduler`
//! tracks per-step state and computes runnable frontiers, and `state`
//! holds the immutable results a finished run leaves behind.

pub mod builder;
pub mod scheduler;
pub mod state;

pub use builder::{GraphBuilder, StepGraph, StepIndex};
pub use scheduler::{Scheduler, StepStatus};
pub use state::{ExecutionTimer, RunRecord, StepResult, StepState, Verdict};
