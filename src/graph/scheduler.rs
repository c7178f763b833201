//! Scheduler for computing runnable frontiers and tracking step states.
//!
//! The scheduler owns the per-step status vector and answers one question
//! for the orchestrator: which pending steps can start right now. A
//! dependency edge into a critical step is satisfied only by success; an
//! edge into a non-critical step is satisfied by any terminal state, so a
//! failed optional step never blocks the rest of the run.

use crate::errors::GraphError;
use crate::graph::builder::{GraphBuilder, StepGraph, StepIndex};
use crate::step::StepSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status of a step in the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step is waiting for its dependencies
    #[default]
    Pending,
    /// Step is currently running
    Running { started_at_ms: u64 },
    /// Step finished successfully
    Succeeded,
    /// Step ran and failed
    Failed { error: String },
    /// Step never ran because a dependency failed or was skipped
    Skipped { blocked_on: Vec<String> },
}

impl StepStatus {
    /// True once the step can never run again in this run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed { .. } | Self::Skipped { .. }
        )
    }

    /// True when the step finished successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// True while the step is executing.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Tracks step states over a validated graph and computes frontiers.
#[derive(Debug)]
pub struct Scheduler {
    graph: StepGraph,
    statuses: Vec<StepStatus>,
}

impl Scheduler {
    /// Build the graph from specs and start every step in `Pending`.
    pub fn new(specs: Vec<StepSpec>) -> Result<Self, GraphError> {
        let graph = GraphBuilder::new(specs).build()?;
        let statuses = vec![StepStatus::Pending; graph.len()];
        Ok(Self { graph, statuses })
    }

    /// The underlying validated graph.
    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// Current status of a step.
    pub fn status(&self, index: StepIndex) -> &StepStatus {
        &self.statuses[index]
    }

    /// Current status of a step looked up by id.
    pub fn status_of(&self, id: &str) -> Option<&StepStatus> {
        self.graph.index_of(id).map(|i| &self.statuses[i])
    }

    /// Whether the dependency edge from `dep` is satisfied.
    ///
    /// A critical dependency must have succeeded. A non-critical one only
    /// has to be terminal, whatever the outcome.
    fn dependency_satisfied(&self, dep: StepIndex) -> bool {
        let status = &self.statuses[dep];
        if status.is_success() {
            return true;
        }
        match self.graph.spec(dep) {
            Some(spec) if !spec.critical => status.is_terminal(),
            _ => false,
        }
    }

    /// All pending steps whose dependencies are satisfied.
    ///
    /// This is the maximal runnable set: the orchestrator starts every
    /// returned step concurrently, bounded only by its own semaphore.
    pub fn runnable_frontier(&self) -> Vec<StepIndex> {
        self.statuses
            .iter()
            .enumerate()
            .filter(|(_, status)| matches!(status, StepStatus::Pending))
            .filter(|(i, _)| {
                self.graph
                    .dependencies(*i)
                    .iter()
                    .all(|&dep| self.dependency_satisfied(dep))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Mark a step as running.
    pub fn mark_running(&mut self, index: StepIndex) {
        self.statuses[index] = StepStatus::Running {
            started_at_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        };
    }

    /// Mark a step as succeeded.
    pub fn mark_succeeded(&mut self, index: StepIndex) {
        self.statuses[index] = StepStatus::Succeeded;
    }

    /// Mark a step as failed and skip every step it doomed.
    pub fn mark_failed(&mut self, index: StepIndex, error: &str) {
        self.statuses[index] = StepStatus::Failed {
            error: error.to_string(),
        };
        self.drain_doomed();
    }

    /// Skip every pending step. Used when a critical failure aborts the run.
    pub fn drain_all_pending(&mut self) {
        for i in 0..self.statuses.len() {
            if matches!(self.statuses[i], StepStatus::Pending) {
                let blocked_on = self.unsatisfied_dependency_ids(i);
                self.statuses[i] = StepStatus::Skipped { blocked_on };
            }
        }
    }

    /// Skip pending steps that can never become runnable.
    ///
    /// A pending step is doomed when one of its critical dependencies is
    /// terminal without success. Skipping a doomed non-critical step makes
    /// its own edge satisfiable, which can doom or unblock steps further
    /// down, so the scan repeats until it finds nothing new.
    fn drain_doomed(&mut self) {
        loop {
            let doomed: Vec<StepIndex> = self
                .statuses
                .iter()
                .enumerate()
                .filter(|(_, status)| matches!(status, StepStatus::Pending))
                .filter(|(i, _)| {
                    self.graph.dependencies(*i).iter().any(|&dep| {
                        let terminal_not_ok =
                            self.statuses[dep].is_terminal() && !self.statuses[dep].is_success();
                        let critical = self.graph.spec(dep).map(|s| s.critical).unwrap_or(false);
                        terminal_not_ok && critical
                    })
                })
                .map(|(i, _)| i)
                .collect();

            if doomed.is_empty() {
                break;
            }

            for i in doomed {
                let blocked_on = self.unsatisfied_dependency_ids(i);
                self.statuses[i] = StepStatus::Skipped { blocked_on };
            }
        }
    }

    /// Ids of the dependencies currently holding a step back.
    fn unsatisfied_dependency_ids(&self, index: StepIndex) -> Vec<String> {
        self.graph
            .dependencies(index)
            .iter()
            .filter(|&&dep| !self.dependency_satisfied(dep))
            .filter_map(|&dep| self.graph.spec(dep).map(|s| s.id.clone()))
            .collect()
    }

    /// True once every step is terminal.
    pub fn all_terminal(&self) -> bool {
        self.statuses.iter().all(|s| s.is_terminal())
    }

    /// Number of steps that succeeded.
    pub fn succeeded_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_success()).count()
    }

    /// Static preview of execution order, assuming every step succeeds.
    ///
    /// Returns groups of step ids; each group can run in parallel once all
    /// previous groups finish. Used by the `deps` command to show the plan
    /// without running anything.
    pub fn compute_frontiers(&self) -> Vec<Vec<String>> {
        let mut frontiers = Vec::new();
        let mut done: HashSet<StepIndex> = HashSet::new();

        loop {
            let ready: Vec<StepIndex> = (0..self.graph.len())
                .filter(|i| !done.contains(i))
                .filter(|&i| {
                    self.graph
                        .dependencies(i)
                        .iter()
                        .all(|dep| done.contains(dep))
                })
                .collect();

            if ready.is_empty() {
                break;
            }

            let ids: Vec<String> = ready
                .iter()
                .filter_map(|&i| self.graph.spec(i).map(|s| s.id.clone()))
                .collect();
            done.extend(ready);
            frontiers.push(ids);
        }

        frontiers
    }
}
