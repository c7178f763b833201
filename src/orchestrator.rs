//! Parallel step execution over the dependency graph.
//!
//! The orchestrator runs steps frontier by frontier: every runnable step is
//! started concurrently, bounded by a semaphore sized to
//! `max_parallel_jobs`, and the next frontier is computed only after the
//! whole batch has terminated. A critical failure aborts the run at that
//! barrier; non-critical failures degrade the verdict and let the rest of
//! the graph continue.

use crate::config::EnvironmentConfig;
use crate::graph::{ExecutionTimer, RunRecord, Scheduler, StepResult, StepStatus, Verdict};
use crate::runner::CommandRunner;
use crate::step::{Step, StepContext, StepProgress};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{info, warn};

/// Events emitted while a run is in flight.
///
/// The progress UI consumes these over a channel; the JSON UI mode prints
/// them verbatim, so the wire shape is stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// A step has started executing.
    Started { step: String, title: String },
    /// A diagnostic line from a running step.
    Log { step: String, line: String },
    /// A step reached a terminal state.
    Finished {
        step: String,
        result: Box<StepResult>,
    },
    /// The whole run is over.
    RunFinished { verdict: Verdict },
}

/// Runs a set of steps respecting their dependency graph.
pub struct Orchestrator {
    config: Arc<EnvironmentConfig>,
    steps: Vec<Arc<dyn Step>>,
    runner: CommandRunner,
    event_tx: Option<mpsc::Sender<StepEvent>>,
    fail_fast: bool,
}

impl Orchestrator {
    /// Create an orchestrator for the given steps.
    ///
    /// The command runner is rooted at the configured project directory
    /// with the configured per-command timeout.
    pub fn new(config: Arc<EnvironmentConfig>, steps: Vec<Arc<dyn Step>>) -> Self {
        let runner = CommandRunner::new(&config.project_dir)
            .with_timeout(Duration::from_secs(config.command_timeout_secs));
        Self {
            config,
            steps,
            runner,
            event_tx: None,
            fail_fast: false,
        }
    }

    /// Abort on any step failure, critical or not.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Replace the command runner. Tests use this to redirect commands.
    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<StepEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Execute all steps and return the run record.
    ///
    /// Returns `Err` only for structural problems (an invalid graph).
    /// Step failures are data: they land in the record's results and
    /// verdict, never in the `Result`.
    pub async fn run(&self) -> Result<RunRecord> {
        let timer = ExecutionTimer::start();
        let started_at = Utc::now();

        let specs = self.steps.iter().map(|s| s.spec().clone()).collect();
        let mut scheduler = Scheduler::new(specs).context("Failed to build step graph")?;

        let step_count = scheduler.graph().len();
        let mut results: Vec<Option<StepResult>> = vec![None; step_count];

        if step_count == 0 {
            return Ok(RunRecord {
                started_at,
                duration: timer.elapsed(),
                results: Vec::new(),
                verdict: Verdict::Success,
            });
        }

        info!(
            steps = step_count,
            max_parallel = self.config.max_parallel_jobs,
            "starting setup run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_jobs.max(1)));
        let mut aborted_by: Option<String> = None;

        loop {
            let frontier = scheduler.runnable_frontier();
            if frontier.is_empty() {
                break;
            }

            let mut handles = Vec::with_capacity(frontier.len());
            for index in frontier {
                scheduler.mark_running(index);
                let step = Arc::clone(&self.steps[index]);
                let spec = step.spec().clone();

                self.emit_event(StepEvent::Started {
                    step: spec.id.clone(),
                    title: spec.title.clone(),
                })
                .await;

                let permit = semaphore.clone().acquire_owned().await?;
                let ctx = StepContext {
                    config: Arc::clone(&self.config),
                    runner: self.runner.clone(),
                    progress: match &self.event_tx {
                        Some(tx) => StepProgress::new(spec.id.clone(), tx.clone()),
                        None => StepProgress::disabled(spec.id.clone()),
                    },
                };

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let step_timer = ExecutionTimer::start();
                    let outcome = step.execute(&ctx).await;
                    (index, spec, outcome, step_timer.elapsed())
                }));
            }

            // Barrier: the whole batch terminates before the next frontier
            // is computed, so abort decisions see a consistent graph.
            for handle in futures::future::join_all(handles).await {
                let (index, spec, outcome, duration) =
                    handle.context("Step task panicked")?;

                let result = match outcome {
                    Ok(report) => {
                        scheduler.mark_succeeded(index);
                        for warning in &report.warnings {
                            warn!(step = %spec.id, "{}", warning);
                        }
                        StepResult::succeeded(&spec.id, &spec.title, report.warnings, duration)
                    }
                    Err(err) => {
                        let message = err.to_string();
                        warn!(step = %spec.id, error = %message, "step failed");
                        scheduler.mark_failed(index, &message);
                        if (spec.critical || self.fail_fast) && aborted_by.is_none() {
                            aborted_by = Some(spec.id.clone());
                        }
                        StepResult::failed(&spec.id, &spec.title, &message, duration)
                    }
                };

                self.emit_event(StepEvent::Finished {
                    step: spec.id.clone(),
                    result: Box::new(result.clone()),
                })
                .await;

                results[index] = Some(result);
            }

            if let Some(ref step) = aborted_by {
                info!(failed_step = %step, "critical step failed, aborting run");
                scheduler.drain_all_pending();
                break;
            }
        }

        // Anything the scheduler skipped never produced a result; record
        // it from the final status.
        for index in 0..step_count {
            if results[index].is_some() {
                continue;
            }
            let spec = match scheduler.graph().spec(index) {
                Some(spec) => spec,
                None => continue,
            };
            let result = match scheduler.status(index) {
                StepStatus::Skipped { blocked_on } => {
                    StepResult::skipped(&spec.id, &spec.title, blocked_on)
                }
                other => StepResult::failed(
                    &spec.id,
                    &spec.title,
                    &format!("step never terminated (status {:?})", other),
                    Duration::ZERO,
                ),
            };
            self.emit_event(StepEvent::Finished {
                step: spec.id.clone(),
                result: Box::new(result.clone()),
            })
            .await;
            results[index] = Some(result);
        }

        let results: Vec<StepResult> = results.into_iter().flatten().collect();

        let verdict = match aborted_by {
            Some(step) => Verdict::Failed { step },
            None => {
                let failed: Vec<String> = results
                    .iter()
                    .filter(|r| r.state == crate::graph::StepState::Failed)
                    .map(|r| r.id.clone())
                    .collect();
                if failed.is_empty() {
                    Verdict::Success
                } else {
                    Verdict::PartialSuccess { failed }
                }
            }
        };

        self.emit_event(StepEvent::RunFinished {
            verdict: verdict.clone(),
        })
        .await;

        Ok(RunRecord {
            started_at,
            duration: timer.elapsed(),
            results,
            verdict,
        })
    }

    async fn emit_event(&self, event: StepEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).await.ok();
        }
    }
}
