//! Live progress UI for setup runs.
//!
//! Consumes [`StepEvent`]s from the orchestrator and renders them in one
//! of three modes:
//! - `full`: spinners per running step plus an overall header bar
//! - `minimal`: single-line status updates
//! - `json`: one JSON event per line for machine consumption

use crate::graph::StepState;
use crate::orchestrator::StepEvent;
use crate::report::format_duration;
use crate::ui::icons::{CHECK, CROSS, RUNNING, SKIP};
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output mode for the setup UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Rich terminal UI with spinners
    #[default]
    Full,
    /// Single-line status updates
    Minimal,
    /// JSON-formatted events
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    /// Parse UI mode from string (convenience method).
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Setup run progress UI.
///
/// Events arrive from a single consumer task; the mutex over `step_bars`
/// only guards the map itself.
pub struct SetupUi {
    mode: UiMode,
    multi: MultiProgress,
    header_bar: ProgressBar,
    step_bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
    verbose: bool,
    term: Term,
}

impl SetupUi {
    /// Create a UI for a run of `total_steps` steps.
    pub fn new(total_steps: usize, mode: UiMode, verbose: bool) -> Self {
        let multi = MultiProgress::new();
        let term = Term::stdout();

        let header_style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let header_bar = multi.add(ProgressBar::new(total_steps as u64));
        header_bar.set_style(header_style);
        header_bar.set_prefix("setup");
        header_bar.set_message("Starting...");

        Self {
            mode,
            multi,
            header_bar,
            step_bars: Arc::new(Mutex::new(HashMap::new())),
            verbose,
            term,
        }
    }

    /// Handle a step event and update the display.
    pub fn handle_event(&self, event: &StepEvent) {
        match self.mode {
            UiMode::Json => self.handle_json(event),
            UiMode::Minimal => self.handle_minimal(event),
            UiMode::Full => self.handle_full(event),
        }
    }

    fn handle_json(&self, event: &StepEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    fn handle_minimal(&self, event: &StepEvent) {
        match event {
            StepEvent::Started { step, .. } => {
                let _ = writeln!(&self.term, "> {}", step);
            }
            StepEvent::Finished { step, result } => {
                let mark = match result.state {
                    StepState::Succeeded => "ok",
                    StepState::Failed => "FAIL",
                    StepState::Skipped => "skip",
                };
                let _ = writeln!(&self.term, "{} {}", mark, step);
            }
            StepEvent::RunFinished { verdict } => {
                let _ = writeln!(&self.term, "done: {:?}", verdict);
            }
            StepEvent::Log { .. } => {}
        }
    }

    fn handle_full(&self, event: &StepEvent) {
        match event {
            StepEvent::Started { step, title } => self.on_started(step, title),
            StepEvent::Log { step, line } => self.on_log(step, line),
            StepEvent::Finished { step, result } => {
                self.on_finished(step, &result.state, result.duration, result.error.as_deref())
            }
            StepEvent::RunFinished { .. } => {
                self.header_bar.finish_and_clear();
            }
        }
    }

    fn on_started(&self, step: &str, title: &str) {
        let spinner_style = ProgressStyle::default_spinner()
            .template("  {spinner:.green} {prefix:.bold} {msg}")
            .expect("progress bar template is a valid static string");

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix(format!("[{}]", step));
        bar.set_message(format!("{} {}", RUNNING, title));
        bar.enable_steady_tick(Duration::from_millis(100));

        self.step_bars
            .lock()
            .unwrap()
            .insert(step.to_string(), bar);

        if self.verbose {
            self.multi
                .println(format!(
                    "  {} {} starting",
                    style(">").cyan(),
                    style(step).yellow()
                ))
                .ok();
        }
    }

    fn on_log(&self, step: &str, line: &str) {
        let bars = self.step_bars.lock().unwrap();
        if let Some(bar) = bars.get(step) {
            bar.set_message(line.to_string());
        }
    }

    fn on_finished(
        &self,
        step: &str,
        state: &StepState,
        duration: Duration,
        error: Option<&str>,
    ) {
        if let Some(bar) = self.step_bars.lock().unwrap().remove(step) {
            match state {
                StepState::Succeeded => {
                    bar.finish_with_message(format!(
                        "{} Done ({})",
                        CHECK,
                        format_duration(duration)
                    ));
                }
                StepState::Failed => {
                    bar.finish_with_message(format!(
                        "{} Failed: {}",
                        CROSS,
                        error.unwrap_or("unknown error")
                    ));
                }
                StepState::Skipped => {
                    bar.finish_with_message(format!(
                        "{} Skipped: {}",
                        SKIP,
                        error.unwrap_or("dependency failed")
                    ));
                }
            }
        } else if *state == StepState::Skipped {
            // Skipped steps never started, so they have no bar
            self.multi
                .println(format!(
                    "  {} {} {}",
                    SKIP,
                    style(step).dim(),
                    style(error.unwrap_or("skipped")).dim()
                ))
                .ok();
        }

        self.header_bar.inc(1);
    }

    /// Print the execution plan before (or instead of) a run.
    ///
    /// Goes straight to stdout: no bars are running yet, and plan output
    /// must survive redirection.
    pub fn print_plan(&self, frontiers: &[Vec<String>]) {
        let total: usize = frontiers.iter().map(|f| f.len()).sum();
        let _ = writeln!(
            &self.term,
            "\n{} {} steps in {} stages",
            style("Plan:").bold(),
            style(total).yellow().bold(),
            style(frontiers.len()).yellow().bold()
        );

        for (i, frontier) in frontiers.iter().enumerate() {
            let parallel_indicator = if frontier.len() > 1 {
                format!(" {}", style("(parallel)").dim())
            } else {
                String::new()
            };
            let _ = writeln!(
                &self.term,
                "  Stage {}: [{}]{}",
                style(i + 1).cyan(),
                style(frontier.join(", ")).yellow(),
                parallel_indicator
            );
        }
        let _ = writeln!(&self.term);
    }
}
