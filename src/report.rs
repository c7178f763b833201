//! Final run report rendering.
//!
//! Turns a [`RunRecord`] into the end-of-run summary: a styled text block
//! for the terminal, or JSON for machine consumption. Rendering returns
//! strings so the command layer decides where they go.

use crate::graph::{RunRecord, StepResult, StepState, Verdict};
use crate::ui::icons::{CHECK, CLOCK, CROSS, SKIP, SPARKLE};
use anyhow::{Context, Result};
use console::style;
use std::fmt::Write;
use std::time::Duration;

/// Renders run records for humans and machines.
pub struct ResultReporter {
    verbose: bool,
}

impl ResultReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Render the full terminal summary.
    pub fn render(&self, record: &RunRecord) -> String {
        let mut out = String::new();
        let rule = style("=".repeat(60)).cyan().to_string();

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", rule);
        match &record.verdict {
            Verdict::Success => {
                let _ = writeln!(
                    out,
                    "{} Setup {} {}",
                    SPARKLE,
                    style("COMPLETE").green().bold(),
                    SPARKLE
                );
            }
            Verdict::PartialSuccess { failed } => {
                let _ = writeln!(
                    out,
                    "{} Setup {} ({} optional: {})",
                    CHECK,
                    style("PARTIAL").yellow().bold(),
                    style("failed").yellow(),
                    failed.join(", ")
                );
            }
            Verdict::Failed { step } => {
                let _ = writeln!(
                    out,
                    "{} Setup {} (critical step: {})",
                    CROSS,
                    style("FAILED").red().bold(),
                    style(step).red()
                );
            }
        }
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out);

        for result in &record.results {
            self.render_step(&mut out, result);
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} Steps: {} succeeded, {}, {}",
            CLOCK,
            style(record.succeeded_count()).green().bold(),
            if record.failed_count() > 0 {
                style(format!("{} failed", record.failed_count()))
                    .red()
                    .to_string()
            } else {
                style("0 failed").dim().to_string()
            },
            if record.skipped_count() > 0 {
                style(format!("{} skipped", record.skipped_count()))
                    .yellow()
                    .to_string()
            } else {
                style("0 skipped").dim().to_string()
            }
        );
        let _ = writeln!(
            out,
            "   Duration: {}",
            style(format_duration(record.duration)).cyan()
        );

        match &record.verdict {
            Verdict::Success => {}
            Verdict::PartialSuccess { failed } => {
                let _ = writeln!(
                    out,
                    "\n   Retry the failed steps with: {}",
                    style(format!("kce setup --only {}", failed.join(","))).yellow()
                );
            }
            Verdict::Failed { step } => {
                let _ = writeln!(
                    out,
                    "\n   Fix the failure above, then re-run: {}",
                    style(format!("kce setup --only {}", step)).yellow()
                );
            }
        }

        out
    }

    fn render_step(&self, out: &mut String, result: &StepResult) {
        match result.state {
            StepState::Succeeded => {
                let _ = writeln!(
                    out,
                    "  {} {} ({})",
                    CHECK,
                    style(&result.title).green(),
                    format_duration(result.duration)
                );
                for warning in &result.warnings {
                    let _ = writeln!(out, "      {} {}", style("warning:").yellow(), warning);
                }
            }
            StepState::Failed => {
                let _ = writeln!(
                    out,
                    "  {} {}: {}",
                    CROSS,
                    style(&result.title).red(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            StepState::Skipped => {
                let _ = writeln!(
                    out,
                    "  {} {} ({})",
                    SKIP,
                    style(&result.title).dim(),
                    result.error.as_deref().unwrap_or("skipped")
                );
            }
        }

        if self.verbose && result.state == StepState::Succeeded && !result.warnings.is_empty() {
            let _ = writeln!(
                out,
                "      {} warnings recorded",
                style(result.warnings.len()).yellow()
            );
        }
    }

    /// Render the record as pretty JSON.
    pub fn render_json(&self, record: &RunRecord) -> Result<String> {
        serde_json::to_string_pretty(record).context("Failed to serialize run record")
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}
