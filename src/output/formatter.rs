//! Output formatters for scenario results
//!
//! Renders per-scenario lines and the end-of-run summary, optionally with ANSI colors.

use crate::models::{ResultRecord, StepStatus};
use crate::utils::format_clock;

use super::aggregator::RunSummary;

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";
const CYAN: &str = "36";
const MAGENTA: &str = "35";

/// Terminal color for a step status
fn status_color(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => GREEN,
        StepStatus::Failed => RED,
        StepStatus::Undefined | StepStatus::Pending => YELLOW,
        StepStatus::Skipped => CYAN,
        StepStatus::Ambiguous | StepStatus::Unknown => MAGENTA,
    }
}

/// `1 step`, `2 steps`
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Result formatter
#[derive(Clone, Debug)]
pub struct ResultFormatter {
    colorize: bool,
}

impl ResultFormatter {
    pub fn new() -> Self {
        Self { colorize: true }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// One-line outcome of a scenario
    pub fn format_result(
        &self,
        record: &ResultRecord,
        passed: bool,
        failed_step: Option<&str>,
    ) -> String {
        let name = record
            .results
            .as_ref()
            .and_then(|r| r.scenario_name())
            .filter(|n| !n.is_empty())
            .unwrap_or(&record.scenario.name);

        let status = if passed {
            self.paint("✓ PASS", GREEN)
        } else {
            self.paint("✗ FAIL", RED)
        };

        let mut line = if name.is_empty() {
            format!("{} {} [{}ms]", status, record.scenario, record.duration_ms())
        } else {
            format!(
                "{} {} ({}) [{}ms]",
                status,
                name,
                record.scenario,
                record.duration_ms()
            )
        };

        if let Some(error) = &record.error {
            let first = error.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            line.push_str(&format!(" - {}", first.trim()));
        } else if let Some(step) = failed_step {
            line.push_str(&format!(" - failed at \"{step}\""));
        } else if !passed {
            line.push_str(&format!(" - exit code {}", record.exit_code));
        }

        line
    }

    /// `(1 failed, 2 passed)` breakdown, empty when nothing was counted
    fn format_breakdown(&self, parts: &[(usize, &str, &str)]) -> String {
        let parts: Vec<String> = parts
            .iter()
            .filter(|(count, _, _)| *count > 0)
            .map(|(count, label, color)| self.paint(&format!("{count} {label}"), color))
            .collect();

        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }

    /// End-of-run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        if !summary.failed_scenarios.is_empty() {
            output.push_str(&self.paint("Failed scenarios:", RED));
            output.push('\n');
            for scenario in &summary.failed_scenarios {
                output.push_str(&format!("  {scenario}\n"));
            }
            output.push('\n');
        }

        if !summary.undefined_steps.is_empty() {
            output.push_str(&self.paint("Undefined steps:", YELLOW));
            output.push('\n');
            for step in &summary.undefined_steps {
                output.push_str(&format!("  {step}\n"));
            }
            output.push('\n');
        }

        output.push_str(&pluralize(summary.scenarios, "scenario"));
        output.push_str(&self.format_breakdown(&[
            (summary.scenarios_failed, "failed", RED),
            (summary.scenarios_passed, "passed", GREEN),
        ]));
        output.push('\n');

        let step_parts: Vec<(usize, &str, &str)> = StepStatus::all()
            .into_iter()
            .map(|status| {
                let count = summary.step_statuses.get(&status).copied().unwrap_or(0);
                (count, status.name(), status_color(status))
            })
            .collect();
        output.push_str(&pluralize(summary.steps, "step"));
        output.push_str(&self.format_breakdown(&step_parts));
        output.push('\n');

        let speedup = summary
            .speedup
            .map(|factor| format!("{factor:.2}x"))
            .unwrap_or_else(|| "N/A".to_string());
        output.push_str(&format!(
            "Total duration: {} ({}ms if ran in series - {} speed increase via parallelization)",
            format_clock(summary.wall_clock),
            summary.serial_duration.as_millis(),
            speedup
        ));

        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new()
    }
}
