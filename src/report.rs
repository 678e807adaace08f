//! Run report and its rendering into log entries.
//!
//! The orchestrator never logs while it works. It records outcomes here and
//! the report is rendered to the log once the run is over.

use chrono::{DateTime, Duration, Utc};
use log::Level;

use crate::environment::EnvironmentKind;
use crate::steps::{ConfigStep, StepEffect};

/// Prefix on every line the orchestrator writes to the log.
pub const LOG_PREFIX: &str = "PostClone: ";

/// How a single step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Applied(StepEffect),
    Failed(String),
}

/// A step together with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: ConfigStep,
    pub result: StepResult,
}

impl StepOutcome {
    /// True when the step failed or any of its records failed to persist.
    pub fn has_failures(&self) -> bool {
        match &self.result {
            StepResult::Failed(_) => true,
            StepResult::Applied(StepEffect::Records(report)) => !report.is_clean(),
            StepResult::Applied(_) => false,
        }
    }
}

/// What the dispatcher decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A dev or QA pipeline ran.
    Applied,
    /// Production instance; nothing touched.
    RefusedProduction,
    /// Instance name not configured; nothing touched.
    Unrecognized,
}

/// One rendered log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Everything one orchestrator run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub instance: String,
    pub environment: EnvironmentKind,
    pub disposition: Disposition,
    pub steps: Vec<StepOutcome>,
    /// Error reading the instance name, if any.
    pub identity_error: Option<String>,
    /// Set when the pipeline itself stopped early.
    pub aborted: Option<String>,
    /// Whether debug entries are rendered.
    pub debug: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Wall-clock time the run took.
    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }

    /// Number of steps that ended without any failure.
    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| !s.has_failures()).count()
    }

    /// Number of steps with a failure.
    pub fn failed(&self) -> usize {
        self.steps.len() - self.succeeded()
    }

    /// Total records persisted across all steps.
    pub fn records_updated(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match &s.result {
                StepResult::Applied(StepEffect::Records(report)) => report.updated,
                _ => 0,
            })
            .sum()
    }

    /// Render the report into log entries, in order.
    pub fn entries(&self) -> Vec<LogEntry> {
        let mut entries = Vec::new();

        if let Some(err) = &self.identity_error {
            entries.push(LogEntry::new(Level::Error, format!("Error reading instance name: {}", err)));
        }

        match self.disposition {
            Disposition::RefusedProduction => {
                entries.push(LogEntry::new(
                    Level::Error,
                    format!(
                        "WARNING: refusing to run on production instance '{}'; nothing was changed",
                        self.instance
                    ),
                ));
                return entries;
            }
            Disposition::Unrecognized => {
                entries.push(LogEntry::new(
                    Level::Warn,
                    format!("The following instance is not known: '{}'", self.instance),
                ));
                return entries;
            }
            Disposition::Applied => {}
        }

        entries.push(LogEntry::new(
            Level::Info,
            format!("Applying {} configuration to '{}'", self.environment, self.instance),
        ));

        for outcome in &self.steps {
            self.render_step(outcome, &mut entries);
        }

        if let Some(reason) = &self.aborted {
            entries.push(LogEntry::new(
                Level::Error,
                format!("Error applying {} config: {}", self.environment, reason),
            ));
        }

        entries.push(LogEntry::new(
            Level::Info,
            format!(
                "Finished: {} of {} steps clean, {} with failures, {} records updated in {}ms",
                self.succeeded(),
                self.steps.len(),
                self.failed(),
                self.records_updated(),
                self.duration().num_milliseconds()
            ),
        ));

        entries
    }

    fn render_step(&self, outcome: &StepOutcome, entries: &mut Vec<LogEntry>) {
        let step = &outcome.step;
        match &outcome.result {
            StepResult::Failed(err) => {
                entries.push(LogEntry::new(Level::Error, format!("Error in {}: {}", step, err)));
            }
            StepResult::Applied(StepEffect::PropertiesSet(keys)) => {
                entries.push(LogEntry::new(Level::Info, format!("{}: done", step)));
                if self.debug {
                    entries.push(LogEntry::new(Level::Debug, format!("{}: set {}", step, keys.join(", "))));
                }
            }
            StepResult::Applied(StepEffect::Skipped(reason)) => {
                entries.push(LogEntry::new(Level::Info, format!("{}: skipped, {}", step, reason)));
            }
            StepResult::Applied(StepEffect::Records(report)) => {
                entries.push(LogEntry::new(
                    Level::Info,
                    format!("{}: {} of {} records updated", step, report.updated, report.matched),
                ));
                for failure in &report.failures {
                    entries.push(LogEntry::new(
                        Level::Error,
                        format!("Error in {}: record {}: {}", step, failure.record_id, failure.error),
                    ));
                }
            }
        }
    }

    /// Write the rendered entries through the `log` facade.
    pub fn emit(&self) {
        for entry in self.entries() {
            log::log!(entry.level, "{}{}", LOG_PREFIX, entry.message);
        }
    }
}
