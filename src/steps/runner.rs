use super::interrupt;
use super::{Step, StepAction, StepError, StepOutcome, StepScope};
use crate::environment::{
    missing_settings, render_missing_settings, secondary_credential_count, EnvironmentSpec,
    SettingsLookup,
};
use crate::privilege::{ExecutionIdentity, PrivilegeError};
use crate::shared::ids::{SettingName, StepName};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("missing required settings: {}", render_missing_settings(.names))]
    MissingSetting { names: Vec<SettingName> },
    #[error(transparent)]
    Identity(#[from] PrivilegeError),
    #[error("step {ordinal}/{total} ({description}) failed: {cause}")]
    StepFailed {
        ordinal: usize,
        total: usize,
        description: String,
        #[source]
        cause: StepError,
    },
    #[error("interrupted before the first step")]
    InterruptedBeforeStart,
    #[error("interrupted at step {ordinal}/{total} ({description})")]
    Interrupted {
        ordinal: usize,
        total: usize,
        description: String,
    },
}

impl RunError {
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Self::MissingSetting { .. } | Self::Identity(_) | Self::InterruptedBeforeStart => None,
            Self::StepFailed { ordinal, .. } | Self::Interrupted { ordinal, .. } => Some(*ordinal),
        }
    }
}

/// Cursor and completion flag shared with whoever reports on exit.
#[derive(Debug, Default)]
pub struct RunProgress {
    cursor: AtomicUsize,
    total: AtomicUsize,
    completed: AtomicBool,
}

impl RunProgress {
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// `None` once the last step finished.
    pub fn abort_report(&self, steps: &[Step]) -> Option<String> {
        if self.completed() {
            return None;
        }
        let cursor = self.cursor();
        if cursor == 0 {
            return Some("aborted before the first step".to_string());
        }
        let description = steps
            .get(cursor - 1)
            .map(|step| step.description.as_str())
            .unwrap_or("unknown step");
        Some(format!(
            "aborted at step {cursor}/{} ({description})",
            self.total()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub ordinal: usize,
    pub name: StepName,
    pub description: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: Vec<StepReport>,
}

impl RunSummary {
    pub fn changed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|report| report.outcome == StepOutcome::Changed)
            .count()
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.steps.len() + 1);
        for report in &self.steps {
            let mut line = format!(
                "[{}/{}] {:<16} {}",
                report.ordinal,
                self.steps.len(),
                report.name.as_str(),
                report.outcome.as_str()
            );
            if let StepOutcome::Skipped(reason) = &report.outcome {
                line.push_str(&format!(" ({reason})"));
            }
            lines.push(line);
        }
        lines.push(format!(
            "provisioning complete: {} step(s) changed",
            self.changed_count()
        ));
        lines.join("\n")
    }
}

pub struct StepRunner {
    steps: Vec<Step>,
    progress: Arc<RunProgress>,
    interrupt: Box<dyn Fn() -> bool>,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRunner {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            progress: Arc::new(RunProgress::default()),
            interrupt: Box::new(interrupt::interrupt_pending),
        }
    }

    pub fn with_interrupt_check(mut self, check: impl Fn() -> bool + 'static) -> Self {
        self.interrupt = Box::new(check);
        self
    }

    /// Appends a step; its ordinal is its 1-based registration position.
    pub fn register(
        &mut self,
        name: StepName,
        description: impl Into<String>,
        scope: StepScope,
        action: impl Fn(&ExecutionIdentity) -> Result<StepOutcome, StepError> + 'static,
    ) -> usize {
        let ordinal = self.steps.len() + 1;
        let action: StepAction = Box::new(action);
        self.steps
            .push(Step::new(ordinal, name, description.into(), scope, action));
        self.progress.total.store(self.steps.len(), Ordering::SeqCst);
        ordinal
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn progress(&self) -> Arc<RunProgress> {
        Arc::clone(&self.progress)
    }

    pub fn abort_report(&self) -> Option<String> {
        self.progress.abort_report(&self.steps)
    }

    pub fn run(
        &self,
        spec: &EnvironmentSpec,
        lookup: &dyn SettingsLookup,
        identity: &ExecutionIdentity,
    ) -> Result<RunSummary, RunError> {
        self.run_with(spec, lookup, || Ok(identity.clone()))
    }

    /// Validates settings, then resolves the identity, then runs every step.
    /// Nothing is mutated unless both checks pass.
    pub fn run_with(
        &self,
        spec: &EnvironmentSpec,
        lookup: &dyn SettingsLookup,
        resolve_identity: impl FnOnce() -> Result<ExecutionIdentity, PrivilegeError>,
    ) -> Result<RunSummary, RunError> {
        self.progress.completed.store(false, Ordering::SeqCst);
        self.progress.cursor.store(0, Ordering::SeqCst);

        let missing = missing_settings(spec, lookup);
        if !missing.is_empty() {
            return Err(RunError::MissingSetting { names: missing });
        }
        if let Some(name) = &spec.secondary_credentials {
            tracing::info!(
                setting = %name,
                count = secondary_credential_count(spec, lookup),
                "secondary credentials found"
            );
        }
        let identity = resolve_identity()?;
        let identity = &identity;

        let total = self.steps.len();
        let mut summary = RunSummary::default();
        let mut previous: Option<&Step> = None;
        for step in &self.steps {
            if (self.interrupt)() {
                return Err(match previous {
                    Some(done) => self.interrupted(done),
                    None => {
                        tracing::warn!("interrupted before the first step");
                        RunError::InterruptedBeforeStart
                    }
                });
            }
            self.progress.cursor.store(step.ordinal, Ordering::SeqCst);

            let outcome = if step.scope == StepScope::System && !identity.is_privileged {
                tracing::info!(
                    ordinal = step.ordinal,
                    step = %step.name,
                    "skipping system step; not running with elevated privileges"
                );
                StepOutcome::Skipped("requires elevated privileges".to_string())
            } else {
                tracing::info!(
                    ordinal = step.ordinal,
                    total,
                    step = %step.name,
                    "{}",
                    step.description
                );
                match self.attempt(step, identity) {
                    Ok(outcome) => outcome,
                    Err(cause) => {
                        if (self.interrupt)() {
                            return Err(self.interrupted(step));
                        }
                        tracing::error!(ordinal = step.ordinal, step = %step.name, error = %cause, "step failed");
                        return Err(RunError::StepFailed {
                            ordinal: step.ordinal,
                            total,
                            description: step.description.clone(),
                            cause,
                        });
                    }
                }
            };

            if (self.interrupt)() {
                return Err(self.interrupted(step));
            }
            tracing::info!(ordinal = step.ordinal, step = %step.name, outcome = outcome.as_str(), "step finished");
            summary.steps.push(StepReport {
                ordinal: step.ordinal,
                name: step.name.clone(),
                description: step.description.clone(),
                outcome,
            });
            previous = Some(step);
        }

        self.progress.completed.store(true, Ordering::SeqCst);
        Ok(summary)
    }

    fn attempt(&self, step: &Step, identity: &ExecutionIdentity) -> Result<StepOutcome, StepError> {
        catch_unwind(AssertUnwindSafe(|| step.execute(identity)))
            .unwrap_or_else(|payload| Err(StepError::Panicked(panic_message(payload.as_ref()))))
    }

    fn interrupted(&self, step: &Step) -> RunError {
        tracing::warn!(ordinal = step.ordinal, step = %step.name, "interrupted");
        RunError::Interrupted {
            ordinal: step.ordinal,
            total: self.steps.len(),
            description: step.description.clone(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}
