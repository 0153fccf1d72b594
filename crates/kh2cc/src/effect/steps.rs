//! Ordered record of the memory operations a hook performed.
//!
//! Hooks keep going after a failed read or write so that as much of the
//! effect as possible is applied (or reverted), and report one aggregate
//! boolean. Each step's outcome is retained so the failing ones can be
//! logged by name.

use std::borrow::Cow;

use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct StepResult {
    pub label: Cow<'static, str>,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Steps {
    effect_id: String,
    phase: &'static str,
    results: Vec<StepResult>,
}

impl Steps {
    pub fn new(effect_id: impl Into<String>, phase: &'static str) -> Self {
        Self {
            effect_id: effect_id.into(),
            phase,
            results: Vec::new(),
        }
    }

    /// Record a write (or any unit-returning operation)
    pub fn check(&mut self, label: impl Into<Cow<'static, str>>, result: Result<()>) -> bool {
        self.read(label, result).is_some()
    }

    /// Record a read and hand back its value on success
    pub fn read<T>(&mut self, label: impl Into<Cow<'static, str>>, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.push(label.into(), true, None);
                Some(value)
            }
            Err(e) => {
                self.push(label.into(), false, Some(e.to_string()));
                None
            }
        }
    }

    /// Record a precondition that is not a memory access
    pub fn require(&mut self, label: impl Into<Cow<'static, str>>, ok: bool) -> bool {
        self.push(label.into(), ok, None);
        ok
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| !r.ok)
    }

    pub fn succeeded(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    /// Log the failed steps and return the aggregate result
    pub fn finish(self) -> bool {
        for failure in self.failures() {
            debug!(
                "{} {}: step '{}' failed{}",
                self.effect_id,
                self.phase,
                failure.label,
                failure
                    .error
                    .as_deref()
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            );
        }
        self.succeeded()
    }

    fn push(&mut self, label: Cow<'static, str>, ok: bool, error: Option<String>) {
        self.results.push(StepResult { label, ok, error });
    }
}
