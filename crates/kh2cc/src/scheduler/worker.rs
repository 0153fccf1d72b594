//! Per-instance lifecycle, run on the instance's own thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::effect::{Baseline, EffectDefinition, EffectKind, HookContext, Variant};
use crate::signal::{CancelReason, CancelSignal};

use super::report::{InstanceId, InstanceOutcome, InstanceReport, InstanceState};
use super::Shared;

/// Consecutive not-ready re-polls in one refresh tick before it is logged
/// at warn
const DEFERRALS_BEFORE_WARN: u32 = 20;

/// An admitted effect instance; owned by exactly one worker thread
pub struct ActiveEffectInstance {
    pub id: InstanceId,
    pub definition: Arc<EffectDefinition>,
    pub variant: Variant,
    pub state: InstanceState,
    pub baseline: Baseline,
    pub started_at: Option<Instant>,
    pub last_refresh_at: Option<Instant>,
}

impl ActiveEffectInstance {
    pub fn new(id: InstanceId, definition: Arc<EffectDefinition>, variant: Variant) -> Self {
        Self {
            id,
            definition,
            variant,
            state: InstanceState::Pending,
            baseline: Baseline::new(),
            started_at: None,
            last_refresh_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Refresh,
    Stop,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Refresh => "refresh",
            Phase::Stop => "stop",
        }
    }
}

/// Result of polling for a successful start
enum StartPhase {
    Started,
    WindowClosed,
    Cancelled,
}

/// Result of a wait bounded by the instance's expiry
enum Wake {
    Elapsed,
    Expired,
    Cancelled,
}

/// Releases the instance's table entry and conflict holds when dropped,
/// including when the worker unwinds.
struct Release {
    shared: Arc<Shared>,
    id: InstanceId,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}

pub(super) struct Worker {
    shared: Arc<Shared>,
    instance: ActiveEffectInstance,
    signal: Arc<CancelSignal>,
    /// `None` polls until started or cancelled
    start_deadline: Option<Instant>,
    reports: Sender<InstanceReport>,
    start_attempts: u32,
    refreshes: u32,
    refresh_failures: u32,
    refresh_deferrals: u32,
    stop_result: Option<bool>,
}

impl Worker {
    pub(super) fn new(
        shared: Arc<Shared>,
        instance: ActiveEffectInstance,
        signal: Arc<CancelSignal>,
        start_deadline: Option<Instant>,
        reports: Sender<InstanceReport>,
    ) -> Self {
        Self {
            shared,
            instance,
            signal,
            start_deadline,
            reports,
            start_attempts: 0,
            refreshes: 0,
            refresh_failures: 0,
            refresh_deferrals: 0,
            stop_result: None,
        }
    }

    /// Drive the instance to `Stopped` and hand back its report.
    ///
    /// The report is sent to the ticket only after the holds are released,
    /// so a caller that saw it can immediately start a conflicting effect.
    pub(super) fn run(mut self) -> InstanceReport {
        let release = Release {
            shared: Arc::clone(&self.shared),
            id: self.instance.id,
        };

        debug!(
            "{} {} pending ({})",
            self.instance.definition.id(),
            self.instance.id,
            self.instance.definition.kind()
        );

        let outcome = match self.instance.definition.kind() {
            EffectKind::Instant => self.run_instant(),
            EffectKind::RepeatAction => self.run_repeat(),
            EffectKind::StartTimed => self.run_timed(),
        };
        self.set_state(InstanceState::Stopped);

        let report = self.report(outcome);
        drop(release);

        match outcome {
            InstanceOutcome::Completed | InstanceOutcome::Cancelled(_) => info!(
                "{} {} stopped ({:?}, stop {})",
                report.effect_id,
                report.instance,
                outcome,
                if report.stop_result == Some(false) { "failed" } else { "ok" }
            ),
            InstanceOutcome::TimedOut => warn!(
                "{} {} timed out waiting for the game to be ready",
                report.effect_id, report.instance
            ),
            InstanceOutcome::StartFailed => warn!(
                "{} {} could not be started after {} attempts",
                report.effect_id, report.instance, report.start_attempts
            ),
        }

        self.shared.notify_finished(&report);
        // The ticket may have been dropped
        let _ = self.reports.send(report.clone());
        report
    }

    fn run_instant(&mut self) -> InstanceOutcome {
        let poll = self.shared.config.instant_retry;
        match self.await_start(poll) {
            StartPhase::Started => {
                self.call_stop();
                InstanceOutcome::Completed
            }
            other => self.abandon_start(other),
        }
    }

    fn run_repeat(&mut self) -> InstanceOutcome {
        let poll = self.shared.config.start_retry;
        match self.await_start(poll) {
            StartPhase::Started => {}
            other => return self.abandon_start(other),
        }
        let expiry = self.enter_running();

        let refresh_interval = self.instance.definition.refresh_interval();
        let refresh_retry = self.shared.config.refresh_retry;

        let outcome = 'ticks: loop {
            match self.pause(refresh_interval, expiry) {
                Wake::Elapsed => {}
                Wake::Expired => break InstanceOutcome::Completed,
                Wake::Cancelled => break self.cancelled(),
            }

            let mut deferred = 0u32;
            while !self.shared.oracle.is_ready() {
                deferred += 1;
                self.refresh_deferrals += 1;
                if deferred == DEFERRALS_BEFORE_WARN {
                    warn!(
                        "{} {} refresh deferred {} times in a row, game still not ready{}",
                        self.instance.definition.id(),
                        self.instance.id,
                        deferred,
                        if expiry.is_none() { " (effect never expires)" } else { "" }
                    );
                } else {
                    debug!(
                        "{} {} refresh deferred, game not ready",
                        self.instance.definition.id(),
                        self.instance.id
                    );
                }
                match self.pause(refresh_retry, expiry) {
                    Wake::Elapsed => {}
                    Wake::Expired => break 'ticks InstanceOutcome::Completed,
                    Wake::Cancelled => break 'ticks self.cancelled(),
                }
            }

            if self.invoke(Phase::Refresh) {
                self.refreshes += 1;
                self.instance.last_refresh_at = Some(Instant::now());
                self.mirror();
            } else {
                self.refresh_failures += 1;
                debug!(
                    "{} {} refresh failed, retrying next tick",
                    self.instance.definition.id(),
                    self.instance.id
                );
            }
        };

        self.call_stop();
        outcome
    }

    fn run_timed(&mut self) -> InstanceOutcome {
        let poll = self.shared.config.start_retry;
        match self.await_start(poll) {
            StartPhase::Started => {}
            other => return self.abandon_start(other),
        }
        let expiry = self.enter_running();

        let interval = self.shared.config.continue_interval;
        let mut holding = true;
        let outcome = loop {
            match self.pause(interval, expiry) {
                Wake::Elapsed => {}
                Wake::Expired => break InstanceOutcome::Completed,
                Wake::Cancelled => break self.cancelled(),
            }

            let ready = self.shared.oracle.is_ready();
            if ready != holding {
                info!(
                    "{} {} continue condition {}",
                    self.instance.definition.id(),
                    self.instance.id,
                    if ready { "restored" } else { "lost, duration unchanged" }
                );
                holding = ready;
            }
        };

        self.call_stop();
        outcome
    }

    /// Poll the oracle and try `start` until it succeeds, the request window
    /// closes, or the instance is cancelled.
    fn await_start(&mut self, poll: Duration) -> StartPhase {
        loop {
            if self.signal.is_cancelled() {
                return StartPhase::Cancelled;
            }

            if self.shared.oracle.is_ready() {
                self.start_attempts += 1;
                if self.invoke(Phase::Start) {
                    return StartPhase::Started;
                }
                debug!(
                    "{} {} start attempt {} failed",
                    self.instance.definition.id(),
                    self.instance.id,
                    self.start_attempts
                );
            } else {
                debug!(
                    "{} {} waiting for the game to be ready",
                    self.instance.definition.id(),
                    self.instance.id
                );
            }

            let wait = match self.start_deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return StartPhase::WindowClosed;
                    }
                    poll.min(deadline - now)
                }
                None => poll,
            };
            if self.signal.wait(wait) {
                return StartPhase::Cancelled;
            }
        }
    }

    /// Outcome for an instance that never reached `Running`.
    ///
    /// `stop` still runs when `start` was attempted, since a failed start may
    /// have applied part of the effect.
    fn abandon_start(&mut self, phase: StartPhase) -> InstanceOutcome {
        let attempted = self.start_attempts > 0;
        if attempted {
            self.call_stop();
        }
        match phase {
            StartPhase::Cancelled => self.cancelled(),
            StartPhase::WindowClosed if attempted => InstanceOutcome::StartFailed,
            StartPhase::WindowClosed | StartPhase::Started => InstanceOutcome::TimedOut,
        }
    }

    fn enter_running(&mut self) -> Option<Instant> {
        let now = Instant::now();
        self.instance.started_at = Some(now);
        self.set_state(InstanceState::Running);

        let definition = &self.instance.definition;
        info!(
            "{} {} running ({}{})",
            definition.id(),
            self.instance.id,
            self.instance.variant,
            if definition.expires() {
                format!(", {:?}", definition.duration())
            } else {
                String::new()
            }
        );
        if definition.expires() {
            now.checked_add(definition.duration())
        } else {
            None
        }
    }

    /// Wait up to `interval`, cut short by expiry or cancellation
    fn pause(&self, interval: Duration, expiry: Option<Instant>) -> Wake {
        let wait = match expiry {
            Some(expiry) => interval.min(expiry.saturating_duration_since(Instant::now())),
            None => interval,
        };
        if self.signal.wait(wait) {
            return Wake::Cancelled;
        }
        match expiry {
            Some(expiry) if Instant::now() >= expiry => Wake::Expired,
            _ => Wake::Elapsed,
        }
    }

    fn cancelled(&self) -> InstanceOutcome {
        // Only reachable after the signal fired
        InstanceOutcome::Cancelled(self.signal.reason().unwrap_or(CancelReason::Requested))
    }

    fn call_stop(&mut self) {
        if self.stop_result.is_some() {
            return;
        }
        self.set_state(InstanceState::StoppingRequested);
        let ok = self.invoke(Phase::Stop);
        if !ok {
            warn!(
                "{} {} stop hook failed",
                self.instance.definition.id(),
                self.instance.id
            );
        }
        self.stop_result = Some(ok);
    }

    /// Run one hook, treating a panic as a failure
    fn invoke(&mut self, phase: Phase) -> bool {
        let definition = Arc::clone(&self.instance.definition);
        let shared = Arc::clone(&self.shared);
        let hooks = definition.hooks();
        let mut ctx = HookContext::new(
            definition.id(),
            shared.port.as_ref(),
            self.instance.variant,
            &mut self.instance.baseline,
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| match phase {
            Phase::Start => hooks.start(&mut ctx),
            Phase::Refresh => hooks.refresh(&mut ctx),
            Phase::Stop => hooks.stop(&mut ctx),
        }));

        result.unwrap_or_else(|_| {
            warn!(
                "{} {} {} hook panicked",
                definition.id(),
                self.instance.id,
                phase.name()
            );
            false
        })
    }

    fn set_state(&mut self, state: InstanceState) {
        self.instance.state = state;
        self.mirror();
    }

    fn mirror(&self) {
        self.shared.mirror(&self.instance);
    }

    fn report(&self, outcome: InstanceOutcome) -> InstanceReport {
        InstanceReport {
            instance: self.instance.id,
            effect_id: self.instance.definition.id().to_string(),
            variant: self.instance.variant,
            outcome,
            start_attempts: self.start_attempts,
            refreshes: self.refreshes,
            refresh_failures: self.refresh_failures,
            refresh_deferrals: self.refresh_deferrals,
            stop_result: self.stop_result,
            running_for: self.instance.started_at.map(|at| at.elapsed()),
        }
    }
}
