//! What the scheduler hands back to callers.

use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::effect::Variant;
use crate::signal::CancelReason;

/// Identifier of one admitted instance, unique per scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, IntoStaticStr, Display)]
pub enum InstanceState {
    /// Admitted, waiting for the game to be ready
    Pending,
    /// Start hook succeeded
    Running,
    /// Expired or cancelled, stop hook about to run
    StoppingRequested,
    Stopped,
}

/// Why a start request was turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("effect {effect_id} has no variant {variant}")]
    InvalidVariant { effect_id: String, variant: Variant },

    #[error("unknown variant name: {0}")]
    UnknownVariant(String),

    #[error("conflicting effects still active: {}", .holders.join(", "))]
    ConflictHeld { holders: Vec<String> },

    #[error("scheduler is shutting down")]
    ShuttingDown,

    #[error("failed to spawn effect worker: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopStatus {
    Stopped,
    NotRunning,
}

/// How an instance's lifecycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstanceOutcome {
    /// Instant effect applied, or duration expired
    Completed,
    Cancelled(CancelReason),
    /// The game never became ready inside the request's window
    TimedOut,
    /// The start hook was tried but never succeeded inside the window
    StartFailed,
}

/// Terminal summary of one instance
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub instance: InstanceId,
    pub effect_id: String,
    pub variant: Variant,
    pub outcome: InstanceOutcome,
    pub start_attempts: u32,
    pub refreshes: u32,
    pub refresh_failures: u32,
    /// Refresh ticks re-polled because the game was not ready
    pub refresh_deferrals: u32,
    /// `None` when the start hook was never attempted
    pub stop_result: Option<bool>,
    /// Time spent in `Running`
    pub running_for: Option<Duration>,
}

impl InstanceReport {
    pub fn stop_called(&self) -> bool {
        self.stop_result.is_some()
    }

    /// Whether the effect both ran and cleaned up without a hook failure
    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            InstanceOutcome::Completed | InstanceOutcome::Cancelled(_)
        ) && self.stop_result != Some(false)
    }
}

/// Handle to an admitted instance's eventual report
#[derive(Debug)]
pub struct EffectTicket {
    instance: InstanceId,
    effect_id: String,
    receiver: Receiver<InstanceReport>,
}

impl EffectTicket {
    pub(crate) fn new(
        instance: InstanceId,
        effect_id: String,
        receiver: Receiver<InstanceReport>,
    ) -> Self {
        Self {
            instance,
            effect_id,
            receiver,
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn effect_id(&self) -> &str {
        &self.effect_id
    }

    /// Block until the instance finishes
    pub fn wait(self) -> Option<InstanceReport> {
        self.receiver.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<InstanceReport> {
        match self.receiver.recv_timeout(timeout) {
            Ok(report) => Some(report),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_report(&self) -> Option<InstanceReport> {
        self.receiver.try_recv().ok()
    }
}

/// Read-only view of a live instance
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub instance: InstanceId,
    pub effect_id: String,
    pub variant: Variant,
    pub state: InstanceState,
    /// Time since the instance entered `Running`
    pub running_for: Option<Duration>,
    /// Time since the last successful refresh
    pub since_refresh: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopSource {
    /// A live instance was cancelled and cleaned up
    Instance(InstanceId),
    /// Stop hook run on an idle definition flagged for stop-all restore
    Idle,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopAllEntry {
    pub effect_id: String,
    pub source: StopSource,
    pub success: bool,
}

/// Every stop hook stop-all ran, with its individual result
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopAllReport {
    pub entries: Vec<StopAllEntry>,
}

impl StopAllReport {
    pub fn success(&self) -> bool {
        self.entries.iter().all(|e| e.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StopAllEntry> {
        self.entries.iter().filter(|e| !e.success)
    }
}
