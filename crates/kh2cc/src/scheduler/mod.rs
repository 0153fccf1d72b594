//! Effect scheduler: admission, conflict holds and per-instance workers.
//!
//! Every admitted request becomes an instance with its own worker thread.
//! Before admission the request takes *holds* on its whole conflict set (its
//! registry entry plus its own id). Holds live in the instance table and are
//! released by the worker only after its `stop` hook has returned, so for two
//! conflicting effects A then B, `A.stop` always happens before `B.start`.
//!
//! A request that finds holds in the way cancels their owners with
//! [`CancelReason::Superseded`] and waits on the table's condition variable
//! until they clear or the admission timeout runs out.

mod report;
mod worker;

pub use report::{
    EffectTicket, InstanceId, InstanceOutcome, InstanceReport, InstanceSnapshot, InstanceState,
    Rejection, StopAllEntry, StopAllReport, StopSource, StopStatus,
};
pub use worker::ActiveEffectInstance;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::conflict::ConflictRegistry;
use crate::effect::{Baseline, DefinitionRegistry, HookContext, Variant};
use crate::oracle::GameStateOracle;
use crate::port::StatePort;
use crate::signal::{CancelReason, CancelSignal};

use worker::Worker;

/// Callback invoked with every terminal report
pub type FinishedListener = Arc<dyn Fn(&InstanceReport) + Send + Sync>;

/// A request to run one effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub effect_id: String,
    /// Falls back to the definition's default variant
    pub variant: Option<Variant>,
    /// Bounds both the conflict wait and start polling; falls back to the
    /// configured admission timeout
    pub timeout: Option<Duration>,
}

impl StartRequest {
    pub fn new(effect_id: impl Into<String>) -> Self {
        Self {
            effect_id: effect_id.into(),
            variant: None,
            timeout: None,
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Table entry for a live instance, mirrored from its worker
struct LiveInstance {
    effect_id: String,
    variant: Variant,
    state: InstanceState,
    signal: Arc<CancelSignal>,
    handle: Option<JoinHandle<InstanceReport>>,
    started_at: Option<Instant>,
    last_refresh_at: Option<Instant>,
}

#[derive(Default)]
struct InstanceTable {
    /// effect id -> instance holding it
    holds: HashMap<String, InstanceId>,
    live: BTreeMap<InstanceId, LiveInstance>,
}

impl InstanceTable {
    fn holders_of<'a>(&self, set: impl IntoIterator<Item = &'a String>) -> BTreeSet<InstanceId> {
        set.into_iter()
            .filter_map(|id| self.holds.get(id).copied())
            .collect()
    }

    /// Cancel the matching instances and take whichever join handles are
    /// still available
    fn cancel_where(
        &mut self,
        reason: CancelReason,
        mut predicate: impl FnMut(&LiveInstance) -> bool,
    ) -> (Vec<InstanceId>, Vec<(InstanceId, String, JoinHandle<InstanceReport>)>) {
        let mut ids = Vec::new();
        let mut handles = Vec::new();
        for (id, live) in self.live.iter_mut().filter(|(_, live)| predicate(live)) {
            live.signal.cancel(reason);
            ids.push(*id);
            if let Some(handle) = live.handle.take() {
                handles.push((*id, live.effect_id.clone(), handle));
            }
        }
        (ids, handles)
    }
}

/// State shared between the scheduler handle and every worker
pub(crate) struct Shared {
    definitions: DefinitionRegistry,
    conflicts: ConflictRegistry,
    port: Arc<dyn StatePort>,
    oracle: Arc<dyn GameStateOracle>,
    config: SchedulerConfig,
    table: Mutex<InstanceTable>,
    vacated: Condvar,
    next_id: AtomicU64,
    closed: AtomicBool,
    listener: Mutex<Option<FinishedListener>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InstanceTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, InstanceTable>,
        timeout: Duration,
    ) -> MutexGuard<'a, InstanceTable> {
        match self.vacated.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    /// Drop the instance's entry and every hold it owns
    fn release(&self, id: InstanceId) {
        let mut table = self.lock();
        table.live.remove(&id);
        table.holds.retain(|_, holder| *holder != id);
        drop(table);
        self.vacated.notify_all();
    }

    fn mirror(&self, instance: &ActiveEffectInstance) {
        let mut table = self.lock();
        if let Some(live) = table.live.get_mut(&instance.id) {
            live.state = instance.state;
            live.started_at = instance.started_at;
            live.last_refresh_at = instance.last_refresh_at;
        }
    }

    fn notify_finished(&self, report: &InstanceReport) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener
            && panic::catch_unwind(AssertUnwindSafe(|| listener(report))).is_err()
        {
            warn!("Finished listener panicked for {}", report.effect_id);
        }
    }

    /// Block until none of `ids` is in the table any more
    fn wait_vacated(&self, ids: &[InstanceId]) {
        let mut table = self.lock();
        while ids.iter().any(|id| table.live.contains_key(id)) {
            table = self.wait(table, Duration::from_millis(100));
        }
    }
}

/// Runs effect instances against a shared state port.
///
/// Dropping the scheduler shuts it down: every live instance is cancelled
/// and its `stop` hook has run before `drop` returns.
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(
        definitions: DefinitionRegistry,
        conflicts: ConflictRegistry,
        port: Arc<dyn StatePort>,
        oracle: Arc<dyn GameStateOracle>,
        config: SchedulerConfig,
    ) -> Self {
        info!(
            "Scheduler ready with {} effects, {} conflict entries",
            definitions.len(),
            conflicts.len()
        );
        Self {
            shared: Arc::new(Shared {
                definitions,
                conflicts,
                port,
                oracle,
                config,
                table: Mutex::new(InstanceTable::default()),
                vacated: Condvar::new(),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.shared.definitions
    }

    pub fn conflicts(&self) -> &ConflictRegistry {
        &self.shared.conflicts
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Register a callback for every terminal report; replaces any previous one
    pub fn set_listener(&self, listener: FinishedListener) {
        *self
            .shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    /// Admit a request and spawn its worker.
    ///
    /// Blocks only while conflicting instances are being superseded.
    pub fn request_start(&self, request: StartRequest) -> Result<EffectTicket, Rejection> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(Rejection::ShuttingDown);
        }

        let definition = shared
            .definitions
            .get(&request.effect_id)
            .cloned()
            .ok_or_else(|| Rejection::UnknownEffect(request.effect_id.clone()))?;

        let variant = request.variant.unwrap_or(definition.default_variant());
        if !definition.accepts(variant) {
            return Err(Rejection::InvalidVariant {
                effect_id: request.effect_id,
                variant,
            });
        }

        let timeout = request.timeout.unwrap_or(shared.config.admission_timeout);
        // None: the timeout is too large to represent, wait without bound
        let deadline = Instant::now().checked_add(timeout);
        let set = shared.conflicts.conflict_set(definition.id());

        let mut table = shared.lock();
        loop {
            if shared.closed.load(Ordering::SeqCst) {
                return Err(Rejection::ShuttingDown);
            }

            let holders = table.holders_of(&set);
            if holders.is_empty() {
                break;
            }

            for holder in &holders {
                if let Some(live) = table.live.get(holder)
                    && live.signal.cancel(CancelReason::Superseded)
                {
                    info!(
                        "{} {} superseded by a request for {}",
                        live.effect_id,
                        holder,
                        definition.id()
                    );
                }
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                let holders: Vec<String> = holders
                    .iter()
                    .filter_map(|id| table.live.get(id).map(|live| live.effect_id.clone()))
                    .collect();
                warn!(
                    "Rejecting {}: conflicting effects still active ({})",
                    definition.id(),
                    holders.join(", ")
                );
                return Err(Rejection::ConflictHeld { holders });
            }
            let remaining = deadline.map_or(Duration::from_secs(1), |deadline| deadline - now);
            table = shared.wait(table, remaining);
        }

        let id = InstanceId(shared.next_id.fetch_add(1, Ordering::SeqCst));
        let signal = Arc::new(CancelSignal::new());
        let (sender, receiver) = mpsc::channel();

        let worker = Worker::new(
            Arc::clone(shared),
            ActiveEffectInstance::new(id, Arc::clone(&definition), variant),
            Arc::clone(&signal),
            Instant::now().checked_add(timeout),
            sender,
        );
        let handle = thread::Builder::new()
            .name(format!("effect-{}", definition.id()))
            .spawn(move || worker.run())
            .map_err(|e| Rejection::Spawn(e.to_string()))?;

        // The worker cannot release before this entry exists: it needs the lock
        for held in &set {
            table.holds.insert(held.clone(), id);
        }
        table.live.insert(
            id,
            LiveInstance {
                effect_id: definition.id().to_string(),
                variant,
                state: InstanceState::Pending,
                signal,
                handle: Some(handle),
                started_at: None,
                last_refresh_at: None,
            },
        );
        drop(table);

        info!("Accepted {} {} ({})", definition.id(), id, variant);
        Ok(EffectTicket::new(id, definition.id().to_string(), receiver))
    }

    /// Cancel every live instance of `effect_id` and wait for their `stop`
    /// hooks to finish
    pub fn request_stop(&self, effect_id: &str) -> StopStatus {
        let (ids, handles) = self
            .shared
            .lock()
            .cancel_where(CancelReason::Requested, |live| live.effect_id == effect_id);

        if ids.is_empty() {
            debug!("Stop requested for {} but it is not running", effect_id);
            return StopStatus::NotRunning;
        }

        for (id, _, handle) in handles {
            if handle.join().is_err() {
                warn!("{} {} worker panicked", effect_id, id);
            }
        }
        self.shared.wait_vacated(&ids);
        StopStatus::Stopped
    }

    /// Cancel and join every live instance, then run the `stop` hook of each
    /// idle definition flagged for stop-all restore
    pub fn stop_all(&self) -> StopAllReport {
        let mut report = self.stop_live(CancelReason::StopAll);
        self.sweep_idle(&mut report);

        if report.success() {
            info!("Stop-all finished ({} stop hooks)", report.entries.len());
        } else {
            let failed: Vec<&str> = report.failures().map(|e| e.effect_id.as_str()).collect();
            warn!("Stop-all finished with failures: {}", failed.join(", "));
        }
        report
    }

    /// Read-only view of live instances, in admission order
    pub fn active(&self) -> Vec<InstanceSnapshot> {
        let now = Instant::now();
        self.shared
            .lock()
            .live
            .iter()
            .map(|(id, live)| InstanceSnapshot {
                instance: *id,
                effect_id: live.effect_id.clone(),
                variant: live.variant,
                state: live.state,
                running_for: live.started_at.map(|at| now.saturating_duration_since(at)),
                since_refresh: live
                    .last_refresh_at
                    .map(|at| now.saturating_duration_since(at)),
            })
            .collect()
    }

    pub fn is_active(&self, effect_id: &str) -> bool {
        self.shared
            .lock()
            .live
            .values()
            .any(|live| live.effect_id == effect_id)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Refuse further requests and stop everything still live.
    ///
    /// Idempotent; only the first call stops anything.
    pub fn shutdown(&self) -> StopAllReport {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return StopAllReport::default();
        }
        // Wake requests waiting on conflicts so they see the flag
        self.shared.vacated.notify_all();
        info!("Scheduler shutting down");
        self.stop_live(CancelReason::Shutdown)
    }

    fn stop_live(&self, reason: CancelReason) -> StopAllReport {
        let (ids, handles) = self.shared.lock().cancel_where(reason, |_| true);

        let mut report = StopAllReport::default();
        for (id, effect_id, handle) in handles {
            match handle.join() {
                Ok(instance) => {
                    if let Some(success) = instance.stop_result {
                        report.entries.push(StopAllEntry {
                            effect_id,
                            source: StopSource::Instance(id),
                            success,
                        });
                    }
                }
                Err(_) => {
                    warn!("{} {} worker panicked", effect_id, id);
                    report.entries.push(StopAllEntry {
                        effect_id,
                        source: StopSource::Instance(id),
                        success: false,
                    });
                }
            }
        }
        self.shared.wait_vacated(&ids);
        report
    }

    fn sweep_idle(&self, report: &mut StopAllReport) {
        let stopped: HashSet<&str> = report.entries.iter().map(|e| e.effect_id.as_str()).collect();
        let candidates: Vec<_> = self
            .shared
            .definitions
            .iter()
            .filter(|def| def.restore_on_stop_all() && !stopped.contains(def.id()))
            .cloned()
            .collect();

        for definition in candidates {
            // Held under the table lock so no instance of it can be admitted
            // while its stop hook runs
            let table = self.shared.lock();
            if table.holds.contains_key(definition.id()) {
                debug!("Skipping idle restore of {}, instance active", definition.id());
                continue;
            }

            let mut baseline = Baseline::new();
            let mut ctx = HookContext::new(
                definition.id(),
                self.shared.port.as_ref(),
                definition.default_variant(),
                &mut baseline,
            );
            let hooks = definition.hooks();
            let success = panic::catch_unwind(AssertUnwindSafe(|| hooks.stop(&mut ctx)))
                .unwrap_or(false);
            drop(table);

            if !success {
                warn!("Idle restore of {} failed", definition.id());
            }
            report.entries.push(StopAllEntry {
                effect_id: definition.id().to_string(),
                source: StopSource::Idle,
                success,
            });
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
