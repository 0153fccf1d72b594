//! Recording hooks and scheduler setup shared by the scenario tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use kh2cc::{
    ConflictRegistry, DefinitionRegistry, EffectDefinition, EffectHooks, GameStateOracle,
    HookContext, Scheduler, SchedulerConfig, SimulatedPort, SymmetryPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Refresh,
    Stop,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub effect: &'static str,
    pub phase: Phase,
    pub ok: bool,
    pub at: Instant,
}

/// Ordered log of every hook call across all fake effects
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, effect: &'static str, phase: Phase, ok: bool) {
        self.events.lock().unwrap().push(Event {
            effect,
            phase,
            ok,
            at: Instant::now(),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, effect: &str, phase: Phase) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.effect == effect && e.phase == phase)
            .count()
    }

    /// Index in the log of the first matching event
    pub fn position(&self, effect: &str, phase: Phase) -> Option<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.effect == effect && e.phase == phase)
    }

    pub fn first(&self, effect: &str, phase: Phase) -> Option<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.effect == effect && e.phase == phase)
            .cloned()
    }

    /// Panics if any two of `group` were ever running at the same time
    pub fn assert_exclusive(&self, group: &[&str]) {
        let mut running: HashSet<&str> = HashSet::new();
        for event in self.events() {
            if !group.contains(&event.effect) {
                continue;
            }
            match event.phase {
                Phase::Start if event.ok => {
                    assert!(
                        running.is_empty(),
                        "{} started while {:?} running",
                        event.effect,
                        running
                    );
                    running.insert(event.effect);
                }
                Phase::Stop => {
                    running.remove(event.effect);
                }
                _ => {}
            }
        }
    }
}

/// Hooks that record every call and fail on command
pub struct FakeEffect {
    name: &'static str,
    recorder: Arc<Recorder>,
    start_failures: AtomicUsize,
    refresh_failures: AtomicUsize,
    stop_ok: AtomicBool,
    stop_delay: Mutex<Duration>,
}

impl FakeEffect {
    pub fn new(name: &'static str, recorder: &Arc<Recorder>) -> Arc<Self> {
        Arc::new(Self {
            name,
            recorder: Arc::clone(recorder),
            start_failures: AtomicUsize::new(0),
            refresh_failures: AtomicUsize::new(0),
            stop_ok: AtomicBool::new(true),
            stop_delay: Mutex::new(Duration::ZERO),
        })
    }

    /// Fail the next `n` start calls
    pub fn fail_starts(&self, n: usize) {
        self.start_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` refresh calls
    pub fn fail_refreshes(&self, n: usize) {
        self.refresh_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_stop_ok(&self, ok: bool) {
        self.stop_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = delay;
    }

    fn consume(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}

impl EffectHooks for FakeEffect {
    fn start(&self, _ctx: &mut HookContext<'_>) -> bool {
        let ok = Self::consume(&self.start_failures);
        self.recorder.push(self.name, Phase::Start, ok);
        ok
    }

    fn refresh(&self, _ctx: &mut HookContext<'_>) -> bool {
        let ok = Self::consume(&self.refresh_failures);
        self.recorder.push(self.name, Phase::Refresh, ok);
        ok
    }

    fn stop(&self, _ctx: &mut HookContext<'_>) -> bool {
        let delay = *self.stop_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let ok = self.stop_ok.load(Ordering::SeqCst);
        self.recorder.push(self.name, Phase::Stop, ok);
        ok
    }
}

pub const POLL: Duration = Duration::from_millis(5);

pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig::builder()
        .poll_all(POLL)
        .admission_timeout(Duration::from_secs(2))
        .build()
}

pub fn scheduler(
    definitions: Vec<EffectDefinition>,
    conflicts: Vec<(&str, Vec<&str>)>,
    port: Arc<SimulatedPort>,
    oracle: Arc<dyn GameStateOracle>,
) -> Scheduler {
    let definitions = DefinitionRegistry::from_definitions(definitions).unwrap();
    let conflicts = ConflictRegistry::from_entries(
        conflicts,
        &definitions,
        SymmetryPolicy::Symmetrize,
    )
    .unwrap();
    Scheduler::new(definitions, conflicts, port, oracle, fast_config())
}

/// Poll `condition` until it holds or two seconds pass
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
