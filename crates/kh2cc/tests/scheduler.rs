mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kh2cc::scheduler::StopSource;
use kh2cc::{
    CancelReason, EffectDefinition, EffectKind, InstanceOutcome, InstanceState, Rejection,
    SimulatedPort, StartRequest, StaticOracle, StopStatus,
};

use common::{Phase, FakeEffect, Recorder, eventually, scheduler};

fn ready() -> Arc<StaticOracle> {
    Arc::new(StaticOracle::new(true))
}

#[test]
fn unknown_effect_is_rejected_without_instance() {
    let recorder = Recorder::new();
    let sched = scheduler(
        vec![EffectDefinition::new("a", EffectKind::Instant, FakeEffect::new("a", &recorder))],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let err = sched.request_start(StartRequest::new("nope")).unwrap_err();
    assert_eq!(err, Rejection::UnknownEffect("nope".to_string()));
    assert!(sched.active().is_empty());
    assert!(recorder.events().is_empty());
}

#[test]
fn instant_effect_times_out_when_never_ready() {
    let recorder = Recorder::new();
    let sched = scheduler(
        vec![EffectDefinition::new("heal", EffectKind::Instant, FakeEffect::new("heal", &recorder))],
        vec![],
        Arc::new(SimulatedPort::new()),
        Arc::new(StaticOracle::new(false)),
    );

    let report = sched
        .request_start(StartRequest::new("heal").with_timeout(Duration::from_millis(50)))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome, InstanceOutcome::TimedOut);
    assert_eq!(report.start_attempts, 0);
    assert_eq!(report.stop_result, None);
    assert_eq!(recorder.count("heal", Phase::Start), 0);
    assert_eq!(recorder.count("heal", Phase::Stop), 0);
}

#[test]
fn instant_start_is_retried_then_followed_by_one_stop() {
    let recorder = Recorder::new();
    let effect = FakeEffect::new("heal", &recorder);
    effect.fail_starts(2);
    let sched = scheduler(
        vec![EffectDefinition::new("heal", EffectKind::Instant, effect)],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let report = sched.request_start(StartRequest::new("heal")).unwrap().wait().unwrap();

    assert_eq!(report.outcome, InstanceOutcome::Completed);
    assert_eq!(report.start_attempts, 3);
    assert_eq!(recorder.count("heal", Phase::Start), 3);
    assert_eq!(recorder.count("heal", Phase::Stop), 1);
}

#[test]
fn start_that_never_succeeds_is_start_failed() {
    let recorder = Recorder::new();
    let effect = FakeEffect::new("kill", &recorder);
    effect.fail_starts(usize::MAX);
    let sched = scheduler(
        vec![EffectDefinition::new("kill", EffectKind::Instant, effect)],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let report = sched
        .request_start(StartRequest::new("kill").with_timeout(Duration::from_millis(40)))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome, InstanceOutcome::StartFailed);
    assert!(report.start_attempts >= 2);
    // Stop still runs once to undo anything a failed start left behind
    assert_eq!(recorder.count("kill", Phase::Stop), 1);
}

#[test]
fn repeat_action_refresh_failure_keeps_running() {
    let recorder = Recorder::new();
    let effect = FakeEffect::new("drain", &recorder);
    effect.fail_refreshes(3);
    let sched = scheduler(
        vec![
            EffectDefinition::new("drain", EffectKind::RepeatAction, effect)
                .with_duration(Duration::from_millis(200))
                .with_refresh_interval(Duration::from_millis(5)),
        ],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let ticket = sched.request_start(StartRequest::new("drain")).unwrap();

    assert!(eventually(|| recorder.count("drain", Phase::Refresh) >= 4));
    let snapshot = sched.active();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].state, InstanceState::Running);

    let report = ticket.wait().unwrap();
    assert_eq!(report.outcome, InstanceOutcome::Completed);
    assert_eq!(report.refresh_failures, 3);
    assert!(report.refreshes >= 1);
    assert_eq!(report.stop_result, Some(true));
    assert_eq!(recorder.count("drain", Phase::Stop), 1);
}

#[test]
fn force_stop_mid_refresh_stops_exactly_once() {
    let recorder = Recorder::new();
    let sched = scheduler(
        vec![
            EffectDefinition::new("lock", EffectKind::RepeatAction, FakeEffect::new("lock", &recorder))
                .with_duration(Duration::from_secs(30))
                .with_refresh_interval(Duration::from_millis(2)),
        ],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let ticket = sched.request_start(StartRequest::new("lock")).unwrap();
    assert!(eventually(|| recorder.count("lock", Phase::Refresh) >= 5));

    assert_eq!(sched.request_stop("lock"), StopStatus::Stopped);
    assert_eq!(recorder.count("lock", Phase::Stop), 1);

    // Nothing runs after stop
    let refreshes = recorder.count("lock", Phase::Refresh);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.count("lock", Phase::Refresh), refreshes);
    let events = recorder.events();
    assert_eq!(events.last().map(|e| e.phase), Some(Phase::Stop));
    assert_eq!(events.first().map(|e| e.phase), Some(Phase::Start));

    let report = ticket.wait().unwrap();
    assert_eq!(
        report.outcome,
        InstanceOutcome::Cancelled(CancelReason::Requested)
    );
    assert_eq!(report.stop_result, Some(true));
}

#[test]
fn refresh_waits_for_oracle_without_counting_failures() {
    let recorder = Recorder::new();
    let oracle = Arc::new(StaticOracle::new(true));
    let sched = scheduler(
        vec![
            EffectDefinition::new("lock", EffectKind::RepeatAction, FakeEffect::new("lock", &recorder))
                .with_refresh_interval(Duration::from_millis(2)),
        ],
        vec![],
        Arc::new(SimulatedPort::new()),
        oracle.clone(),
    );

    let ticket = sched.request_start(StartRequest::new("lock")).unwrap();
    assert!(eventually(|| recorder.count("lock", Phase::Refresh) >= 1));

    oracle.set_ready(false);
    thread::sleep(Duration::from_millis(20));
    let paused = recorder.count("lock", Phase::Refresh);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(recorder.count("lock", Phase::Refresh), paused);
    assert_eq!(sched.active()[0].state, InstanceState::Running);

    oracle.set_ready(true);
    assert!(eventually(|| recorder.count("lock", Phase::Refresh) > paused));

    sched.request_stop("lock");
    let report = ticket.wait().unwrap();
    assert_eq!(report.refresh_failures, 0);
}

#[test]
fn endless_repeat_action_defers_until_stopped() {
    let recorder = Recorder::new();
    let oracle = Arc::new(StaticOracle::new(true));
    let sched = scheduler(
        vec![
            EffectDefinition::new("lock", EffectKind::RepeatAction, FakeEffect::new("lock", &recorder))
                .with_refresh_interval(Duration::from_millis(2)),
        ],
        vec![],
        Arc::new(SimulatedPort::new()),
        oracle.clone(),
    );

    let ticket = sched.request_start(StartRequest::new("lock")).unwrap();
    assert!(eventually(|| recorder.count("lock", Phase::Refresh) >= 1));

    oracle.set_ready(false);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(sched.active()[0].state, InstanceState::Running);

    assert_eq!(sched.request_stop("lock"), StopStatus::Stopped);
    let report = ticket.wait().unwrap();
    assert_eq!(report.outcome, InstanceOutcome::Cancelled(CancelReason::Requested));
    assert!(report.refresh_deferrals >= 2);
    assert_eq!(report.refresh_failures, 0);
    assert_eq!(report.stop_result, Some(true));
}

#[test]
fn unbounded_timeout_waits_for_the_game() {
    let recorder = Recorder::new();
    let oracle = Arc::new(StaticOracle::new(false));
    let sched = scheduler(
        vec![EffectDefinition::new("heal", EffectKind::Instant, FakeEffect::new("heal", &recorder))],
        vec![],
        Arc::new(SimulatedPort::new()),
        oracle.clone(),
    );

    let ticket = sched
        .request_start(StartRequest::new("heal").with_timeout(Duration::MAX))
        .unwrap();
    thread::sleep(Duration::from_millis(30));
    assert!(ticket.try_report().is_none());

    oracle.set_ready(true);
    let report = ticket.wait_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(report.outcome, InstanceOutcome::Completed);
    assert_eq!(recorder.count("heal", Phase::Start), 1);
}

#[test]
fn start_timed_duration_survives_lost_condition() {
    let recorder = Recorder::new();
    let oracle = Arc::new(StaticOracle::new(true));
    let duration = Duration::from_millis(150);
    let sched = scheduler(
        vec![
            EffectDefinition::new("jump", EffectKind::StartTimed, FakeEffect::new("jump", &recorder))
                .with_duration(duration),
        ],
        vec![],
        Arc::new(SimulatedPort::new()),
        oracle.clone(),
    );

    let ticket = sched.request_start(StartRequest::new("jump")).unwrap();
    assert!(eventually(|| recorder.count("jump", Phase::Start) == 1));
    oracle.set_ready(false);

    let report = ticket.wait().unwrap();
    assert_eq!(report.outcome, InstanceOutcome::Completed);

    let started = recorder.first("jump", Phase::Start).unwrap().at;
    let stopped = recorder.first("jump", Phase::Stop).unwrap().at;
    assert!(stopped.duration_since(started) >= duration);
    assert!(report.running_for.unwrap() >= duration);
    assert_eq!(recorder.count("jump", Phase::Stop), 1);
}

#[test]
fn conflicting_request_supersedes_and_orders_stop_before_start() {
    let recorder = Recorder::new();
    let a = FakeEffect::new("a", &recorder);
    // Widen the window in which a racing start would be visible
    a.set_stop_delay(Duration::from_millis(30));
    let sched = scheduler(
        vec![
            EffectDefinition::new("a", EffectKind::StartTimed, a),
            EffectDefinition::new("b", EffectKind::StartTimed, FakeEffect::new("b", &recorder)),
        ],
        vec![("a", vec!["b"])],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let first = sched.request_start(StartRequest::new("a")).unwrap();
    assert!(eventually(|| recorder.count("a", Phase::Start) == 1));

    let second = sched.request_start(StartRequest::new("b")).unwrap();
    let superseded = first.wait().unwrap();
    assert_eq!(
        superseded.outcome,
        InstanceOutcome::Cancelled(CancelReason::Superseded)
    );

    assert!(eventually(|| recorder.count("b", Phase::Start) == 1));
    let a_stop = recorder.position("a", Phase::Stop).unwrap();
    let b_start = recorder.position("b", Phase::Start).unwrap();
    assert!(a_stop < b_start);

    sched.request_stop("b");
    assert_eq!(second.wait().unwrap().stop_result, Some(true));
    recorder.assert_exclusive(&["a", "b"]);
}

#[test]
fn conflict_exclusion_under_concurrent_requests() {
    let recorder = Recorder::new();
    let sched = Arc::new(scheduler(
        vec![
            EffectDefinition::new("a", EffectKind::RepeatAction, FakeEffect::new("a", &recorder))
                .with_refresh_interval(Duration::from_millis(1)),
            EffectDefinition::new("b", EffectKind::RepeatAction, FakeEffect::new("b", &recorder))
                .with_refresh_interval(Duration::from_millis(1)),
            EffectDefinition::new("c", EffectKind::StartTimed, FakeEffect::new("c", &recorder)),
        ],
        vec![("a", vec!["b"]), ("b", vec!["a", "c"])],
        Arc::new(SimulatedPort::new()),
        ready(),
    ));

    let workers: Vec<_> = ["a", "b", "c", "a", "b", "c"]
        .into_iter()
        .map(|id| {
            let sched = Arc::clone(&sched);
            thread::spawn(move || {
                for _ in 0..5 {
                    let _ = sched.request_start(StartRequest::new(id));
                    thread::sleep(Duration::from_millis(3));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(sched.stop_all().success());
    assert!(sched.active().is_empty());

    recorder.assert_exclusive(&["a", "b"]);
    recorder.assert_exclusive(&["b", "c"]);
    for id in ["a", "b", "c"] {
        assert_eq!(
            recorder.count(id, Phase::Start),
            recorder.count(id, Phase::Stop),
            "{} start/stop mismatch",
            id
        );
    }
}

#[test]
fn admission_gives_up_while_holder_is_stopping() {
    let recorder = Recorder::new();
    let slow = FakeEffect::new("slow", &recorder);
    slow.set_stop_delay(Duration::from_millis(300));
    let sched = scheduler(
        vec![
            EffectDefinition::new("slow", EffectKind::StartTimed, slow),
            EffectDefinition::new("fast", EffectKind::Instant, FakeEffect::new("fast", &recorder)),
        ],
        vec![("fast", vec!["slow"])],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let held = sched.request_start(StartRequest::new("slow")).unwrap();
    assert!(eventually(|| recorder.count("slow", Phase::Start) == 1));

    let started = Instant::now();
    let err = sched
        .request_start(StartRequest::new("fast").with_timeout(Duration::from_millis(50)))
        .unwrap_err();
    assert_eq!(
        err,
        Rejection::ConflictHeld {
            holders: vec!["slow".to_string()]
        }
    );
    assert!(started.elapsed() < Duration::from_millis(290));
    assert_eq!(recorder.count("fast", Phase::Start), 0);

    // The holder was still told to go
    let report = held.wait().unwrap();
    assert_eq!(
        report.outcome,
        InstanceOutcome::Cancelled(CancelReason::Superseded)
    );
}

#[test]
fn stop_all_reports_each_stop_and_keeps_going() {
    let recorder = Recorder::new();
    let broken = FakeEffect::new("two", &recorder);
    broken.set_stop_ok(false);
    let idle = FakeEffect::new("idle", &recorder);
    let sched = scheduler(
        vec![
            EffectDefinition::new("one", EffectKind::RepeatAction, FakeEffect::new("one", &recorder)),
            EffectDefinition::new("two", EffectKind::RepeatAction, broken),
            EffectDefinition::new("three", EffectKind::StartTimed, FakeEffect::new("three", &recorder)),
            EffectDefinition::new("idle", EffectKind::RepeatAction, idle)
                .with_restore_on_stop_all(true),
        ],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let tickets: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|id| sched.request_start(StartRequest::new(id)).unwrap())
        .collect();
    assert!(eventually(|| {
        sched
            .active()
            .iter()
            .filter(|s| s.state == InstanceState::Running)
            .count()
            == 3
    }));

    let report = sched.stop_all();
    assert!(!report.success());
    assert_eq!(report.entries.len(), 4);

    for id in ["one", "two", "three", "idle"] {
        assert_eq!(recorder.count(id, Phase::Stop), 1, "{} stop count", id);
    }
    let failed: Vec<_> = report.failures().map(|e| e.effect_id.as_str()).collect();
    assert_eq!(failed, vec!["two"]);
    assert!(
        report
            .entries
            .iter()
            .any(|e| e.effect_id == "idle" && e.source == StopSource::Idle)
    );

    for ticket in tickets {
        let instance = ticket.wait().unwrap();
        assert_eq!(
            instance.outcome,
            InstanceOutcome::Cancelled(CancelReason::StopAll)
        );
    }
    assert!(sched.active().is_empty());
}

#[test]
fn dropping_scheduler_stops_running_instances() {
    let recorder = Recorder::new();
    let sched = scheduler(
        vec![EffectDefinition::new("hold", EffectKind::StartTimed, FakeEffect::new("hold", &recorder))],
        vec![],
        Arc::new(SimulatedPort::new()),
        ready(),
    );

    let ticket = sched.request_start(StartRequest::new("hold")).unwrap();
    assert!(eventually(|| recorder.count("hold", Phase::Start) == 1));
    drop(sched);

    assert_eq!(recorder.count("hold", Phase::Stop), 1);
    let report = ticket.wait().unwrap();
    assert_eq!(
        report.outcome,
        InstanceOutcome::Cancelled(CancelReason::Shutdown)
    );
}
