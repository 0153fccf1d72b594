//! Simulate command: run one effect against an in-process game state.
//!
//! The simulated port is seeded with Sora standing on the field so the
//! state oracle lets effects through immediately. Ctrl-C stops every
//! running effect through the same path a host disconnect would.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use kh2cc::catalog::Member;
use kh2cc::catalog::addresses::{misc, state};
use kh2cc::{Config, EffectHost, InstanceReport, Kh2Oracle, SimulatedPort, StartStatus};
use tracing::{info, warn};

/// Upper bound on waiting for a report once a stop has been issued
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Where the seeded animation state pointer points
const ANIMATION_BLOCK: u64 = 0x0150_0000;

const PARTY: [(Member, u32, u32); 3] = [
    (Member::SORA, 120, 200),
    (Member::DONALD, 80, 300),
    (Member::GOOFY, 150, 100),
];

fn seeded_port() -> SimulatedPort {
    let mut builder = SimulatedPort::builder()
        .write_u32(state::GAME_STATE, 1)
        .write_u64(state::ANIMATION_STATE_POINTER, ANIMATION_BLOCK)
        .write_u32(ANIMATION_BLOCK + state::ANIMATION_STATUS_OFFSET, 1)
        .write_u16(ANIMATION_BLOCK + state::ANIMATION_ID_OFFSET, state::ANIMATION_IDLE)
        .write_u32(state::CAMERA_LOCK, 0)
        .write_u32(state::TRANSITION_STATE, 1)
        .write_u32(misc::MUNNY, 1_000)
        .write_u32(misc::JUMP_AMOUNT, 1);
    for (member, hp, mp) in PARTY {
        builder = builder
            .write_u32(member.hp, hp)
            .write_u32(member.max_hp, hp)
            .write_u32(member.mp, mp)
            .write_u32(member.max_mp, mp);
    }
    builder.build()
}

fn print_stats(label: &str, port: &SimulatedPort) {
    println!("{}:", label);
    for (member, _, _) in PARTY {
        println!(
            "  {:<7} hp {:>4}/{:<4} mp {:>4}/{:<4}",
            member.name,
            port.peek_u32(member.hp),
            port.peek_u32(member.max_hp),
            port.peek_u32(member.mp),
            port.peek_u32(member.max_mp)
        );
    }
    println!(
        "  munny {}  jump {}",
        port.peek_u32(misc::MUNNY),
        port.peek_u32(misc::JUMP_AMOUNT)
    );
}

fn print_report(report: &InstanceReport) {
    println!(
        "{} {} ({}): {:?}",
        report.instance, report.effect_id, report.variant, report.outcome
    );
    println!(
        "  start attempts {}, refreshes {}, refresh failures {}, deferrals {}",
        report.start_attempts, report.refreshes, report.refresh_failures, report.refresh_deferrals
    );
    if let Some(running_for) = report.running_for {
        println!("  ran for {:.1}s", running_for.as_secs_f64());
    }
    match report.stop_result {
        Some(ok) => println!("  stop hook {}", if ok { "succeeded" } else { "failed" }),
        None => println!("  stop hook not called"),
    }
}

pub fn run(
    config: &Config,
    effect_id: &str,
    variant: Option<&str>,
    stop_after: Option<u64>,
) -> Result<()> {
    let port = Arc::new(seeded_port());
    let oracle = Arc::new(Kh2Oracle::new(port.clone()));
    let host = Arc::new(EffectHost::new(port.clone(), oracle, config)?);

    let (sender, receiver) = mpsc::channel();
    let sender = Mutex::new(sender);
    host.on_finished(move |report| {
        if let Ok(sender) = sender.lock() {
            let _ = sender.send(report.clone());
        }
    });

    {
        let host = Arc::clone(&host);
        ctrlc::set_handler(move || {
            info!("Interrupted, stopping all effects");
            if !host.stop_all_effects() {
                warn!("Some stop hooks failed");
            }
        })?;
    }

    print_stats("Before", &port);

    let instance = match host.start_effect(effect_id, variant) {
        StartStatus::Accepted(instance) => instance,
        StartStatus::UnknownEffect => bail!("unknown effect: {}", effect_id),
        StartStatus::Rejected(rejection) => bail!("request rejected: {}", rejection),
    };
    info!("Started {} as {}", effect_id, instance);

    let report = match stop_after {
        Some(secs) => match receiver.recv_timeout(Duration::from_secs(secs)) {
            Ok(report) => report,
            Err(RecvTimeoutError::Timeout) => {
                info!("Stopping {} after {}s", effect_id, secs);
                host.stop_effect(effect_id);
                receiver.recv_timeout(STOP_GRACE)?
            }
            Err(e) => return Err(e.into()),
        },
        None => receiver.recv()?,
    };

    print_report(&report);
    print_stats("After", &port);

    if !report.succeeded() {
        bail!("{} did not complete cleanly", effect_id);
    }
    Ok(())
}
