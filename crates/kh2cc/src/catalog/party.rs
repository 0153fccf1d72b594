//! HP and MP locks shared by Sora, Donald and Goofy.
//!
//! One hook type per stat; the effect id picks the party member through the
//! addresses it was built with and the behaviour through its variant.

use crate::effect::{EffectHooks, HookContext, Variant};

use super::addresses::stats;

/// Stat addresses of one party member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub name: &'static str,
    pub hp: u64,
    pub max_hp: u64,
    pub mp: u64,
    pub max_mp: u64,
}

impl Member {
    pub const SORA: Member = Member {
        name: "sora",
        hp: stats::HP,
        max_hp: stats::MAX_HP,
        mp: stats::MP,
        max_mp: stats::MAX_MP,
    };

    pub const DONALD: Member = Member {
        name: "donald",
        hp: stats::DONALD_HP,
        max_hp: stats::DONALD_MAX_HP,
        mp: stats::DONALD_MP,
        max_mp: stats::DONALD_MAX_MP,
    };

    pub const GOOFY: Member = Member {
        name: "goofy",
        hp: stats::GOOFY_HP,
        max_hp: stats::GOOFY_MAX_HP,
        mp: stats::GOOFY_MP,
        max_mp: stats::GOOFY_MAX_MP,
    };
}

/// Hold a 16-bit stat at a fixed value or at its maximum
fn hold(ctx: &mut HookContext<'_>, phase: &'static str, current: u64, max: u64, pin: Option<u16>) -> bool {
    let mut steps = ctx.steps(phase);
    let value = match pin {
        Some(value) => Some(value),
        None => steps.read("read max", ctx.port.read_u16(max)),
    };
    if let Some(value) = value {
        steps.check("write current", ctx.port.write_u16(current, value));
    }
    steps.finish()
}

/// Refill the full 32-bit word from its maximum
fn refill(ctx: &mut HookContext<'_>, current: u64, max: u64) -> bool {
    let mut steps = ctx.steps("stop");
    if let Some(value) = steps.read("read max", ctx.port.read_u32(max)) {
        steps.check("write current", ctx.port.write_u32(current, value));
    }
    steps.finish()
}

/// `OneShot` pins HP to 1, `Invulnerable` keeps it at max
#[derive(Debug, Clone, Copy)]
pub struct HpLock(pub Member);

impl HpLock {
    fn apply(&self, ctx: &mut HookContext<'_>, phase: &'static str) -> bool {
        let pin = match ctx.variant {
            Variant::OneShot => Some(1),
            Variant::Invulnerable => None,
            _ => return false,
        };
        hold(ctx, phase, self.0.hp, self.0.max_hp, pin)
    }
}

impl EffectHooks for HpLock {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        self.apply(ctx, "start")
    }

    fn refresh(&self, ctx: &mut HookContext<'_>) -> bool {
        self.apply(ctx, "refresh")
    }

    fn stop(&self, ctx: &mut HookContext<'_>) -> bool {
        refill(ctx, self.0.hp, self.0.max_hp)
    }
}

/// `Zero` drains MP, `Unlimited` keeps it at max
#[derive(Debug, Clone, Copy)]
pub struct MpLock(pub Member);

impl MpLock {
    fn apply(&self, ctx: &mut HookContext<'_>, phase: &'static str) -> bool {
        let pin = match ctx.variant {
            Variant::Zero => Some(0),
            Variant::Unlimited => None,
            _ => return false,
        };
        hold(ctx, phase, self.0.mp, self.0.max_mp, pin)
    }
}

impl EffectHooks for MpLock {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        self.apply(ctx, "start")
    }

    fn refresh(&self, ctx: &mut HookContext<'_>) -> bool {
        self.apply(ctx, "refresh")
    }

    fn stop(&self, ctx: &mut HookContext<'_>) -> bool {
        refill(ctx, self.0.mp, self.0.max_mp)
    }
}
