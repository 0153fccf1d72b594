//! Effects on Sora's own stats and inventory.

use crate::effect::{EffectHooks, HookContext, Variant};

use super::addresses::{misc, stats};

/// Set a u32 stat to its maximum
pub(super) fn refill(ctx: &mut HookContext<'_>, phase: &'static str, max: u64, current: u64) -> bool {
    let mut steps = ctx.steps(phase);
    if let Some(value) = steps.read("read max", ctx.port.read_u32(max)) {
        steps.check("write current", ctx.port.write_u32(current, value));
    }
    steps.finish()
}

/// HP pinned to 1; stop refills to max
#[derive(Debug, Default)]
pub struct OneShotSora;

impl EffectHooks for OneShotSora {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("start");
        steps.check("hp = 1", ctx.port.write_u32(stats::HP, 1));
        steps.finish()
    }

    fn refresh(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("refresh");
        steps.check("hp = 1", ctx.port.write_u32(stats::HP, 1));
        steps.finish()
    }

    fn stop(&self, ctx: &mut HookContext<'_>) -> bool {
        refill(ctx, "stop", stats::MAX_HP, stats::HP)
    }
}

#[derive(Debug, Default)]
pub struct HealSora;

impl EffectHooks for HealSora {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        refill(ctx, "start", stats::MAX_HP, stats::HP)
    }
}

/// HP and max HP held at 999; both restored from the baseline at stop
#[derive(Debug, Default)]
pub struct Invulnerability;

impl Invulnerability {
    pub const HP: u32 = 999;
}

impl EffectHooks for Invulnerability {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("start");
        steps.read("capture hp", ctx.baseline.capture_u32(ctx.port, stats::HP));
        steps.read("capture max hp", ctx.baseline.capture_u32(ctx.port, stats::MAX_HP));
        steps.finish()
    }

    fn refresh(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("refresh");
        steps.check("hp = 999", ctx.port.write_u32(stats::HP, Self::HP));
        steps.check("max hp = 999", ctx.port.write_u32(stats::MAX_HP, Self::HP));
        steps.finish()
    }

    fn stop(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("stop");
        ctx.baseline.restore(ctx.port, &mut steps);
        steps.finish()
    }
}

/// `Give` adds 9999 munny, `Take` empties the wallet
#[derive(Debug, Default)]
pub struct Munny;

impl Munny {
    pub const GIFT: u32 = 9999;
}

impl EffectHooks for Munny {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("start");
        match ctx.variant {
            Variant::Give => {
                if let Some(munny) = steps.read("read munny", ctx.port.read_u32(misc::MUNNY)) {
                    steps.check(
                        "write munny",
                        ctx.port.write_u32(misc::MUNNY, munny.saturating_add(Self::GIFT)),
                    );
                }
            }
            Variant::Take => {
                steps.check("munny = 0", ctx.port.write_u32(misc::MUNNY, 0));
            }
            other => {
                steps.require(format!("unsupported variant {}", other), false);
            }
        }
        steps.finish()
    }
}

/// Jump amount set to zero for the duration
#[derive(Debug, Default)]
pub struct SpaceJump;

impl EffectHooks for SpaceJump {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("start");
        if steps
            .read("capture jump", ctx.baseline.capture_u32(ctx.port, misc::JUMP_AMOUNT))
            .is_some()
        {
            steps.check("jump = 0", ctx.port.write_u32(misc::JUMP_AMOUNT, 0));
        }
        steps.finish()
    }

    fn stop(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("stop");
        ctx.baseline.restore(ctx.port, &mut steps);
        steps.finish()
    }
}

/// Not implemented for this game; always refuses so nothing is charged
#[derive(Debug, Default)]
pub struct KillSora;

impl EffectHooks for KillSora {
    fn start(&self, _ctx: &mut HookContext<'_>) -> bool {
        false
    }
}
