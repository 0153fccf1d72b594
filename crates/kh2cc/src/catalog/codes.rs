//! Pro / EZ codes: slow HP and MP drift in either direction.

use crate::effect::{EffectHooks, HookContext, Steps, Variant};
use crate::port::StatePort;

use super::addresses::stats;

/// Per-refresh multiplier for each variant
const PRO_FACTOR: f32 = 0.999;
const EZ_FACTOR: f32 = 1.001;

/// Lowest value drift may reach, as a share of the maximum
const FLOOR: f32 = 0.05;

fn drift(value: u32, max: u32, factor: f32) -> u32 {
    let max = max as f32;
    (value as f32 * factor).max(max * FLOOR).min(max) as u32
}

#[derive(Debug, Default)]
pub struct ProEzCodes;

impl ProEzCodes {
    fn drift_stat(port: &dyn StatePort, steps: &mut Steps, current: u64, max: u64, factor: f32) {
        let value = steps.read("read current", port.read_u32(current));
        let limit = steps.read("read max", port.read_u32(max));
        if let (Some(value), Some(limit)) = (value, limit) {
            steps.check("write current", port.write_u32(current, drift(value, limit, factor)));
        }
    }
}

impl EffectHooks for ProEzCodes {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool {
        matches!(ctx.variant, Variant::Pro | Variant::Ez)
    }

    fn refresh(&self, ctx: &mut HookContext<'_>) -> bool {
        let factor = match ctx.variant {
            Variant::Pro => PRO_FACTOR,
            Variant::Ez => EZ_FACTOR,
            _ => return false,
        };

        let mut steps = ctx.steps("refresh");
        Self::drift_stat(ctx.port, &mut steps, stats::HP, stats::MAX_HP, factor);
        Self::drift_stat(ctx.port, &mut steps, stats::MP, stats::MAX_MP, factor);
        steps.finish()
    }
}
