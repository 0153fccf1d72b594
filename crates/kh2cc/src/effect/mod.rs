//! Effect definitions: what an effect does and how the scheduler runs it.

mod baseline;
mod registry;
mod steps;

pub use baseline::{Baseline, Word};
pub use registry::DefinitionRegistry;
pub use steps::{StepResult, Steps};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::port::StatePort;

/// Refresh cadence used when a definition does not set its own
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Which lifecycle template the scheduler drives an effect through
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EffectKind {
    /// Start once, then immediately run the stop follow-up
    Instant,
    /// Start, re-apply every refresh interval, stop at expiry
    RepeatAction,
    /// Start, hold for the duration, stop at expiry
    StartTimed,
}

/// Named behaviour variant selected by a request.
///
/// Several effect ids share one set of hooks and differ only in the variant
/// (e.g. `one_shot_donald` / `invulnerable_donald`); hooks match on it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Variant {
    #[default]
    Default,
    Give,
    Take,
    OneShot,
    Invulnerable,
    Zero,
    Unlimited,
    Pro,
    Ez,
    Random,
    Cross,
    Circle,
    Triangle,
    Square,
    L1,
    R1,
}

/// Everything a hook may touch while it runs
pub struct HookContext<'a> {
    pub port: &'a dyn StatePort,
    pub variant: Variant,
    pub baseline: &'a mut Baseline,
    effect_id: &'a str,
}

impl<'a> HookContext<'a> {
    pub fn new(
        effect_id: &'a str,
        port: &'a dyn StatePort,
        variant: Variant,
        baseline: &'a mut Baseline,
    ) -> Self {
        Self {
            port,
            variant,
            baseline,
            effect_id,
        }
    }

    pub fn effect_id(&self) -> &str {
        self.effect_id
    }

    /// Start a step record tagged with this effect and `phase`
    pub fn steps(&self, phase: &'static str) -> Steps {
        Steps::new(self.effect_id, phase)
    }
}

/// Start/refresh/stop behaviour of an effect.
///
/// Hooks report success as a boolean: partially applied changes against
/// live memory are expected and are handled by retrying, not by unwinding.
/// `stop` must be idempotent and safe to call after a `start` that failed
/// part-way.
pub trait EffectHooks: Send + Sync {
    fn start(&self, ctx: &mut HookContext<'_>) -> bool;

    fn refresh(&self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    fn stop(&self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }
}

/// Immutable descriptor of one effect
#[derive(Clone)]
pub struct EffectDefinition {
    id: String,
    kind: EffectKind,
    duration: Duration,
    refresh_interval: Duration,
    default_variant: Variant,
    variants: Vec<Variant>,
    restore_on_stop_all: bool,
    hooks: Arc<dyn EffectHooks>,
}

impl EffectDefinition {
    pub fn new(id: impl Into<String>, kind: EffectKind, hooks: Arc<dyn EffectHooks>) -> Self {
        Self {
            id: id.into(),
            kind,
            duration: Duration::ZERO,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            default_variant: Variant::Default,
            variants: vec![Variant::Default],
            restore_on_stop_all: false,
            hooks,
        }
    }

    /// How long the effect lasts once running.
    ///
    /// Zero never expires: a repeating effect then runs until stopped, and a
    /// refresh waiting on a game that never becomes ready waits until then
    /// too.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the variant used when a request names none.
    ///
    /// Only the default is accepted unless more are added with
    /// [`with_variants`](Self::with_variants).
    pub fn with_default_variant(mut self, variant: Variant) -> Self {
        self.default_variant = variant;
        if !self.variants.contains(&variant) {
            self.variants = vec![variant];
        }
        self
    }

    pub fn with_variants(mut self, variants: &[Variant]) -> Self {
        self.variants = variants.to_vec();
        if !self.variants.contains(&self.default_variant) {
            self.variants.insert(0, self.default_variant);
        }
        self
    }

    /// Allow stop-all to run this effect's stop hook even when it is idle
    pub fn with_restore_on_stop_all(mut self, restore: bool) -> Self {
        self.restore_on_stop_all = restore;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn expires(&self) -> bool {
        !self.duration.is_zero()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn default_variant(&self) -> Variant {
        self.default_variant
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn accepts(&self, variant: Variant) -> bool {
        self.variants.contains(&variant)
    }

    pub fn restore_on_stop_all(&self) -> bool {
        self.restore_on_stop_all
    }

    pub fn hooks(&self) -> &Arc<dyn EffectHooks> {
        &self.hooks
    }
}

impl fmt::Debug for EffectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDefinition")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("duration", &self.duration)
            .field("refresh_interval", &self.refresh_interval)
            .field("default_variant", &self.default_variant)
            .field("variants", &self.variants)
            .field("restore_on_stop_all", &self.restore_on_stop_all)
            .finish_non_exhaustive()
    }
}
