//! The KH2FM effect catalog.
//!
//! [`definitions`] lists every effect with its lifecycle kind, timing and
//! hooks; [`conflict_entries`] is the hand-written mutual-exclusion table.
//! Neither is validated here: [`build`] feeds both through the registries,
//! which reject unknown ids and apply the symmetry policy.

pub mod addresses;
mod buttons;
mod codes;
mod party;
mod sora;

pub use buttons::{Button, SpamButtons};
pub use codes::ProEzCodes;
pub use party::{HpLock, Member, MpLock};
pub use sora::{HealSora, Invulnerability, KillSora, Munny, OneShotSora, SpaceJump};

use std::sync::Arc;
use std::time::Duration;

use crate::conflict::{ConflictRegistry, SymmetryPolicy};
use crate::effect::{DefinitionRegistry, EffectDefinition, EffectHooks, EffectKind, Variant};
use crate::error::Result;

/// Effect ids as the host sends them
pub mod ids {
    pub const ONE_SHOT_SORA: &str = "one_shot_sora";
    pub const HEAL_SORA: &str = "heal_sora";
    pub const INVULNERABILITY: &str = "invulnerability";
    pub const GIVE_MUNNY: &str = "give_munny";
    pub const TAKE_MUNNY: &str = "take_munny";
    pub const ZERO_MP_SORA: &str = "zero_mp_sora";
    pub const UNLIMITED_MP_SORA: &str = "unlimited_mp_sora";
    pub const ONE_SHOT_DONALD: &str = "one_shot_donald";
    pub const INVULNERABLE_DONALD: &str = "invulnerable_donald";
    pub const ZERO_MP_DONALD: &str = "zero_mp_donald";
    pub const UNLIMITED_MP_DONALD: &str = "unlimited_mp_donald";
    pub const ONE_SHOT_GOOFY: &str = "one_shot_goofy";
    pub const INVULNERABLE_GOOFY: &str = "invulnerable_goofy";
    pub const ZERO_MP_GOOFY: &str = "zero_mp_goofy";
    pub const UNLIMITED_MP_GOOFY: &str = "unlimited_mp_goofy";
    pub const PRO_CODES: &str = "pro_codes";
    pub const EZ_CODES: &str = "ez_codes";
    pub const SPACE_JUMP: &str = "space_jump";
    pub const KILL_SORA: &str = "kill_sora";
    pub const SPAM_BUTTONS: &str = "spam_buttons";
}

/// Duration of every timed effect in the catalog
pub const EFFECT_DURATION: Duration = Duration::from_secs(60);

fn timed(id: &str, kind: EffectKind, hooks: Arc<dyn EffectHooks>) -> EffectDefinition {
    EffectDefinition::new(id, kind, hooks).with_duration(EFFECT_DURATION)
}

/// Every effect the pack offers
pub fn definitions() -> Vec<EffectDefinition> {
    let sora_mp: Arc<dyn EffectHooks> = Arc::new(MpLock(Member::SORA));
    let donald_hp: Arc<dyn EffectHooks> = Arc::new(HpLock(Member::DONALD));
    let donald_mp: Arc<dyn EffectHooks> = Arc::new(MpLock(Member::DONALD));
    let goofy_hp: Arc<dyn EffectHooks> = Arc::new(HpLock(Member::GOOFY));
    let goofy_mp: Arc<dyn EffectHooks> = Arc::new(MpLock(Member::GOOFY));
    let munny: Arc<dyn EffectHooks> = Arc::new(Munny);
    let codes: Arc<dyn EffectHooks> = Arc::new(ProEzCodes);

    let mut defs = vec![
        timed(ids::ONE_SHOT_SORA, EffectKind::RepeatAction, Arc::new(OneShotSora))
            .with_refresh_interval(Duration::from_millis(200))
            .with_restore_on_stop_all(true),
        EffectDefinition::new(ids::HEAL_SORA, EffectKind::Instant, Arc::new(HealSora)),
        timed(ids::INVULNERABILITY, EffectKind::RepeatAction, Arc::new(Invulnerability)),
        EffectDefinition::new(ids::GIVE_MUNNY, EffectKind::Instant, munny.clone())
            .with_default_variant(Variant::Give),
        EffectDefinition::new(ids::TAKE_MUNNY, EffectKind::Instant, munny)
            .with_default_variant(Variant::Take),
    ];

    let locks = [
        (ids::ZERO_MP_SORA, ids::UNLIMITED_MP_SORA, sora_mp, Variant::Zero, Variant::Unlimited),
        (ids::ONE_SHOT_DONALD, ids::INVULNERABLE_DONALD, donald_hp, Variant::OneShot, Variant::Invulnerable),
        (ids::ZERO_MP_DONALD, ids::UNLIMITED_MP_DONALD, donald_mp, Variant::Zero, Variant::Unlimited),
        (ids::ONE_SHOT_GOOFY, ids::INVULNERABLE_GOOFY, goofy_hp, Variant::OneShot, Variant::Invulnerable),
        (ids::ZERO_MP_GOOFY, ids::UNLIMITED_MP_GOOFY, goofy_mp, Variant::Zero, Variant::Unlimited),
    ];
    for (first, second, hooks, first_variant, second_variant) in locks {
        for (id, variant) in [(first, first_variant), (second, second_variant)] {
            defs.push(
                timed(id, EffectKind::RepeatAction, hooks.clone())
                    .with_default_variant(variant)
                    .with_restore_on_stop_all(true),
            );
        }
    }

    defs.extend([
        timed(ids::PRO_CODES, EffectKind::RepeatAction, codes.clone())
            .with_refresh_interval(Duration::from_secs(2))
            .with_default_variant(Variant::Pro),
        timed(ids::EZ_CODES, EffectKind::RepeatAction, codes)
            .with_refresh_interval(Duration::from_secs(2))
            .with_default_variant(Variant::Ez),
        timed(ids::SPACE_JUMP, EffectKind::StartTimed, Arc::new(SpaceJump)),
        timed(ids::SPAM_BUTTONS, EffectKind::RepeatAction, Arc::new(SpamButtons))
            .with_refresh_interval(Duration::from_millis(100))
            .with_default_variant(Variant::Random)
            .with_variants(&buttons::VARIANTS),
        EffectDefinition::new(ids::KILL_SORA, EffectKind::Instant, Arc::new(KillSora)),
    ]);
    defs
}

/// Mutual-exclusion lists as authored.
///
/// The lists are not symmetric: `pro_codes` names `heal_sora` but
/// `heal_sora` names nothing, for example.
pub fn conflict_entries() -> Vec<(&'static str, Vec<&'static str>)> {
    use ids::*;

    let sora_stats = [HEAL_SORA, ONE_SHOT_SORA, INVULNERABILITY];
    let sora_mp = [ZERO_MP_SORA, UNLIMITED_MP_SORA];
    let codes = [PRO_CODES, EZ_CODES];

    let mut entries = vec![(ONE_SHOT_SORA, sora_stats.to_vec())];
    for id in sora_mp {
        entries.push((id, [&sora_mp[..], &codes[..]].concat()));
    }
    for (a, b) in [
        (ONE_SHOT_DONALD, INVULNERABLE_DONALD),
        (ZERO_MP_DONALD, UNLIMITED_MP_DONALD),
        (ONE_SHOT_GOOFY, INVULNERABLE_GOOFY),
        (ZERO_MP_GOOFY, UNLIMITED_MP_GOOFY),
    ] {
        entries.push((a, vec![a, b]));
        entries.push((b, vec![a, b]));
    }
    for id in codes {
        entries.push((id, [&sora_stats[..], &sora_mp[..], &codes[..]].concat()));
    }
    entries.push((KILL_SORA, vec![KILL_SORA]));
    entries
}

pub fn registry() -> Result<DefinitionRegistry> {
    DefinitionRegistry::from_definitions(definitions())
}

/// Build both registries for the catalog under `policy`
pub fn build(policy: SymmetryPolicy) -> Result<(DefinitionRegistry, ConflictRegistry)> {
    let definitions = registry()?;
    let conflicts = ConflictRegistry::from_entries(conflict_entries(), &definitions, policy)?;
    Ok((definitions, conflicts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_catalog_ids_unique() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), definitions().len());
        assert_eq!(registry.len(), 20);
    }

    #[test]
    fn test_catalog_timing() {
        let registry = registry().unwrap();

        let one_shot = registry.get(ids::ONE_SHOT_SORA).unwrap();
        assert_eq!(one_shot.kind(), EffectKind::RepeatAction);
        assert_eq!(one_shot.duration(), Duration::from_secs(60));
        assert_eq!(one_shot.refresh_interval(), Duration::from_millis(200));
        assert!(one_shot.restore_on_stop_all());

        let codes = registry.get(ids::EZ_CODES).unwrap();
        assert_eq!(codes.refresh_interval(), Duration::from_secs(2));
        assert_eq!(codes.default_variant(), Variant::Ez);

        assert_eq!(registry.get(ids::HEAL_SORA).unwrap().kind(), EffectKind::Instant);
        assert_eq!(registry.get(ids::SPACE_JUMP).unwrap().kind(), EffectKind::StartTimed);
        assert_eq!(
            registry.get(ids::INVULNERABLE_GOOFY).unwrap().default_variant(),
            Variant::Invulnerable
        );
    }

    #[test]
    fn test_spam_buttons_offers_every_button() {
        let registry = registry().unwrap();
        let spam = registry.get(ids::SPAM_BUTTONS).unwrap();

        assert_eq!(spam.default_variant(), Variant::Random);
        assert_eq!(spam.variants().len(), 7);
        assert!(spam.accepts(Variant::Triangle));
        assert!(spam.accepts(Variant::R1));
        assert!(!spam.accepts(Variant::Give));
    }

    #[test]
    fn test_symmetrized_conflicts() {
        let (_, conflicts) = build(SymmetryPolicy::Symmetrize).unwrap();

        assert!(conflicts.in_conflict(ids::PRO_CODES, ids::HEAL_SORA));
        assert!(conflicts.conflicts(ids::HEAL_SORA).any(|id| id == ids::PRO_CODES));
        assert!(conflicts.conflict_set(ids::HEAL_SORA).contains(ids::ONE_SHOT_SORA));
        assert!(!conflicts.in_conflict(ids::ONE_SHOT_DONALD, ids::ONE_SHOT_GOOFY));
        assert!(!conflicts.asymmetries().is_empty());
    }

    #[test]
    fn test_strict_policy_rejects_catalog() {
        let err = build(SymmetryPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_as_written_keeps_one_sided_entries() {
        let (_, conflicts) = build(SymmetryPolicy::AsWritten).unwrap();
        assert_eq!(conflicts.conflicts(ids::HEAL_SORA).count(), 0);
        assert!(conflicts.in_conflict(ids::HEAL_SORA, ids::PRO_CODES));
    }
}
