//! Forced button presses.
//!
//! The variant picks the button; `random` draws a new one on every refresh.

use rand::Rng;

use crate::effect::{EffectHooks, HookContext, Variant};

use super::addresses::buttons;

/// Pad state written for one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub name: &'static str,
    /// Value of the pressed/down words with only this button held
    pub value: u8,
    pub mask: u8,
}

impl Button {
    pub const TRIANGLE: Button = Button { name: "triangle", value: 0xEF, mask: 0x10 };
    pub const CROSS: Button = Button { name: "cross", value: 0xDF, mask: 0x20 };
    pub const CIRCLE: Button = Button { name: "circle", value: 0xBF, mask: 0x40 };
    pub const SQUARE: Button = Button { name: "square", value: 0x7F, mask: 0x80 };
    pub const L1: Button = Button { name: "l1", value: 0xFB, mask: 0x04 };
    pub const R1: Button = Button { name: "r1", value: 0xF7, mask: 0x08 };

    pub const ALL: [Button; 6] = [
        Self::CROSS,
        Self::CIRCLE,
        Self::TRIANGLE,
        Self::SQUARE,
        Self::L1,
        Self::R1,
    ];

    pub fn for_variant(variant: Variant) -> Option<Button> {
        match variant {
            Variant::Cross => Some(Self::CROSS),
            Variant::Circle => Some(Self::CIRCLE),
            Variant::Triangle => Some(Self::TRIANGLE),
            Variant::Square => Some(Self::SQUARE),
            Variant::L1 => Some(Self::L1),
            Variant::R1 => Some(Self::R1),
            _ => None,
        }
    }

    fn random() -> Button {
        Self::ALL[rand::thread_rng().gen_range(0..Self::ALL.len())]
    }
}

/// Every variant the effect accepts, `random` first
pub const VARIANTS: [Variant; 7] = [
    Variant::Random,
    Variant::Cross,
    Variant::Circle,
    Variant::Triangle,
    Variant::Square,
    Variant::L1,
    Variant::R1,
];

/// Presses the selected button on every refresh; start and stop touch nothing
#[derive(Debug, Default)]
pub struct SpamButtons;

impl EffectHooks for SpamButtons {
    fn start(&self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    fn refresh(&self, ctx: &mut HookContext<'_>) -> bool {
        let mut steps = ctx.steps("refresh");
        let button = match ctx.variant {
            Variant::Random => Some(Button::random()),
            variant => Button::for_variant(variant),
        };
        let Some(button) = button else {
            steps.require("button for variant", false);
            return steps.finish();
        };

        steps.check("pressed", ctx.port.write_u8(buttons::PRESSED, button.value));
        steps.check("down", ctx.port.write_u8(buttons::DOWN, button.value));
        steps.check("mask", ctx.port.write_u8(buttons::MASK, button.mask));
        steps.finish()
    }
}
