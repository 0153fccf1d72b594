//! KH2FM (PS2) memory addresses used by the catalog and the state oracle
//!
//! Addresses are absolute PS2 connector addresses. Constants are grouped by
//! what they describe.

/// Player state words read to decide whether effects may run
pub mod state {
    /// 1 while the field is running
    pub const GAME_STATE: u64 = 0x2035_F314;
    /// Pointer to Sora's animation state block; zero outside the field
    pub const ANIMATION_STATE_POINTER: u64 = 0x2034_1708;
    /// 1 while the camera is locked (cutscenes, reaction commands)
    pub const CAMERA_LOCK: u64 = 0x2033_CC38;
    /// 1 once a room transition has finished
    pub const TRANSITION_STATE: u64 = 0x21C6_0CE0;

    /// Offset of the animation id inside the animation block (relative to
    /// the pointer plus the EE RAM base)
    pub const ANIMATION_ID_OFFSET: u64 = 0x2000_000C;
    /// Offset of the animation status word; zero while stuck in T-pose
    pub const ANIMATION_STATUS_OFFSET: u64 = 0x2000_014C;
    /// Animation id of the idle stance
    pub const ANIMATION_IDLE: u16 = 0x8001;
    /// Animation id written to kick the player out of a stuck pose
    pub const ANIMATION_RESET: u16 = 0x40;
}

/// Party stats
pub mod stats {
    pub const HP: u64 = 0x21C6_C750;
    pub const MAX_HP: u64 = 0x21C6_C754;
    pub const MP: u64 = 0x21C6_C8D0;
    pub const MAX_MP: u64 = 0x21C6_C8D4;

    pub const DONALD_HP: u64 = 0x21C6_C4E8;
    pub const DONALD_MAX_HP: u64 = 0x21C6_C4EC;
    pub const DONALD_MP: u64 = 0x21C6_C668;
    pub const DONALD_MAX_MP: u64 = 0x21C6_C66C;

    pub const GOOFY_HP: u64 = 0x21C6_C280;
    pub const GOOFY_MAX_HP: u64 = 0x21C6_C284;
    pub const GOOFY_MP: u64 = 0x21C6_C400;
    pub const GOOFY_MAX_MP: u64 = 0x21C6_C404;
}

pub mod misc {
    pub const MUNNY: u64 = 0x2032_DF70;
    pub const JUMP_AMOUNT: u64 = 0x2019_1C70;
}

/// Pad input words; each holds one bit per button, active low
pub mod buttons {
    pub const PRESSED: u64 = 0x2034_D45D;
    pub const DOWN: u64 = 0x2034_D4DD;
    /// Active-high mask of buttons the game treats as newly pressed
    pub const MASK: u64 = 0x2034_D3C1;
}
