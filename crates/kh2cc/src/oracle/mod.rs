//! Readiness checks gating when effects may start or continue.
//!
//! The scheduler only ever asks a yes/no question through
//! [`GameStateOracle`]. [`Kh2Oracle`] answers it from the game's state words;
//! the [`healing`] module holds the background self-repair loop that runs
//! next to it.

pub mod healing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::catalog::addresses::state;
use crate::port::StatePort;

pub use healing::{HealAction, HealingMonitor, SelfHeal, TPoseFix};

/// "Is the game in a state where effects may be applied right now?"
pub trait GameStateOracle: Send + Sync {
    fn is_ready(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, IntoStaticStr, Display)]
pub enum GameState {
    #[default]
    Unknown,
    /// Player has control on the field
    Ready,
    /// On the field but the camera is locked
    Uncontrollable,
    Dead,
    Pause,
    Cutscene,
}

impl GameState {
    /// Classify the raw state words.
    ///
    /// Any combination not matching a known pattern is `Unknown`.
    pub fn classify(game_state: u32, animation_pointer: u32, camera_lock: u32, transition: u32) -> Self {
        let animating = animation_pointer != 0;
        match (game_state, camera_lock, transition, animating) {
            (1, 0, 1, true) => GameState::Ready,
            (1, 1, 1, true) => GameState::Uncontrollable,
            (0, 0, 0, false) => GameState::Dead,
            (0, 0, 1, true) => GameState::Pause,
            (1, 1, 0, false) => GameState::Cutscene,
            _ => GameState::Unknown,
        }
    }
}

/// Oracle backed by the KH2FM state words
pub struct Kh2Oracle {
    port: Arc<dyn StatePort>,
    last_state: Mutex<GameState>,
}

impl Kh2Oracle {
    pub fn new(port: Arc<dyn StatePort>) -> Self {
        Self {
            port,
            last_state: Mutex::new(GameState::Unknown),
        }
    }

    /// Read the state words and classify them; a failed read is `Unknown`
    pub fn detect(&self) -> GameState {
        let state = match self.read_words() {
            Ok((game, anim, camera, transition)) => {
                GameState::classify(game, anim, camera, transition)
            }
            Err(e) => {
                debug!("Game state read failed: {}", e);
                GameState::Unknown
            }
        };

        let mut last = self.last_state.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != state {
            debug!("Game state changed: {} -> {}", *last, state);
            *last = state;
        }
        state
    }

    pub fn last_state(&self) -> GameState {
        *self.last_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_words(&self) -> crate::Result<(u32, u32, u32, u32)> {
        Ok((
            self.port.read_u32(state::GAME_STATE)?,
            self.port.read_u32(state::ANIMATION_STATE_POINTER)?,
            self.port.read_u32(state::CAMERA_LOCK)?,
            self.port.read_u32(state::TRANSITION_STATE)?,
        ))
    }
}

impl GameStateOracle for Kh2Oracle {
    fn is_ready(&self) -> bool {
        self.detect() == GameState::Ready
    }
}

/// Oracle with a fixed answer that can be flipped at runtime
#[derive(Debug, Default)]
pub struct StaticOracle {
    ready: AtomicBool,
}

impl StaticOracle {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl GameStateOracle for StaticOracle {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Oracle answering through a closure
pub struct FnOracle<F>(pub F);

impl<F> GameStateOracle for FnOracle<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_ready(&self) -> bool {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SimulatedPort;

    fn port_with(game: u32, anim: u32, camera: u32, transition: u32) -> Arc<SimulatedPort> {
        Arc::new(
            SimulatedPort::builder()
                .write_u32(state::GAME_STATE, game)
                .write_u32(state::ANIMATION_STATE_POINTER, anim)
                .write_u32(state::CAMERA_LOCK, camera)
                .write_u32(state::TRANSITION_STATE, transition)
                .build(),
        )
    }

    #[test]
    fn test_classify_known_states() {
        assert_eq!(GameState::classify(1, 0x100, 0, 1), GameState::Ready);
        assert_eq!(GameState::classify(1, 0x100, 1, 1), GameState::Uncontrollable);
        assert_eq!(GameState::classify(0, 0, 0, 0), GameState::Dead);
        assert_eq!(GameState::classify(0, 0x100, 0, 1), GameState::Pause);
        assert_eq!(GameState::classify(1, 0, 1, 0), GameState::Cutscene);
        assert_eq!(GameState::classify(2, 0x100, 0, 1), GameState::Unknown);
    }

    #[test]
    fn test_kh2_oracle_ready() {
        let oracle = Kh2Oracle::new(port_with(1, 0x0150_0000, 0, 1));
        assert!(oracle.is_ready());
        assert_eq!(oracle.last_state(), GameState::Ready);
    }

    #[test]
    fn test_kh2_oracle_cutscene_not_ready() {
        let oracle = Kh2Oracle::new(port_with(1, 0, 1, 0));
        assert!(!oracle.is_ready());
        assert_eq!(oracle.detect(), GameState::Cutscene);
    }

    #[test]
    fn test_kh2_oracle_read_failure_is_unknown() {
        let port = port_with(1, 0x0150_0000, 0, 1);
        port.set_fail_reads(true);
        let oracle = Kh2Oracle::new(port);
        assert_eq!(oracle.detect(), GameState::Unknown);
        assert!(!oracle.is_ready());
    }

    #[test]
    fn test_static_and_fn_oracles() {
        let oracle = StaticOracle::new(false);
        assert!(!oracle.is_ready());
        oracle.set_ready(true);
        assert!(oracle.is_ready());

        let oracle = FnOracle(|| true);
        assert!(oracle.is_ready());
    }
}
