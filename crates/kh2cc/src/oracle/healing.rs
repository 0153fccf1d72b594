//! Background self-repair of known-bad transient game states.
//!
//! Some effects can leave the player frozen in a T-pose. A monitor thread
//! checks for that once per interval and issues a single corrective write
//! when it sees it. The check itself is a pluggable [`SelfHeal`] strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::addresses::state;
use crate::error::Result;
use crate::port::StatePort;
use crate::signal::{CancelReason, CancelSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealAction {
    /// Nothing wrong
    Healthy,
    /// Bad state found and the corrective write went through
    Corrected,
    /// Bad state found but fixing it now is unsafe
    Skipped,
    /// Could not read or write the state
    Failed,
}

pub trait SelfHeal: Send + Sync {
    fn name(&self) -> &'static str;

    fn heal(&self, port: &dyn StatePort) -> HealAction;
}

/// Detects the player stuck in a T-pose and resets the animation id.
///
/// The reset is only written while the camera is free; during a locked
/// camera the pose is usually scripted.
#[derive(Debug, Default, Clone, Copy)]
pub struct TPoseFix;

impl TPoseFix {
    fn is_stuck(port: &dyn StatePort) -> Result<Option<u64>> {
        let block = port.read_u64(state::ANIMATION_STATE_POINTER)?;
        let status = port.read_u32(block.wrapping_add(state::ANIMATION_STATUS_OFFSET))?;
        Ok((status == 0).then_some(block))
    }
}

impl SelfHeal for TPoseFix {
    fn name(&self) -> &'static str {
        "t-pose"
    }

    fn heal(&self, port: &dyn StatePort) -> HealAction {
        let block = match Self::is_stuck(port) {
            Ok(Some(block)) => block,
            Ok(None) => return HealAction::Healthy,
            Err(e) if e.is_transient() => {
                debug!("T-pose check failed: {}", e);
                return HealAction::Failed;
            }
            Err(e) => {
                warn!("T-pose check failed: {}", e);
                return HealAction::Failed;
            }
        };

        match port.read_u8(state::CAMERA_LOCK) {
            Ok(0) => {}
            Ok(_) => return HealAction::Skipped,
            Err(_) => return HealAction::Failed,
        }

        let id_address = block.wrapping_add(state::ANIMATION_ID_OFFSET);
        match port.read_u16(id_address) {
            Ok(state::ANIMATION_IDLE) => HealAction::Healthy,
            Ok(_) => match port.write_u16(id_address, state::ANIMATION_RESET) {
                Ok(()) => HealAction::Corrected,
                Err(_) => HealAction::Failed,
            },
            Err(_) => HealAction::Failed,
        }
    }
}

/// Runs a [`SelfHeal`] strategy on its own thread at a fixed cadence
pub struct HealingMonitor {
    signal: Arc<CancelSignal>,
    corrections: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl HealingMonitor {
    pub fn spawn(
        port: Arc<dyn StatePort>,
        strategy: Arc<dyn SelfHeal>,
        interval: Duration,
    ) -> Result<Self> {
        let signal = Arc::new(CancelSignal::new());
        let corrections = Arc::new(AtomicUsize::new(0));

        let thread_signal = Arc::clone(&signal);
        let thread_corrections = Arc::clone(&corrections);
        let handle = thread::Builder::new()
            .name(format!("heal-{}", strategy.name()))
            .spawn(move || {
                debug!("Healing monitor '{}' started", strategy.name());
                while !thread_signal.wait(interval) {
                    match strategy.heal(port.as_ref()) {
                        HealAction::Corrected => {
                            thread_corrections.fetch_add(1, Ordering::SeqCst);
                            info!("Healing monitor '{}' corrected game state", strategy.name());
                        }
                        HealAction::Failed => {
                            debug!("Healing monitor '{}' could not check state", strategy.name());
                        }
                        HealAction::Healthy | HealAction::Skipped => {}
                    }
                }
                debug!("Healing monitor '{}' stopped", strategy.name());
            })?;

        Ok(Self {
            signal,
            corrections,
            handle: Some(handle),
        })
    }

    /// Number of corrective writes issued so far
    pub fn corrections(&self) -> usize {
        self.corrections.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.signal.cancel(CancelReason::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Healing monitor thread panicked");
        }
    }
}

impl Drop for HealingMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
