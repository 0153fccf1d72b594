//! # kh2cc
//!
//! Durational-effect scheduler for the Kingdom Hearts II Final Mix effect
//! pack.
//!
//! This crate provides:
//! - A state-port abstraction over emulator memory, with an in-process simulator
//! - Effect definitions with start/refresh/stop hooks and per-instance baselines
//! - Conflict registry with configurable handling of one-sided entries
//! - Game-state oracle and a background T-pose healing monitor
//! - The scheduler: admission, conflict holds, per-instance worker threads
//! - The KH2FM effect catalog and a host-facing facade

pub mod catalog;
pub mod config;
pub mod conflict;
pub mod effect;
pub mod error;
pub mod host;
pub mod oracle;
pub mod port;
pub mod scheduler;
pub mod signal;

pub use config::{Config, SchedulerConfig, SchedulerConfigBuilder};
pub use conflict::{ConflictRegistry, SymmetryPolicy};
pub use effect::{
    Baseline, DefinitionRegistry, EffectDefinition, EffectHooks, EffectKind, HookContext,
    Steps, Variant,
};
pub use error::{Error, Result};
pub use host::{EffectHost, StartStatus};
pub use oracle::{FnOracle, GameState, GameStateOracle, HealingMonitor, Kh2Oracle, StaticOracle};
pub use port::{SimulatedPort, StatePort};
pub use scheduler::{
    EffectTicket, InstanceId, InstanceOutcome, InstanceReport, InstanceSnapshot, InstanceState,
    Rejection, Scheduler, StartRequest, StopAllReport, StopStatus,
};
pub use signal::{CancelReason, CancelSignal};
