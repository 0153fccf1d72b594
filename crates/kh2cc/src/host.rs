//! Host-facing facade.
//!
//! The host speaks in effect ids and variant names and only wants a
//! yes/no-style answer back; terminal reports arrive through
//! [`EffectHost::on_finished`].

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog;
use crate::config::Config;
use crate::effect::Variant;
use crate::error::Result;
use crate::oracle::{GameStateOracle, HealingMonitor, TPoseFix};
use crate::port::StatePort;
use crate::scheduler::{
    InstanceId, InstanceReport, Rejection, Scheduler, StartRequest, StopStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartStatus {
    Accepted(InstanceId),
    UnknownEffect,
    Rejected(Rejection),
}

impl StartStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StartStatus::Accepted(_))
    }
}

pub struct EffectHost {
    scheduler: Scheduler,
    healing: Option<HealingMonitor>,
}

impl EffectHost {
    /// Build the KH2FM catalog against `port` and start the healing monitor
    /// if enabled
    pub fn new(
        port: Arc<dyn StatePort>,
        oracle: Arc<dyn GameStateOracle>,
        config: &Config,
    ) -> Result<Self> {
        let (definitions, conflicts) = catalog::build(config.conflicts.policy)?;
        let scheduler = Scheduler::new(
            definitions,
            conflicts,
            Arc::clone(&port),
            oracle,
            config.scheduler(),
        );

        let healing = if config.healing.enabled {
            Some(HealingMonitor::spawn(
                port,
                Arc::new(TPoseFix),
                config.healing_interval(),
            )?)
        } else {
            debug!("Healing monitor disabled");
            None
        };

        Ok(Self { scheduler, healing })
    }

    pub fn from_scheduler(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            healing: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Ask for an effect; `variant` names a [`Variant`] in snake_case
    pub fn start_effect(&self, effect_id: &str, variant: Option<&str>) -> StartStatus {
        let mut request = StartRequest::new(effect_id);
        if let Some(name) = variant {
            match Variant::from_str(name) {
                Ok(variant) => request = request.with_variant(variant),
                Err(_) => return StartStatus::Rejected(Rejection::UnknownVariant(name.to_string())),
            }
        }

        match self.scheduler.request_start(request) {
            // Reports are delivered through the finished listener
            Ok(ticket) => StartStatus::Accepted(ticket.instance()),
            Err(Rejection::UnknownEffect(id)) => {
                info!("Unknown effect requested: {}", id);
                StartStatus::UnknownEffect
            }
            Err(rejection) => StartStatus::Rejected(rejection),
        }
    }

    pub fn stop_effect(&self, effect_id: &str) -> StopStatus {
        self.scheduler.request_stop(effect_id)
    }

    /// True only if every stop hook that ran succeeded
    pub fn stop_all_effects(&self) -> bool {
        self.scheduler.stop_all().success()
    }

    pub fn on_finished<F>(&self, callback: F)
    where
        F: Fn(&InstanceReport) + Send + Sync + 'static,
    {
        self.scheduler.set_listener(Arc::new(callback));
    }

    /// Corrective writes made by the healing monitor so far
    pub fn healing_corrections(&self) -> usize {
        self.healing.as_ref().map_or(0, HealingMonitor::corrections)
    }
}
