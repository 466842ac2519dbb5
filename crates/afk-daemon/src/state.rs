//! Shared state for afk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>`. The mover sits behind an async
//! mutex because start/stop take `&mut`; engine state itself is owned by the
//! mover's worker, never by the daemon.

use std::sync::Arc;

use afk_config::AfkConfig;
use afk_reconcile::Connector;
use afk_runtime::{AfkMover, Clock, StartOutcome};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

pub type SharedMover = AfkMover<dyn Connector>;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

pub struct AppState {
    pub build: BuildInfo,
    /// Configuration used for every start request.
    pub config: AfkConfig,
    pub mover: Mutex<SharedMover>,
}

impl AppState {
    /// The mover answers threshold queries from `config` until it is started.
    pub fn new(
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        config: AfkConfig,
    ) -> anyhow::Result<Self> {
        let resolver = config
            .policy_resolver()
            .context("afk policy from configuration")?;
        Ok(Self::with_mover(
            AfkMover::new(connector, clock, resolver),
            config,
        ))
    }

    pub fn with_mover(mover: SharedMover, config: AfkConfig) -> Self {
        Self {
            build: BuildInfo {
                service: "afk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config,
            mover: Mutex::new(mover),
        }
    }

    /// Start the mover at boot when `afk.auto_start` is set.
    ///
    /// Refusing to start is an error here: a daemon configured to run but
    /// unable to resolve its channels should not come up silently idle.
    pub async fn boot(&self) -> anyhow::Result<Option<StartOutcome>> {
        if !self.config.auto_start {
            info!("auto_start disabled; afk mover idle until started");
            return Ok(None);
        }
        let outcome = self
            .mover
            .lock()
            .await
            .start(&self.config)
            .context("afk mover auto-start failed")?;
        Ok(Some(outcome))
    }
}
