//! `AfkMover`: the control handle around one running reconciliation worker.
//!
//! The worker owns the engine. Everyone else talks to it through the task's
//! command channel; replies come back on a oneshot.

use std::sync::Arc;

use afk_config::AfkConfig;
use afk_policy::{MuteThresholds, PolicyResolver, PolicyWindow};
use afk_reconcile::{
    Connector, CycleReport, EngineStateDump, Policy, ReconcileError, ReconciliationEngine,
};
use afk_schemas::{ChannelId, ClientId};
use chrono::Duration;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{Clock, Periodic, PeriodicTask};

const EVENT_BUS_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { run_id: Uuid },
    AlreadyRunning { run_id: Uuid },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { run_id: Uuid },
    NotRunning,
}

/// Broadcast to subscribers as the worker acts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoverEvent {
    Started {
        run_id: Uuid,
    },
    Parked {
        client: ClientId,
        from: ChannelId,
        to: ChannelId,
    },
    Restored {
        client: ClientId,
        to: ChannelId,
    },
    MoveFailed {
        client: ClientId,
        channel: ChannelId,
        reason: String,
    },
    CycleSkipped {
        reason: String,
    },
    Stopped {
        run_id: Uuid,
    },
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

enum WorkerCommand {
    DumpState(oneshot::Sender<EngineStateDump>),
    ClientLeft(ClientId),
    Reconfigure(MuteThresholds),
}

struct MoverWorker<C: ?Sized> {
    engine: ReconciliationEngine,
    connector: Arc<C>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    events: broadcast::Sender<MoverEvent>,
}

impl<C: Connector + ?Sized + 'static> MoverWorker<C> {
    fn publish(&self, report: CycleReport) {
        // No subscribers is fine.
        if let Some(e) = report.skipped {
            let _ = self.events.send(MoverEvent::CycleSkipped {
                reason: e.to_string(),
            });
            return;
        }
        for m in report.restored {
            let _ = self.events.send(MoverEvent::Restored {
                client: m.client,
                to: m.to,
            });
        }
        for m in report.parked {
            let _ = self.events.send(MoverEvent::Parked {
                client: m.client,
                from: m.from,
                to: m.to,
            });
        }
        for e in report.failed {
            if let ReconcileError::MoveFailed {
                client,
                channel,
                cause,
            } = e
            {
                let _ = self.events.send(MoverEvent::MoveFailed {
                    client,
                    channel,
                    reason: cause.to_string(),
                });
            }
        }
    }
}

impl<C: Connector + ?Sized + 'static> Periodic for MoverWorker<C> {
    type Command = WorkerCommand;

    fn tick(&mut self) {
        let now = self.clock.now();
        let report = self
            .engine
            .run_cycle(self.connector.as_ref(), now, &mut self.rng);
        self.publish(report);
    }

    fn handle(&mut self, cmd: WorkerCommand) {
        match cmd {
            WorkerCommand::DumpState(reply) => {
                // Caller may have given up waiting.
                let _ = reply.send(self.engine.dump_state());
            }
            WorkerCommand::ClientLeft(client) => self.engine.client_left(client),
            WorkerCommand::Reconfigure(thresholds) => {
                debug!(
                    work_secs = thresholds.work.num_seconds(),
                    off_secs = thresholds.off.num_seconds(),
                    "thresholds updated"
                );
                self.engine.set_thresholds(thresholds);
            }
        }
    }

    fn shutdown(&mut self) {
        self.engine.reset();
        info!("afk mover worker exiting");
    }
}

struct RunningWorker {
    run_id: Uuid,
    task: PeriodicTask<WorkerCommand>,
}

/// Thresholds set through `reconfigure*`, per window. Each one wins over the
/// configured value of its window on every later start; the other window
/// keeps whatever the configuration says.
#[derive(Clone, Copy, Debug, Default)]
struct ThresholdOverrides {
    work: Option<Duration>,
    off: Option<Duration>,
}

impl ThresholdOverrides {
    fn set(&mut self, window: PolicyWindow, threshold: Duration) {
        match window {
            PolicyWindow::Work => self.work = Some(threshold),
            PolicyWindow::Off => self.off = Some(threshold),
        }
    }

    fn apply(&self, mut thresholds: MuteThresholds) -> MuteThresholds {
        if let Some(d) = self.work {
            thresholds.work = d;
        }
        if let Some(d) = self.off {
            thresholds.off = d;
        }
        thresholds
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

pub struct AfkMover<C: ?Sized> {
    connector: Arc<C>,
    clock: Arc<dyn Clock>,
    /// Schedule and thresholds in force: from the configuration given at
    /// construction, then from each start, adjusted by `reconfigure*`.
    resolver: PolicyResolver,
    overrides: ThresholdOverrides,
    rng_seed: Option<u64>,
    events: broadcast::Sender<MoverEvent>,
    worker: Option<RunningWorker>,
}

impl<C: Connector + ?Sized + 'static> AfkMover<C> {
    /// `resolver` is the configured policy (`AfkConfig::policy_resolver`);
    /// it answers `current_threshold` and `reconfigure` before the first start.
    pub fn new(connector: Arc<C>, clock: Arc<dyn Clock>, resolver: PolicyResolver) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            connector,
            clock,
            resolver,
            overrides: ThresholdOverrides::default(),
            rng_seed: None,
            events,
            worker: None,
        }
    }

    /// Deterministic placement for tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MoverEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.task.is_finished())
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.worker.as_ref().map(|w| w.run_id)
    }

    /// Resolve channels and spawn the worker. Must be called inside a Tokio
    /// runtime.
    pub fn start(&mut self, config: &AfkConfig) -> Result<StartOutcome, ReconcileError> {
        if let Some(w) = &self.worker {
            if !w.task.is_finished() {
                return Ok(StartOutcome::AlreadyRunning { run_id: w.run_id });
            }
        }
        // A worker that died on its own is forgotten here.
        self.worker = None;

        let mut policy = Policy::resolve(self.connector.as_ref(), config).map_err(|e| {
            error!(error = %e, "afk mover refused to start");
            e
        })?;
        let thresholds = self.overrides.apply(policy.resolver.thresholds);
        policy.set_thresholds(thresholds);
        self.resolver = policy.resolver.clone();

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            holding_channel = %policy.holding_channel,
            exempt = policy.exempt_channels.len(),
            overrides = policy.overrides.len(),
            poll_interval_ms = config.poll_interval_ms,
            "afk mover started"
        );

        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let worker = MoverWorker {
            engine: ReconciliationEngine::new(policy),
            connector: self.connector.clone(),
            clock: self.clock.clone(),
            rng,
            events: self.events.clone(),
        };
        let task = PeriodicTask::spawn(
            worker,
            config.poll_interval(),
            info_span!("afk_mover", %run_id),
        );
        self.worker = Some(RunningWorker { run_id, task });
        let _ = self.events.send(MoverEvent::Started { run_id });

        Ok(StartOutcome::Started { run_id })
    }

    /// Signal the worker and wait for it to exit. Engine state is dropped.
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(w) = self.worker.take() else {
            return StopOutcome::NotRunning;
        };
        if let Err(e) = w.task.stop().await {
            warn!(run_id = %w.run_id, error = %e, "afk mover worker did not exit cleanly");
        }
        info!(run_id = %w.run_id, "afk mover stopped");
        let _ = self.events.send(MoverEvent::Stopped { run_id: w.run_id });
        StopOutcome::Stopped { run_id: w.run_id }
    }

    /// Set the threshold of the window active now. Returns that window.
    pub fn reconfigure(&mut self, threshold: Duration) -> Result<PolicyWindow, ReconcileError> {
        let window = self.resolver.window_at(self.clock.now());
        self.reconfigure_window(window, threshold)?;
        Ok(window)
    }

    pub fn reconfigure_window(
        &mut self,
        window: PolicyWindow,
        threshold: Duration,
    ) -> Result<(), ReconcileError> {
        let mut thresholds = self.resolver.thresholds;
        thresholds.set(window, threshold)?;

        self.resolver.thresholds = thresholds;
        self.overrides.set(window, threshold);
        info!(%window, threshold_secs = threshold.num_seconds(), "mute threshold changed");

        if let Some(w) = &self.worker {
            if !w.task.send(WorkerCommand::Reconfigure(thresholds)) {
                warn!(run_id = %w.run_id, "worker gone; threshold kept for next start");
            }
        }
        Ok(())
    }

    /// Window and threshold in force now.
    pub fn current_threshold(&self) -> (PolicyWindow, Duration) {
        let now = self.clock.now();
        (
            self.resolver.window_at(now),
            self.resolver.threshold_for(now),
        )
    }

    /// `None` while stopped.
    pub async fn dump_state(&self) -> Option<EngineStateDump> {
        let w = self.worker.as_ref()?;
        let (tx, rx) = oneshot::channel();
        if !w.task.send(WorkerCommand::DumpState(tx)) {
            return None;
        }
        rx.await.ok()
    }

    /// Disconnect notification; ignored while stopped.
    pub fn client_left(&self, client: ClientId) {
        if let Some(w) = &self.worker {
            let _ = w.task.send(WorkerCommand::ClientLeft(client));
        }
    }
}
