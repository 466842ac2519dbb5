//! Cancellable fixed-interval task.
//!
//! The worker owns its state. The loop waits on three things at once: the
//! stop signal, the command channel, and the next tick. That wait is the
//! only suspension point; `tick` and `handle` run to completion.
//!
//! The first tick fires one full interval after spawn. Missed ticks are
//! delayed, never bunched.
//!
//! `tick` may block on I/O. On a multi-thread runtime it runs under
//! `block_in_place`, so the worker thread's other tasks move elsewhere while
//! it blocks.

use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;

pub trait Periodic: Send + 'static {
    type Command: Send + 'static;

    /// One unit of periodic work.
    fn tick(&mut self);

    /// A command from the owner, handled between ticks.
    fn handle(&mut self, cmd: Self::Command);

    /// Runs once after the stop signal, before the task exits.
    fn shutdown(&mut self);
}

pub struct PeriodicTask<M> {
    stop_tx: watch::Sender<bool>,
    cmd_tx: mpsc::UnboundedSender<M>,
    handle: JoinHandle<()>,
}

fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::current().runtime_flavor() {
        RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
        // No other worker thread to hand off to.
        _ => f(),
    }
}

impl<M: Send + 'static> PeriodicTask<M> {
    /// Spawn `worker` on the current Tokio runtime.
    pub fn spawn<P>(mut worker: P, interval: Duration, span: tracing::Span) -> Self
    where
        P: Periodic<Command = M>,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<M>();

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;
                        changed = stop_rx.changed() => {
                            if changed.is_err() || *stop_rx.borrow() {
                                break;
                            }
                        }
                        Some(cmd) = cmd_rx.recv() => worker.handle(cmd),
                        _ = ticker.tick() => run_blocking(|| worker.tick()),
                    }
                }

                worker.shutdown();
            }
            .instrument(span),
        );

        Self {
            stop_tx,
            cmd_tx,
            handle,
        }
    }

    /// Queue a command. `false` if the worker has already exited.
    pub fn send(&self, cmd: M) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal stop and wait for the worker to finish its shutdown.
    pub async fn stop(self) -> Result<(), JoinError> {
        // Receiver gone means the task already exited; joining still applies.
        let _ = self.stop_tx.send(true);
        self.handle.await
    }
}
