//! One reconciliation cycle.
//!
//! Per-client logical states are recomputed every cycle from the roster
//! snapshot plus tracker state; there is no stored state enum.
//!
//! ```text
//!            muted >= threshold | away flag (outside exempt)
//!   Active ───────────────────────────────────────────────► Away
//!     ▲                                                       │ move to parking channel,
//!     │ restore (PlacementResolver)                           │ record origin
//!     │                                                       ▼
//!   Returning ◄──── unmuted, not away, in parking channel ── Parked
//! ```
//!
//! Cycle order: restore the Returning set first, then park the Away set, so
//! a client that came back this tick is not re-flagged from stale state.
//!
//! Moves happen before bookkeeping. A failed move leaves history untouched
//! and reinstates the mute timer, so the client is retried next cycle.

use std::collections::{BTreeMap, BTreeSet};

use afk_policy::MuteThresholds;
use afk_schemas::{ChannelId, ClientId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    ChannelHistory, Classification, ClientRecord, Connector, MuteTracker, PlacementResolver,
    Policy, ReconcileError, RosterSnapshot,
};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AwayReason {
    AwayFlag,
    MutedPastThreshold,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParkedMove {
    pub client: ClientId,
    pub from: ChannelId,
    pub to: ChannelId,
    pub reason: AwayReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RestoredMove {
    pub client: ClientId,
    pub origin: ChannelId,
    pub to: ChannelId,
}

/// What the engine tried and what happened, for one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Set when the roster could not be fetched; nothing else happened.
    pub skipped: Option<ReconcileError>,
    pub restored: Vec<RestoredMove>,
    pub parked: Vec<ParkedMove>,
    pub failed: Vec<ReconcileError>,
}

impl CycleReport {
    fn skipped(e: ReconcileError) -> Self {
        Self {
            skipped: Some(e),
            ..Self::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn is_quiet(&self) -> bool {
        self.skipped.is_none()
            && self.restored.is_empty()
            && self.parked.is_empty()
            && self.failed.is_empty()
    }
}

/// Diagnostic view of engine state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineStateDump {
    /// Parked client -> origin channel.
    pub parked: BTreeMap<ClientId, ChannelId>,
    /// Muted client -> start of the uninterrupted mute.
    pub pending_mutes: BTreeMap<ClientId, DateTime<Utc>>,
    /// Display names from the latest roster, for clients in either map.
    pub names: BTreeMap<ClientId, String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ReconciliationEngine {
    policy: Policy,
    placement: PlacementResolver,
    tracker: MuteTracker,
    history: ChannelHistory,
    names: BTreeMap<ClientId, String>,
}

impl ReconciliationEngine {
    pub fn new(policy: Policy) -> Self {
        let placement = PlacementResolver::new(policy.sibling_group);
        Self {
            policy,
            placement,
            tracker: MuteTracker::new(),
            history: ChannelHistory::new(),
            names: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn tracker(&self) -> &MuteTracker {
        &self.tracker
    }

    pub fn history(&self) -> &ChannelHistory {
        &self.history
    }

    /// Swap thresholds; takes effect on the next cycle.
    pub fn set_thresholds(&mut self, thresholds: MuteThresholds) {
        self.policy.set_thresholds(thresholds);
    }

    /// Disconnect notification: forget everything about `client`.
    /// No restore is attempted for it afterwards.
    pub fn client_left(&mut self, client: ClientId) {
        let had_origin = self.history.take(client);
        let had_mute = self.tracker.forget(client);
        self.names.remove(&client);
        if had_origin.is_some() || had_mute.is_some() {
            debug!(client_id = %client, parked = had_origin.is_some(), "purged departed client");
        }
    }

    /// Drop all per-client state (stop / restart).
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.history.clear();
        self.names.clear();
    }

    pub fn dump_state(&self) -> EngineStateDump {
        let parked = self.history.entries().clone();
        let pending_mutes = self.tracker.entries().clone();
        let names = self
            .names
            .iter()
            .filter(|(id, _)| parked.contains_key(id) || pending_mutes.contains_key(id))
            .map(|(id, n)| (*id, n.clone()))
            .collect();
        EngineStateDump {
            parked,
            pending_mutes,
            names,
        }
    }

    /// Run one cycle against `connector` at time `now`.
    pub fn run_cycle<C, R>(&mut self, connector: &C, now: DateTime<Utc>, rng: &mut R) -> CycleReport
    where
        C: Connector + ?Sized,
        R: Rng + ?Sized,
    {
        let snapshot = match RosterSnapshot::fetch(connector) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "roster unavailable; skipping cycle");
                return CycleReport::skipped(e);
            }
        };

        self.sweep(&snapshot);

        let mut report = CycleReport::default();
        let restored = self.restore_returning(connector, &snapshot, rng, &mut report);
        self.park_away(connector, &snapshot, now, &restored, &mut report);

        debug!(
            clients = snapshot.len(),
            restored = report.restored.len(),
            parked = report.parked.len(),
            failed = report.failed.len(),
            history = self.history.len(),
            pending = self.tracker.len(),
            "afk cycle complete"
        );
        report
    }

    /// Reconcile bookkeeping with the roster before deciding anything:
    /// - clients no longer connected lose both entries (missed disconnects);
    /// - parked clients that walked out of their parking channel on their
    ///   own are no longer parked.
    fn sweep(&mut self, snapshot: &RosterSnapshot) {
        self.names = snapshot
            .clients()
            .iter()
            .map(|c| (c.id, c.display_name.clone()))
            .collect();

        self.tracker.retain(|id| snapshot.contains(id));

        let policy = &self.policy;
        self.history.retain(|id| match snapshot.get(id) {
            Some(c) => {
                let parked = c.channel_id == policy.parking_channel(c);
                if !parked {
                    debug!(client_id = %id, channel_id = %c.channel_id, "left parking channel unassisted");
                }
                parked
            }
            None => false,
        });
    }

    fn is_returning(&self, c: &ClientRecord) -> bool {
        self.history.contains(c.id)
            && c.is_fully_unmuted()
            && !c.is_away_flag
            && c.channel_id == self.policy.parking_channel(c)
    }

    fn restore_returning<C, R>(
        &mut self,
        connector: &C,
        snapshot: &RosterSnapshot,
        rng: &mut R,
        report: &mut CycleReport,
    ) -> BTreeSet<ClientId>
    where
        C: Connector + ?Sized,
        R: Rng + ?Sized,
    {
        let mut restored = BTreeSet::new();
        for c in snapshot.clients() {
            if !self.is_returning(c) {
                continue;
            }
            let Some(origin) = self.history.origin(c.id) else {
                continue;
            };
            let dest = self.placement.resolve_destination(connector, origin, rng);

            match connector.move_client(dest, c.id) {
                Ok(()) => {
                    self.history.take(c.id);
                    self.tracker.forget(c.id);
                    restored.insert(c.id);
                    info!(
                        client_id = %c.id,
                        name = %c.display_name,
                        origin = %origin,
                        channel_id = %dest,
                        "restored returning client"
                    );
                    report.restored.push(RestoredMove {
                        client: c.id,
                        origin,
                        to: dest,
                    });
                }
                Err(e) => {
                    warn!(
                        client_id = %c.id,
                        channel_id = %dest,
                        error = %e,
                        "restore move failed; client stays parked, retry next cycle"
                    );
                    report.failed.push(ReconcileError::MoveFailed {
                        client: c.id,
                        channel: dest,
                        cause: e,
                    });
                }
            }
        }
        restored
    }

    fn park_away<C>(
        &mut self,
        connector: &C,
        snapshot: &RosterSnapshot,
        now: DateTime<Utc>,
        restored: &BTreeSet<ClientId>,
        report: &mut CycleReport,
    ) where
        C: Connector + ?Sized,
    {
        for c in snapshot.clients() {
            if restored.contains(&c.id) {
                continue;
            }

            let (reason, promoted_since) =
                if c.is_away_flag && !self.policy.is_exempt(c.channel_id) {
                    (AwayReason::AwayFlag, None)
                } else {
                    match self.tracker.observe(c, now, &self.policy) {
                        Classification::PromotedToAway { since } => {
                            (AwayReason::MutedPastThreshold, Some(since))
                        }
                        Classification::NotMuted | Classification::PendingSince(_) => continue,
                    }
                };

            let dest = self.policy.parking_channel(c);
            match connector.move_client(dest, c.id) {
                Ok(()) => {
                    let created = self.history.record(c.id, c.channel_id);
                    self.tracker.forget(c.id);
                    info!(
                        client_id = %c.id,
                        name = %c.display_name,
                        from = %c.channel_id,
                        channel_id = %dest,
                        reason = ?reason,
                        origin_kept = !created,
                        "parked away client"
                    );
                    report.parked.push(ParkedMove {
                        client: c.id,
                        from: c.channel_id,
                        to: dest,
                        reason,
                    });
                }
                Err(e) => {
                    if let Some(since) = promoted_since {
                        self.tracker.reinstate(c.id, since);
                    }
                    warn!(
                        client_id = %c.id,
                        from = %c.channel_id,
                        channel_id = %dest,
                        error = %e,
                        "park move failed; origin NOT recorded, retry next cycle"
                    );
                    report.failed.push(ReconcileError::MoveFailed {
                        client: c.id,
                        channel: dest,
                        cause: e,
                    });
                }
            }
        }
    }
}
