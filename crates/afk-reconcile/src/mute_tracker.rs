//! Mute hysteresis.
//!
//! # Invariant
//! An entry exists for a client iff it is in an uninterrupted muted state
//! outside the exempt channels and has not yet crossed the threshold.
//!
//! Any unmute, however short, deletes the entry; the timer restarts from
//! zero on the next muted observation. Promotion to away deletes the entry
//! too.

use std::collections::BTreeMap;

use afk_schemas::ClientId;
use chrono::{DateTime, Utc};

use crate::{ClientRecord, Policy};

/// Outcome of one observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    NotMuted,
    /// Muted, threshold not reached yet. Carries the start of the mute.
    PendingSince(DateTime<Utc>),
    /// Muted for at least the active threshold. `since` is the start of the
    /// mute, so a caller whose move failed can reinstate the timer.
    PromotedToAway { since: DateTime<Utc> },
}

#[derive(Clone, Debug, Default)]
pub struct MuteTracker {
    muted_since: BTreeMap<ClientId, DateTime<Utc>>,
}

impl MuteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules, in precedence order:
    /// 1. exempt channel -> clear, `NotMuted`
    /// 2. muted -> start timer, or promote once `now - since >= threshold`
    /// 3. otherwise -> clear, `NotMuted`
    pub fn observe(
        &mut self,
        client: &ClientRecord,
        now: DateTime<Utc>,
        policy: &Policy,
    ) -> Classification {
        if policy.is_exempt(client.channel_id) {
            self.muted_since.remove(&client.id);
            return Classification::NotMuted;
        }

        if !client.is_muted() {
            self.muted_since.remove(&client.id);
            return Classification::NotMuted;
        }

        let Some(&since) = self.muted_since.get(&client.id) else {
            self.muted_since.insert(client.id, now);
            return Classification::PendingSince(now);
        };

        if now - since >= policy.threshold_for(now) {
            self.muted_since.remove(&client.id);
            Classification::PromotedToAway { since }
        } else {
            Classification::PendingSince(since)
        }
    }

    /// Put a promoted client's timer back (its park move failed).
    pub fn reinstate(&mut self, client: ClientId, since: DateTime<Utc>) {
        self.muted_since.insert(client, since);
    }

    /// Unconditional removal (disconnect, successful move).
    pub fn forget(&mut self, client: ClientId) -> Option<DateTime<Utc>> {
        self.muted_since.remove(&client)
    }

    pub fn muted_since(&self, client: ClientId) -> Option<DateTime<Utc>> {
        self.muted_since.get(&client).copied()
    }

    pub fn entries(&self) -> &BTreeMap<ClientId, DateTime<Utc>> {
        &self.muted_since
    }

    /// Drop entries for clients no longer connected.
    pub fn retain(&mut self, mut keep: impl FnMut(ClientId) -> bool) {
        self.muted_since.retain(|id, _| keep(*id));
    }

    pub fn len(&self) -> usize {
        self.muted_since.len()
    }

    pub fn is_empty(&self) -> bool {
        self.muted_since.is_empty()
    }

    pub fn clear(&mut self) {
        self.muted_since.clear();
    }
}
