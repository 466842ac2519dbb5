//! Per-cycle roster view.
//!
//! Only voice clients make it into a snapshot. Query connections (bots, this
//! agent) have no stable channel and would otherwise pick up mute timers and
//! history entries they can never clear.

use afk_schemas::{ChannelId, ClientId, RosterEntry};
use tracing::debug;

use crate::{Connector, ReconcileError};

/// A real user as seen in one poll cycle. Never mutated, only replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: ClientId,
    pub channel_id: ChannelId,
    pub is_away_flag: bool,
    pub output_muted: bool,
    pub output_hardware_enabled: bool,
    pub display_name: String,
}

impl ClientRecord {
    /// Speakers off in software or no usable output device.
    pub fn is_muted(&self) -> bool {
        self.output_muted || !self.output_hardware_enabled
    }

    pub fn is_fully_unmuted(&self) -> bool {
        !self.is_muted()
    }
}

impl From<RosterEntry> for ClientRecord {
    fn from(e: RosterEntry) -> Self {
        Self {
            id: e.id,
            channel_id: e.channel_id,
            is_away_flag: e.away,
            output_muted: e.output_muted,
            output_hardware_enabled: e.output_hardware_enabled,
            display_name: e.display_name,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    clients: Vec<ClientRecord>,
}

impl RosterSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// List clients once and keep the voice clients.
    pub fn fetch<C: Connector + ?Sized>(connector: &C) -> Result<Self, ReconcileError> {
        let entries = connector
            .list_clients()
            .map_err(ReconcileError::RosterUnavailable)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RosterEntry>) -> Self {
        let mut dropped = 0usize;
        let clients = entries
            .into_iter()
            .filter(|e| {
                let keep = e.is_voice();
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .map(ClientRecord::from)
            .collect();
        if dropped > 0 {
            debug!(dropped, "ignored non-voice connections");
        }
        Self { clients }
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientRecord> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
