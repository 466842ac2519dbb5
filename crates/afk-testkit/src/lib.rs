//! afk-testkit
//!
//! In-memory voice server for tests. Implements [`Connector`] over a
//! mutex-guarded roster and channel tree, records every move, and can be
//! told to fail specific calls.
//!
//! Deterministic: no network, no clock, no randomness.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use afk_reconcile::{Connector, QueryError};
use afk_schemas::{ChannelId, ChannelOccupancy, ChannelRecord, ClientId, RosterEntry};

/// Server error ids used by the fake (mirroring real query error codes).
pub const ERR_INVALID_CLIENT_ID: u32 = 512;
pub const ERR_INVALID_CHANNEL_ID: u32 = 768;
pub const ERR_ALREADY_MEMBER: u32 = 770;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub client: ClientId,
    pub to: ChannelId,
}

#[derive(Default)]
struct ServerState {
    channels: Vec<ChannelRecord>,
    clients: Vec<RosterEntry>,
    moves: Vec<MoveRecord>,
    roster_failures_pending: usize,
    failing_moves: BTreeSet<ClientId>,
    channel_listing_fails: bool,
    find_channel_fails: bool,
}

#[derive(Default)]
pub struct FakeVoiceServer {
    state: Mutex<ServerState>,
}

impl FakeVoiceServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        // A panicking test thread must not cascade into unrelated assertions.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    pub fn add_channel(&self, id: u64, name: &str, parent: Option<u64>) -> &Self {
        self.lock().channels.push(ChannelRecord {
            id: ChannelId(id),
            name: name.to_string(),
            parent_id: parent.map(ChannelId),
        });
        self
    }

    pub fn connect(&self, entry: RosterEntry) -> &Self {
        let mut st = self.lock();
        st.clients.retain(|c| c.id != entry.id);
        st.clients.push(entry);
        drop(st);
        self
    }

    pub fn disconnect(&self, client: ClientId) {
        self.lock().clients.retain(|c| c.id != client);
    }

    /// Apply `f` to the roster row of `client`. No-op for unknown clients.
    pub fn update(&self, client: ClientId, f: impl FnOnce(&mut RosterEntry)) {
        if let Some(c) = self.lock().clients.iter_mut().find(|c| c.id == client) {
            f(c);
        }
    }

    pub fn set_muted(&self, client: ClientId, muted: bool) {
        self.update(client, |c| c.output_muted = muted);
    }

    pub fn set_hardware_enabled(&self, client: ClientId, enabled: bool) {
        self.update(client, |c| c.output_hardware_enabled = enabled);
    }

    pub fn set_away(&self, client: ClientId, away: bool) {
        self.update(client, |c| c.away = away);
    }

    /// Move a client as if the user dragged themselves somewhere.
    pub fn user_switch(&self, client: ClientId, to: u64) {
        self.update(client, |c| c.channel_id = ChannelId(to));
    }

    // -----------------------------------------------------------------------
    // Failure injection
    // -----------------------------------------------------------------------

    /// The next `n` roster listings fail.
    pub fn fail_next_roster(&self, n: usize) {
        self.lock().roster_failures_pending = n;
    }

    pub fn fail_moves_of(&self, client: ClientId, fail: bool) {
        let mut st = self.lock();
        if fail {
            st.failing_moves.insert(client);
        } else {
            st.failing_moves.remove(&client);
        }
    }

    pub fn fail_channel_listing(&self, fail: bool) {
        self.lock().channel_listing_fails = fail;
    }

    /// Fails channel lookups by name and by id.
    pub fn fail_find_channel(&self, fail: bool) {
        self.lock().find_channel_fails = fail;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn channel_of(&self, client: ClientId) -> Option<ChannelId> {
        self.lock()
            .clients
            .iter()
            .find(|c| c.id == client)
            .map(|c| c.channel_id)
    }

    pub fn occupancy(&self, channel: ChannelId) -> u32 {
        count_in(&self.lock().clients, channel)
    }

    /// Successful moves, in order.
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.lock().moves.clone()
    }

    pub fn moves_of(&self, client: ClientId) -> Vec<ChannelId> {
        self.lock()
            .moves
            .iter()
            .filter(|m| m.client == client)
            .map(|m| m.to)
            .collect()
    }

    pub fn clear_moves(&self) {
        self.lock().moves.clear();
    }
}

fn count_in(clients: &[RosterEntry], channel: ChannelId) -> u32 {
    clients.iter().filter(|c| c.channel_id == channel).count() as u32
}

impl Connector for FakeVoiceServer {
    fn list_clients(&self) -> Result<Vec<RosterEntry>, QueryError> {
        let mut st = self.lock();
        if st.roster_failures_pending > 0 {
            st.roster_failures_pending -= 1;
            return Err(QueryError::transport("connection reset by peer"));
        }
        Ok(st.clients.clone())
    }

    fn move_client(&self, channel: ChannelId, client: ClientId) -> Result<(), QueryError> {
        let mut st = self.lock();
        if st.failing_moves.contains(&client) {
            return Err(QueryError::transport("timed out waiting for reply"));
        }
        if !st.channels.iter().any(|c| c.id == channel) {
            return Err(QueryError::new(Some(ERR_INVALID_CHANNEL_ID), "invalid channelID"));
        }
        let Some(c) = st.clients.iter_mut().find(|c| c.id == client) else {
            return Err(QueryError::new(Some(ERR_INVALID_CLIENT_ID), "invalid clientID"));
        };
        if c.channel_id == channel {
            return Err(QueryError::new(Some(ERR_ALREADY_MEMBER), "already member of channel"));
        }
        c.channel_id = channel;
        st.moves.push(MoveRecord { client, to: channel });
        Ok(())
    }

    fn find_channel(&self, name: &str) -> Result<Vec<ChannelRecord>, QueryError> {
        let st = self.lock();
        if st.find_channel_fails {
            return Err(QueryError::transport("not connected"));
        }
        Ok(st
            .channels
            .iter()
            .filter(|c| c.name.contains(name))
            .cloned()
            .collect())
    }

    fn list_channels(&self, parent: ChannelId) -> Result<Vec<ChannelOccupancy>, QueryError> {
        let st = self.lock();
        if st.channel_listing_fails {
            return Err(QueryError::transport("not connected"));
        }
        Ok(st
            .channels
            .iter()
            .filter(|c| c.parent_id == Some(parent))
            .map(|c| ChannelOccupancy {
                id: c.id,
                occupancy: count_in(&st.clients, c.id),
            })
            .collect())
    }

    fn channel_exists(&self, channel: ChannelId) -> Result<bool, QueryError> {
        let st = self.lock();
        if st.find_channel_fails {
            return Err(QueryError::transport("not connected"));
        }
        Ok(st.channels.iter().any(|c| c.id == channel))
    }
}

/// The server layout most scenarios use:
///
/// ```text
/// 15 "Gaming"           (sibling group parent)
///   10 "Lobby"
///   11 "Squad A"
///   12 "Squad B"
/// 99 "Bin weg"          (holding)
/// 50 "Anstubsbar"       (exempt)
/// 90 "Kühlkammer"       (override target)
/// ```
pub fn standard_server() -> FakeVoiceServer {
    let s = FakeVoiceServer::new();
    s.add_channel(15, "Gaming", None)
        .add_channel(10, "Lobby", Some(15))
        .add_channel(11, "Squad A", Some(15))
        .add_channel(12, "Squad B", Some(15))
        .add_channel(99, "Bin weg", None)
        .add_channel(50, "Anstubsbar", None)
        .add_channel(90, "Kühlkammer", None);
    s
}
