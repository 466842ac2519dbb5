//! Origin channels of parked clients.
//!
//! # Invariant
//! An entry exists for a client iff the engine considers it away and parked.
//! Created on a successful park move, consumed on a successful restore,
//! purged on disconnect.

use std::collections::BTreeMap;

use afk_schemas::{ChannelId, ClientId};

#[derive(Clone, Debug, Default)]
pub struct ChannelHistory {
    origins: BTreeMap<ClientId, ChannelId>,
}

impl ChannelHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where `client` was before parking.
    ///
    /// Idempotent: an existing origin is never overwritten, so a client
    /// parked twice is still restored to where it originally came from.
    /// Returns `true` if a new entry was created.
    pub fn record(&mut self, client: ClientId, origin: ChannelId) -> bool {
        match self.origins.entry(client) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(origin);
                true
            }
        }
    }

    pub fn origin(&self, client: ClientId) -> Option<ChannelId> {
        self.origins.get(&client).copied()
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.origins.contains_key(&client)
    }

    /// Consume the entry (restore succeeded or client disconnected).
    pub fn take(&mut self, client: ClientId) -> Option<ChannelId> {
        self.origins.remove(&client)
    }

    pub fn entries(&self) -> &BTreeMap<ClientId, ChannelId> {
        &self.origins
    }

    pub fn retain(&mut self, mut keep: impl FnMut(ClientId) -> bool) {
        self.origins.retain(|id, _| keep(*id));
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn clear(&mut self) {
        self.origins.clear();
    }
}
