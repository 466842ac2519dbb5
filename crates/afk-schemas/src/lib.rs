//! afk-schemas
//!
//! Shared identifiers and wire-neutral records exchanged with the voice
//! server connector. No IO, no policy.
//!
//! Client ids and channel ids are both small integers on the server side.
//! They get distinct newtypes so a channel id can never be handed to a
//! function that expects a client id (or used as a key in the wrong map).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque client identifier, stable for the lifetime of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

/// Opaque channel identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clid={}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cid={}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roster rows
// ---------------------------------------------------------------------------

/// Kind of connection behind a roster row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// A human using a voice client.
    Voice,
    /// A service / query connection (bots, this agent itself).
    Query,
}

/// One row of `list_clients`, as reported by the connector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: ClientId,
    pub channel_id: ChannelId,
    /// Explicit away status set by the client.
    pub away: bool,
    /// Speakers muted in software.
    pub output_muted: bool,
    /// `false` when the output device is missing or disabled.
    pub output_hardware_enabled: bool,
    pub display_name: String,
    pub client_type: ClientType,
}

impl RosterEntry {
    /// A present, unmuted, not-away voice client. Tests mutate from here.
    pub fn voice(id: u64, channel_id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id: ClientId(id),
            channel_id: ChannelId(channel_id),
            away: false,
            output_muted: false,
            output_hardware_enabled: true,
            display_name: display_name.into(),
            client_type: ClientType::Voice,
        }
    }

    pub fn is_voice(&self) -> bool {
        self.client_type == ClientType::Voice
    }
}

// ---------------------------------------------------------------------------
// Channel rows
// ---------------------------------------------------------------------------

/// One row of `find_channel`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: ChannelId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
}

/// One row of `list_channels(parent)`: a channel and how many clients are in it.
///
/// Rows keep server order; placement tie-breaking depends on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOccupancy {
    pub id: ChannelId,
    pub occupancy: u32,
}

impl ChannelOccupancy {
    pub fn new(id: u64, occupancy: u32) -> Self {
        Self {
            id: ChannelId(id),
            occupancy,
        }
    }
}
