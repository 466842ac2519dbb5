//! Contract the engine needs from the voice server query connection.
//!
//! # Contract
//! - Calls are synchronous and expected to finish well within one poll
//!   interval; timeouts are the implementor's business.
//! - The connection is shared with unrelated command handlers, so
//!   implementations must tolerate concurrent calls (`&self` + `Sync`).
//! - Every failure is reported as [`QueryError`]; the engine treats all of
//!   them as transient.

use afk_schemas::{ChannelId, ChannelOccupancy, ChannelRecord, ClientId, RosterEntry};

/// A failed query, as reported by the server (or the transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("query failed (code={code:?}): {message}")]
pub struct QueryError {
    /// Server error id, when the server sent one.
    pub code: Option<u32>,
    pub message: String,
}

impl QueryError {
    pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Transport-level failure without a server error id.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

pub trait Connector: Send + Sync {
    /// Every connected client, including query connections, with away and
    /// audio-output status.
    fn list_clients(&self) -> Result<Vec<RosterEntry>, QueryError>;

    fn move_client(&self, channel: ChannelId, client: ClientId) -> Result<(), QueryError>;

    /// Channels whose name matches `name`. Empty when nothing matches.
    fn find_channel(&self, name: &str) -> Result<Vec<ChannelRecord>, QueryError>;

    /// Direct children of `parent` with live occupancy, in server order.
    fn list_channels(&self, parent: ChannelId) -> Result<Vec<ChannelOccupancy>, QueryError>;

    /// Whether a channel with this id exists on the server.
    fn channel_exists(&self, channel: ChannelId) -> Result<bool, QueryError>;
}

impl<C: Connector + ?Sized> Connector for std::sync::Arc<C> {
    fn list_clients(&self) -> Result<Vec<RosterEntry>, QueryError> {
        (**self).list_clients()
    }

    fn move_client(&self, channel: ChannelId, client: ClientId) -> Result<(), QueryError> {
        (**self).move_client(channel, client)
    }

    fn find_channel(&self, name: &str) -> Result<Vec<ChannelRecord>, QueryError> {
        (**self).find_channel(name)
    }

    fn list_channels(&self, parent: ChannelId) -> Result<Vec<ChannelOccupancy>, QueryError> {
        (**self).list_channels(parent)
    }

    fn channel_exists(&self, channel: ChannelId) -> Result<bool, QueryError> {
        (**self).channel_exists(channel)
    }
}
