use afk_policy::PolicyError;
use afk_schemas::{ChannelId, ClientId};

use crate::QueryError;

/// Failure taxonomy of the away mover.
///
/// | Variant                   | Severity                                    |
/// |---------------------------|---------------------------------------------|
/// | `RosterUnavailable`       | transient: cycle skipped, state kept        |
/// | `MoveFailed`              | transient: logged, state not mutated        |
/// | `ChannelResolutionFailed` | fatal at start: mover refuses to start      |
/// | `ConfigurationInvalid`    | rejected at the call, prior policy retained |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("roster unavailable: {0}")]
    RosterUnavailable(QueryError),

    #[error("moving {client} to {channel} failed: {cause}")]
    MoveFailed {
        client: ClientId,
        channel: ChannelId,
        cause: QueryError,
    },

    #[error("channel {name:?} could not be resolved: {reason}")]
    ChannelResolutionFailed { name: String, reason: String },

    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),
}

impl From<PolicyError> for ReconcileError {
    fn from(e: PolicyError) -> Self {
        ReconcileError::ConfigurationInvalid(e.to_string())
    }
}
