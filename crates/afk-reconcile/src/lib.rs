//! afk-reconcile
//!
//! Away/mute reconciliation engine.
//!
//! Architectural decisions:
//! - Mute-based away detection is hysteresis: the condition must hold
//!   continuously for the active threshold; any unmute resets it
//! - Away clients are parked in the holding channel (or their override
//!   channel) and their origin is recorded
//! - Returning clients are restored to their origin, or to wherever the
//!   sibling group has gathered
//! - Restore before park within a cycle
//! - Per-client failures never abort a cycle; a roster failure skips it
//!
//! Synchronous and single-owner: the engine is driven by exactly one worker
//! and needs no internal locking. Time and randomness are injected.

mod connector;
mod engine;
mod error;
mod history;
mod mute_tracker;
mod placement;
mod policy;
mod snapshot;

pub use connector::{Connector, QueryError};
pub use engine::{
    AwayReason, CycleReport, EngineStateDump, ParkedMove, ReconciliationEngine, RestoredMove,
};
pub use error::ReconcileError;
pub use history::ChannelHistory;
pub use mute_tracker::{Classification, MuteTracker};
pub use placement::{choose_destination, PlacementResolver};
pub use policy::Policy;
pub use snapshot::{ClientRecord, RosterSnapshot};
