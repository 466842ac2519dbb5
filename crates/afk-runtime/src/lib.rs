//! afk-runtime
//!
//! Drives the reconciliation engine on a fixed interval.
//!
//! - [`Clock`] is injected; tests use [`ManualClock`].
//! - [`PeriodicTask`] is the cancellable loop: interval tick, command
//!   channel, stop signal.
//! - [`AfkMover`] is the control handle: start, stop, reconfigure,
//!   dump_state, client_left, and an event bus.

mod clock;
mod mover;
mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use mover::{AfkMover, MoverEvent, StartOutcome, StopOutcome};
pub use task::{Periodic, PeriodicTask};
