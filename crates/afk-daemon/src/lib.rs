//! afk-daemon library target.
//!
//! HTTP control surface over the away mover. Tests compose the router
//! in-process; an embedding binary calls [`routes::build_app`] and serves it.

pub mod api_types;
pub mod routes;
pub mod state;
