//! Request and response types for the afk-daemon HTTP endpoints.
//!
//! No business logic lives here.

use afk_policy::PolicyWindow;
use afk_reconcile::EngineStateDump;
use afk_schemas::ClientId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Refusals (409 / 422)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "channel_resolution_failed" | "configuration_invalid" | "already_running" | ...
    pub kind: String,
}

// ---------------------------------------------------------------------------
// /v1/afk/start  /v1/afk/stop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub started: bool,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub stopped: bool,
    /// Run that was stopped, if any.
    pub run_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// /v1/afk/state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    pub running: bool,
    pub run_id: Option<Uuid>,
    pub engine: Option<EngineStateDump>,
}

// ---------------------------------------------------------------------------
// /v1/afk/mute-time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteTimeRequest {
    pub minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteTimeResponse {
    /// Window the value applies to (for POST: the window that was changed).
    pub window: PolicyWindow,
    pub minutes: f64,
}

// ---------------------------------------------------------------------------
// /v1/afk/clients/:id/left
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLeftResponse {
    pub client: ClientId,
    /// false when the mover was stopped and the notification was dropped.
    pub forwarded: bool,
}
