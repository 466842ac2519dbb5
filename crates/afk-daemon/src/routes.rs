//! Axum router and HTTP handlers for afk-daemon.
//!
//! `build_router` is the bare router the scenario tests compose directly;
//! `build_app` adds the request tracing layer for serving.

use std::{convert::Infallible, sync::Arc};

use afk_config::minutes_to_duration;
use afk_reconcile::ReconcileError;
use afk_runtime::{MoverEvent, StartOutcome, StopOutcome};
use afk_schemas::ClientId;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::{
    api_types::{
        ClientLeftResponse, ErrorResponse, HealthResponse, MuteTimeRequest, MuteTimeResponse,
        StartResponse, StateResponse, StopResponse,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/afk/start", post(afk_start))
        .route("/v1/afk/stop", post(afk_stop))
        .route("/v1/afk/state", get(afk_state))
        .route("/v1/afk/mute-time", get(mute_time_get).post(mute_time_set))
        .route("/v1/afk/clients/:id/left", post(client_left))
        .with_state(state)
}

/// Router plus per-request tracing spans.
pub fn build_app(state: Arc<AppState>) -> Router {
    build_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

fn refusal(status: StatusCode, kind: &str, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            kind: kind.to_string(),
        }),
    )
        .into_response()
}

fn error_kind(e: &ReconcileError) -> &'static str {
    match e {
        ReconcileError::RosterUnavailable(_) => "roster_unavailable",
        ReconcileError::MoveFailed { .. } => "move_failed",
        ReconcileError::ChannelResolutionFailed { .. } => "channel_resolution_failed",
        ReconcileError::ConfigurationInvalid(_) => "configuration_invalid",
    }
}

fn duration_minutes(d: chrono::Duration) -> f64 {
    d.num_milliseconds() as f64 / 60_000.0
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/afk/start
// ---------------------------------------------------------------------------

/// `200` started, `409` already running, `422` when channels or thresholds
/// cannot be resolved (the mover stays stopped).
pub(crate) async fn afk_start(State(st): State<Arc<AppState>>) -> Response {
    let outcome = st.mover.lock().await.start(&st.config);
    match outcome {
        Ok(StartOutcome::Started { run_id }) => {
            info!(%run_id, "afk/start");
            (
                StatusCode::OK,
                Json(StartResponse {
                    started: true,
                    run_id,
                }),
            )
                .into_response()
        }
        Ok(StartOutcome::AlreadyRunning { run_id }) => (
            StatusCode::CONFLICT,
            Json(StartResponse {
                started: false,
                run_id,
            }),
        )
            .into_response(),
        Err(e) => refusal(StatusCode::UNPROCESSABLE_ENTITY, error_kind(&e), e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/afk/stop
// ---------------------------------------------------------------------------

pub(crate) async fn afk_stop(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = st.mover.lock().await.stop().await;
    let body = match outcome {
        StopOutcome::Stopped { run_id } => {
            info!(%run_id, "afk/stop");
            StopResponse {
                stopped: true,
                run_id: Some(run_id),
            }
        }
        StopOutcome::NotRunning => StopResponse {
            stopped: false,
            run_id: None,
        },
    };
    (StatusCode::OK, Json(body))
}

// ---------------------------------------------------------------------------
// GET /v1/afk/state
// ---------------------------------------------------------------------------

pub(crate) async fn afk_state(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mover = st.mover.lock().await;
    let engine = mover.dump_state().await;
    (
        StatusCode::OK,
        Json(StateResponse {
            running: engine.is_some(),
            run_id: mover.run_id(),
            engine,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET/POST /v1/afk/mute-time
// ---------------------------------------------------------------------------

pub(crate) async fn mute_time_get(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let (window, threshold) = st.mover.lock().await.current_threshold();
    (
        StatusCode::OK,
        Json(MuteTimeResponse {
            window,
            minutes: duration_minutes(threshold),
        }),
    )
}

/// Sets the threshold of the window active now. `422` for non-positive
/// values or anything over a week; the previous threshold stays in force.
pub(crate) async fn mute_time_set(
    State(st): State<Arc<AppState>>,
    Json(req): Json<MuteTimeRequest>,
) -> Response {
    let threshold = match minutes_to_duration("minutes", req.minutes) {
        Ok(d) => d,
        Err(e) => {
            return refusal(
                StatusCode::UNPROCESSABLE_ENTITY,
                "configuration_invalid",
                format!("{e:#}"),
            )
        }
    };
    let changed = st.mover.lock().await.reconfigure(threshold);
    match changed {
        Ok(window) => (
            StatusCode::OK,
            Json(MuteTimeResponse {
                window,
                minutes: duration_minutes(threshold),
            }),
        )
            .into_response(),
        Err(e) => refusal(StatusCode::UNPROCESSABLE_ENTITY, error_kind(&e), e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/afk/clients/:id/left
// ---------------------------------------------------------------------------

pub(crate) async fn client_left(
    State(st): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let client = ClientId(id);
    let mover = st.mover.lock().await;
    let forwarded = mover.is_running();
    mover.client_left(client);
    (StatusCode::OK, Json(ClientLeftResponse { client, forwarded }))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.mover.lock().await.subscribe();
    let events = events_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

pub(crate) fn event_name(ev: &MoverEvent) -> &'static str {
    match ev {
        MoverEvent::Started { .. } => "started",
        MoverEvent::Parked { .. } => "parked",
        MoverEvent::Restored { .. } => "restored",
        MoverEvent::MoveFailed { .. } => "move_failed",
        MoverEvent::CycleSkipped { .. } => "cycle_skipped",
        MoverEvent::Stopped { .. } => "stopped",
    }
}

fn events_to_sse(
    rx: broadcast::Receiver<MoverEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(ev) => {
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(event_name(&ev)).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
