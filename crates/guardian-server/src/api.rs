use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use guardian_core::geofence::Coordinate;
use guardian_core::{
    AttendanceEvent, Guard, GuardId, GuardRank, Location, LocationId, PanicAlert, PresenceStatus,
    Shift, ShiftId,
};
use guardian_engine::alerts::{AlertNotice, AlertSnapshot, PanicChannel};
use guardian_engine::attendance::{AttendanceReceipt, AttendanceService};
use guardian_engine::monitor::Roster;
use guardian_engine::SharedDb;

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub attendance: Arc<AttendanceService>,
    pub roster: Arc<RwLock<Roster>>,
    pub alerts: Arc<PanicChannel>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // attendance write path
        .route("/api/v1/attendance/clock-in", post(clock_in))
        .route("/api/v1/attendance/clock-out", post(clock_out))
        .route("/api/v1/attendance/check-in", post(check_in))
        // event log reads
        .route("/api/v1/guards/:id/events", get(guard_events))
        .route("/api/v1/activity", get(activity_feed))
        // presence projection
        .route("/api/v1/presence", get(presence))
        // panic alerts
        .route("/api/v1/panic", post(panic_trigger).get(panic_snapshot))
        .route("/api/v1/panic/reset", post(panic_reset))
        .route("/api/v1/panic/stream", get(panic_stream))
        // directory registration
        .route("/api/v1/guards", post(create_guard).get(list_guards))
        .route("/api/v1/locations", post(create_location).get(list_locations))
        .route("/api/v1/shifts", post(create_shift))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Attendance ───

#[derive(Deserialize)]
struct AttendanceBody {
    guard_id: GuardId,
    latitude: f64,
    longitude: f64,
}

async fn clock_in(
    State(state): State<AppState>,
    Json(b): Json<AttendanceBody>,
) -> Result<Json<AttendanceReceipt>, ServerError> {
    let sample = Coordinate::new(b.latitude, b.longitude);
    let receipt = state
        .attendance
        .clock_in(b.guard_id, sample, Utc::now())
        .await?;
    Ok(Json(receipt))
}

async fn clock_out(
    State(state): State<AppState>,
    Json(b): Json<AttendanceBody>,
) -> Result<Json<AttendanceReceipt>, ServerError> {
    let sample = Coordinate::new(b.latitude, b.longitude);
    let receipt = state
        .attendance
        .clock_out(b.guard_id, sample, Utc::now())
        .await?;
    Ok(Json(receipt))
}

async fn check_in(
    State(state): State<AppState>,
    Json(b): Json<AttendanceBody>,
) -> Result<Json<AttendanceReceipt>, ServerError> {
    let sample = Coordinate::new(b.latitude, b.longitude);
    let receipt = state
        .attendance
        .check_in(b.guard_id, sample, Utc::now())
        .await?;
    Ok(Json(receipt))
}

// ─── Event log reads ───

async fn guard_events(
    State(state): State<AppState>,
    Path(id): Path<GuardId>,
) -> Result<Json<Vec<AttendanceEvent>>, ServerError> {
    let db = state.db.lock().await;
    if db.guard(id)?.is_none() {
        return Err(ServerError::NotFound(format!("guard {id}")));
    }
    let events = db.events_for_guard(id)?;
    Ok(Json(events))
}

#[derive(Deserialize)]
struct ActivityParams {
    limit: Option<u32>,
}

async fn activity_feed(
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> Result<Json<Vec<AttendanceEvent>>, ServerError> {
    let limit = params.limit.unwrap_or(50).min(500);
    let events = state.db.lock().await.recent_events(limit)?;
    Ok(Json(events))
}

// ─── Presence ───

#[derive(Serialize)]
struct PresenceResponse {
    computed_at: chrono::DateTime<Utc>,
    /// The projection is older than two sweep cadences.  Displays should
    /// tolerate brief staleness rather than treat it as an error.
    stale: bool,
    on_duty: Vec<PresenceStatus>,
}

async fn presence(State(state): State<AppState>) -> Json<PresenceResponse> {
    let roster = state.roster.read().await;
    Json(PresenceResponse {
        computed_at: roster.computed_at,
        stale: roster.is_stale(Utc::now(), state.config.sweep_cadence()),
        on_duty: roster.on_duty.clone(),
    })
}

// ─── Panic alerts ───

#[derive(Deserialize)]
struct PanicBody {
    guard_name: String,
    location: String,
}

async fn panic_trigger(
    State(state): State<AppState>,
    Json(b): Json<PanicBody>,
) -> Result<(StatusCode, Json<PanicAlert>), ServerError> {
    let alert = state
        .alerts
        .trigger(b.guard_name, b.location, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn panic_reset(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let cleared = state.alerts.reset().await?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

async fn panic_snapshot(
    State(state): State<AppState>,
) -> Result<Json<AlertSnapshot>, ServerError> {
    let snapshot = state.alerts.snapshot().await?;
    Ok(Json(snapshot))
}

/// Push channel for alert notices.
///
/// A subscriber that lags behind the broadcast buffer receives a `resync`
/// event and must reconcile with `GET /api/v1/panic`; the polling fallback
/// covers observers that cannot hold the stream open at all.
async fn panic_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.alerts.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(notice) => {
                let event = match &notice {
                    AlertNotice::Raised { .. } => "alert",
                    AlertNotice::Cleared { .. } => "cleared",
                };
                let sse = SseEvent::default()
                    .event(event)
                    .json_data(&notice)
                    .unwrap_or_else(|_| SseEvent::default().event("resync").data("{}"));
                Some((Ok::<_, Infallible>(sse), rx))
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "alert subscriber lagged; requesting resync");
                Some((Ok(SseEvent::default().event("resync").data("{}")), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ─── Directory registration ───

#[derive(Deserialize)]
struct CreateGuardBody {
    name: String,
    location_id: Option<LocationId>,
    rank: Option<String>,
}

async fn create_guard(
    State(state): State<AppState>,
    Json(b): Json<CreateGuardBody>,
) -> Result<(StatusCode, Json<Guard>), ServerError> {
    let rank = match b.rank.as_deref() {
        Some(r) => Some(
            GuardRank::from_str(r)
                .ok_or_else(|| ServerError::BadRequest(format!("unknown rank: {r}")))?,
        ),
        None => None,
    };

    let db = state.db.lock().await;
    if let Some(location_id) = b.location_id {
        if db.location(location_id)?.is_none() {
            return Err(ServerError::NotFound(format!("location {location_id}")));
        }
    }

    let guard = Guard {
        id: GuardId::new(),
        name: b.name,
        location_id: b.location_id,
        rank,
        created_at: Utc::now(),
    };
    db.insert_guard(&guard)?;
    Ok((StatusCode::CREATED, Json(guard)))
}

async fn list_guards(State(state): State<AppState>) -> Result<Json<Vec<Guard>>, ServerError> {
    let guards = state.db.lock().await.list_guards()?;
    Ok(Json(guards))
}

#[derive(Deserialize)]
struct CreateLocationBody {
    name: String,
    latitude: f64,
    longitude: f64,
    radius_m: Option<f64>,
}

async fn create_location(
    State(state): State<AppState>,
    Json(b): Json<CreateLocationBody>,
) -> Result<(StatusCode, Json<Location>), ServerError> {
    if !Coordinate::new(b.latitude, b.longitude).is_valid() {
        return Err(ServerError::BadRequest(
            "latitude/longitude out of range".to_string(),
        ));
    }

    let location = Location {
        id: LocationId::new(),
        name: b.name,
        latitude: b.latitude,
        longitude: b.longitude,
        radius_m: b.radius_m,
    };
    state.db.lock().await.insert_location(&location)?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Location>>, ServerError> {
    let locations = state.db.lock().await.list_locations()?;
    Ok(Json(locations))
}

#[derive(Deserialize)]
struct CreateShiftBody {
    guard_id: GuardId,
    /// Calendar day, `YYYY-MM-DD`.
    day: String,
    /// Local-clock `HH:MM`.
    start_time: String,
    /// Local-clock `HH:MM`; at or before `start_time` wraps past midnight.
    end_time: String,
}

async fn create_shift(
    State(state): State<AppState>,
    Json(b): Json<CreateShiftBody>,
) -> Result<(StatusCode, Json<Shift>), ServerError> {
    let day = NaiveDate::parse_from_str(&b.day, "%Y-%m-%d")
        .map_err(|e| ServerError::BadRequest(format!("invalid day: {e}")))?;
    let start = parse_hhmm(&b.start_time)?;
    let end = parse_hhmm(&b.end_time)?;

    let db = state.db.lock().await;
    if db.guard(b.guard_id)?.is_none() {
        return Err(ServerError::NotFound(format!("guard {}", b.guard_id)));
    }

    let shift = Shift {
        id: ShiftId::new(),
        guard_id: b.guard_id,
        day,
        start,
        end,
    };
    db.upsert_shift(&shift)?;
    Ok((StatusCode::CREATED, Json(shift)))
}

fn parse_hhmm(value: &str) -> Result<NaiveTime, ServerError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| ServerError::BadRequest(format!("invalid time {value:?}: {e}")))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    tracing::info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
