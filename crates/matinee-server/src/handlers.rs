//! REST handlers for registration, screening snapshots, and seat changes.
//!
//! Handlers stay thin: validate input, run one registry operation, publish
//! the committed snapshot to the screening, and reply. All broadcasting
//! happens after the registry commit, never under its lock.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use matinee_core::{OccupiedSeat, Screening, ScreeningId, SeatPosition, ServerEvent, VisitorId};
use matinee_presence::{ReleasedSeat, SeatReservation};

use crate::AppState;
use crate::auth::AuthVisitor;
use crate::errors::ApiError;

/// Body of `POST /api/auth/visitor`.
#[derive(Debug, Deserialize)]
pub struct RegisterVisitorRequest {
    /// Requested screening; unknown ids resolve to the default screening.
    pub screening_id: String,
    /// Display name, must be non-empty.
    pub visitor_name: String,
}

/// Reply to a successful registration.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The visitor id minted for this registration.
    pub visitor_id: VisitorId,
}

/// Body of `POST /api/screenings/{id}/seats`.
#[derive(Debug, Deserialize)]
pub struct SelectSeatRequest {
    /// Zero-based row index.
    pub row_number: u32,
    /// Zero-based seat index within the row.
    pub seat_number: u32,
}

/// Reply to a successful seat selection.
#[derive(Debug, Serialize)]
pub struct SeatResponse {
    /// Always `true`; failures travel as error responses.
    pub success: bool,
    /// The committed occupancy record.
    pub seat: OccupiedSeat,
}

/// Generic `{"success": true}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Runtime counters reported by `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Fixed `"ok"`.
    pub status: &'static str,
    /// Seconds since the server state was built.
    pub uptime_secs: u64,
    /// Authenticated socket connections.
    pub connections: usize,
    /// Registered visitors.
    pub visitors: usize,
    /// Known screenings.
    pub screenings: usize,
    /// Tokens issued since startup.
    pub tokens_issued: u64,
}

fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection, "rejected request body");
            Err(ApiError::BadRequest("invalid request body".into()))
        }
    }
}

/// `POST /api/auth/visitor`: register a visitor and mint their token.
#[instrument(skip_all)]
pub async fn register_visitor(
    State(state): State<AppState>,
    body: Result<Json<RegisterVisitorRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let req = read_body(body)?;

    let visitor = state
        .registry
        .register_visitor(&req.visitor_name, &ScreeningId::from(req.screening_id))?;
    let token = state.credentials.issue(&visitor)?;

    state
        .broadcast
        .broadcast_to_screening(&visitor.screening_id, &ServerEvent::visitor_joined(&visitor))
        .await;

    info!(visitor_id = %visitor.id, screening_id = %visitor.screening_id, "visitor registered");
    Ok(Json(TokenResponse {
        token,
        visitor_id: visitor.id,
    }))
}

/// `GET /api/screenings/{id}`: screening snapshot for an authenticated
/// visitor. Counts as visitor activity.
pub async fn get_screening(
    State(state): State<AppState>,
    Path(screening_id): Path<String>,
    auth: AuthVisitor,
) -> Result<Json<Screening>, ApiError> {
    let screening = state
        .registry
        .screening_for_visitor(&ScreeningId::from(screening_id), &auth.visitor_id)?;
    Ok(Json(screening))
}

/// `POST /api/screenings/{id}/seats`: claim a seat in the visitor's own
/// screening.
#[instrument(skip_all, fields(visitor_id = %auth.visitor_id))]
pub async fn select_seat(
    State(state): State<AppState>,
    auth: AuthVisitor,
    body: Result<Json<SelectSeatRequest>, JsonRejection>,
) -> Result<Json<SeatResponse>, ApiError> {
    let req = read_body(body)?;

    let SeatReservation {
        seat,
        screening_id,
        chart,
    } = state
        .registry
        .reserve_seat(&auth.visitor_id, SeatPosition::new(req.row_number, req.seat_number))?;

    state
        .broadcast
        .broadcast_to_screening(&screening_id, &ServerEvent::seat_update(chart))
        .await;

    Ok(Json(SeatResponse {
        success: true,
        seat,
    }))
}

/// `POST /api/screenings/{id}/seats/release`: give up the held seat.
///
/// Succeeds whether or not a seat was held; the occupancy broadcast only
/// goes out when one actually was.
#[instrument(skip_all, fields(visitor_id = %auth.visitor_id))]
pub async fn release_seat(
    State(state): State<AppState>,
    auth: AuthVisitor,
) -> Result<Json<SuccessResponse>, ApiError> {
    if let Some(ReleasedSeat {
        position,
        screening_id,
        chart,
    }) = state.registry.release_seat(&auth.visitor_id)?
    {
        debug!(position = %position, screening_id = %screening_id, "seat released");
        state
            .broadcast
            .broadcast_to_screening(&screening_id, &ServerEvent::seat_update(chart))
            .await;
    }
    Ok(SuccessResponse::ok())
}

/// `POST /api/screenings/{id}/heartbeat`: refresh the activity clock.
pub async fn heartbeat(
    State(state): State<AppState>,
    auth: AuthVisitor,
) -> Result<Json<SuccessResponse>, ApiError> {
    let _ = state.registry.touch(&auth.visitor_id)?;
    Ok(SuccessResponse::ok())
}

/// `GET /health`: liveness plus coarse runtime counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        connections: state.directory.connection_count(),
        visitors: state.registry.visitor_count(),
        screenings: state.registry.screening_count(),
        tokens_issued: state.credentials.issued_count(),
    })
}

/// `GET /metrics`: Prometheus exposition, when a recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}
