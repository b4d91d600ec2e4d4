use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::controllers::{AppJson, HandlerResult};
use crate::error::{BadRequestKind, ReservationError};
use crate::services::ReserveSeats;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(reserve_seats))
        .route("/bookings/confirm", post(confirm_booking))
        .route("/bookings/sweep", post(sweep_expired))
        .route("/bookings/{id}", get(get_booking))
}

/* ---------- DTO ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct ReserveRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(range(min = 1))]
    pub section_id: i64,
    #[validate(length(min = 1, message = "no seats requested"), custom(function = "positive_ids"))]
    pub seat_ids: Vec<i64>,
    #[validate(range(min = 0))]
    pub hold_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmRequest {
    #[validate(range(min = 1))]
    pub booking_id: i64,
}

fn positive_ids(ids: &[i64]) -> Result<(), ValidationError> {
    if ids.iter().all(|id| *id > 0) {
        Ok(())
    } else {
        Err(ValidationError::new("seat ids must be positive"))
    }
}

/* ---------- HANDLERS ---------- */

// POST /api/bookings
async fn reserve_seats(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ReserveRequest>,
) -> HandlerResult<impl IntoResponse> {
    req.validate()?;

    let hold = match req.hold_seconds {
        Some(seconds) => chrono::Duration::try_seconds(seconds)
            .ok_or(ReservationError::BadRequest(BadRequestKind::InvalidHold))?,
        None => state.config.booking.default_hold(),
    };

    let result = state
        .engine
        .reserve(
            ReserveSeats {
                user_id: req.user_id,
                section_id: req.section_id,
                seat_ids: req.seat_ids,
                hold,
            },
            Utc::now(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

// POST /api/bookings/confirm
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ConfirmRequest>,
) -> HandlerResult<impl IntoResponse> {
    req.validate()?;

    let result = state.engine.confirm(req.booking_id, Utc::now()).await?;
    Ok(Json(result))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
) -> HandlerResult<impl IntoResponse> {
    Ok(Json(state.engine.booking(booking_id).await?))
}

// POST /api/bookings/sweep
async fn sweep_expired(State(state): State<Arc<AppState>>) -> HandlerResult<impl IntoResponse> {
    let report = state.engine.sweep_expired(Utc::now()).await?;
    Ok(Json(report))
}
