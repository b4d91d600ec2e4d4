pub mod bookings;
pub mod seats;

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use std::sync::Arc;
use validator::ValidationErrors;

use crate::error::{ApiError, ReservationError};

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(bookings::routes())
        .merge(seats::routes())
}

/// JSON-тело, ошибки разбора которого уходят в общий формат `ApiError` с 400.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(HandlerError))]
pub struct AppJson<T>(pub T);

/// Ошибка HTTP-слоя: тело не разобралось или не прошло валидацию,
/// либо движок отказал.
#[derive(Debug)]
pub enum HandlerError {
    Body(JsonRejection),
    Validation(ValidationErrors),
    Reservation(ReservationError),
}

impl From<JsonRejection> for HandlerError {
    fn from(e: JsonRejection) -> Self {
        HandlerError::Body(e)
    }
}

impl From<ValidationErrors> for HandlerError {
    fn from(e: ValidationErrors) -> Self {
        HandlerError::Validation(e)
    }
}

impl From<ReservationError> for HandlerError {
    fn from(e: ReservationError) -> Self {
        HandlerError::Reservation(e)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Body(rejection) => {
                (StatusCode::BAD_REQUEST, Json(ApiError::new(rejection.body_text()))).into_response()
            }
            HandlerError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(ApiError::new(errors.to_string()))).into_response()
            }
            HandlerError::Reservation(e) => e.into_response(),
        }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
