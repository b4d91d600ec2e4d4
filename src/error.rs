use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Ошибки слоя хранения (Postgres или in-memory).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Хранилище обнаружило нарушенный инвариант (например, ссылку на несуществующее место).
    #[error("store is inconsistent: {0}")]
    Inconsistent(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Недопустимый переход в машине состояний места или брони.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {entity} transition {from} -> {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Section,
    Booking,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::User => write!(f, "user"),
            Entity::Section => write!(f, "section"),
            Entity::Booking => write!(f, "booking"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadRequestKind {
    NoSeatsRequested,
    DuplicateSeat(i64),
    InvalidHold,
    SeatDoesNotExist,
    SeatNotInSection,
}

impl fmt::Display for BadRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadRequestKind::NoSeatsRequested => write!(f, "no seats requested"),
            BadRequestKind::DuplicateSeat(id) => write!(f, "seat {} requested more than once", id),
            BadRequestKind::InvalidHold => write!(f, "hold duration must be non-negative and finite"),
            BadRequestKind::SeatDoesNotExist => write!(f, "seat does not exist"),
            BadRequestKind::SeatNotInSection => write!(f, "seat not in section"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    SeatUnavailable,
    NotReserved,
    ReservationExpired,
    SeatsNoLongerValid,
    IllegalTransition(InvalidTransition),
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::SeatUnavailable => write!(f, "seat unavailable"),
            ConflictKind::NotReserved => write!(f, "not in reserved state"),
            ConflictKind::ReservationExpired => write!(f, "reservation expired"),
            ConflictKind::SeatsNoLongerValid => write!(f, "seats no longer valid"),
            ConflictKind::IllegalTransition(t) => write!(f, "{}", t),
        }
    }
}

/// Ошибки движка резервирования. Ни одна из них не ретраится внутри движка.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("{0}")]
    BadRequest(BadRequestKind),
    #[error("{0}")]
    Conflict(ConflictKind),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<InvalidTransition> for ReservationError {
    fn from(t: InvalidTransition) -> Self {
        ReservationError::Conflict(ConflictKind::IllegalTransition(t))
    }
}

impl ReservationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReservationError::NotFound(_) => StatusCode::NOT_FOUND,
            ReservationError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ReservationError::Conflict(_) => StatusCode::CONFLICT,
            ReservationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Детали инфраструктурных ошибок наружу не отдаём
            ReservationError::Store(e) => {
                tracing::error!("store failure: {:?}", e);
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiError::new(message))).into_response()
    }
}
