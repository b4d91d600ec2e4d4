use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::controllers::HandlerResult;
use crate::models::{Seat, SeatStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/sections/{id}/seats", get(get_section_seats))
}

#[derive(Debug, Serialize)]
pub struct SeatView {
    pub id: i64,
    pub row: i32,
    pub column: i32,
    pub status: SeatStatus,
}

impl From<&Seat> for SeatView {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id,
            row: seat.row_index,
            column: seat.column_index,
            status: seat.status,
        }
    }
}

// GET /api/sections/{id}/seats
async fn get_section_seats(
    State(state): State<Arc<AppState>>,
    Path(section_id): Path<i64>,
) -> HandlerResult<impl IntoResponse> {
    // Поколение читаем до похода в хранилище: если между чтением и записью
    // кто-то инвалидирует секцию, снимок ляжет под устаревшим ключом
    let cached = match &state.cache {
        Some(cache) => cache
            .section_generation(section_id)
            .await
            .map(|generation| (cache, generation)),
        None => None,
    };

    if let Some((cache, generation)) = cached {
        if let Some(seats) = cache.get_section_seats(section_id, generation).await {
            return Ok(([("X-Cache", "HIT")], Json(views(&seats))));
        }
    }

    let seats = state.engine.section_seats(section_id).await?;
    if let Some((cache, generation)) = cached {
        cache.save_section_seats(section_id, generation, &seats).await;
    }
    Ok(([("X-Cache", "MISS")], Json(views(&seats))))
}

fn views(seats: &[Seat]) -> Vec<SeatView> {
    seats.iter().map(SeatView::from).collect()
}
