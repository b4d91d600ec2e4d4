pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cache::CacheService;
use crate::config::Config;
use crate::services::ReservationEngine;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: ReservationEngine,
    pub cache: Option<CacheService>,
}

impl AppState {
    pub fn new(config: Config, engine: ReservationEngine, cache: Option<CacheService>) -> Arc<Self> {
        Arc::new(Self { config, engine, cache })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Seat Reservation API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
