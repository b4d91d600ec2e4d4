use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_reservation::{
    cache::CacheService,
    config::Config,
    database::Database,
    redis_client::RedisClient,
    services::{seeder, ExpirySweeper, ReservationEngine},
    store::{PgReservationStore, ReservationStore},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    if config.app.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Seat Reservation API ({})", config.app.environment);

    // Connect to the database
    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.run_migrations().await.context("Failed to run migrations")?;

    let store: Arc<dyn ReservationStore> = Arc::new(PgReservationStore::new(db.pool.clone()));

    if config.features.seed_demo_data {
        let summary = seeder::seed_demo_data(store.as_ref())
            .await
            .context("Failed to seed demo data")?;
        info!("Demo data: {:?}", summary);
    }

    // Redis нужен только для кеша мест; без него сервис работает
    let cache = match &config.redis.url {
        Some(url) => match RedisClient::new(url).await {
            Ok(redis) => Some(CacheService::new(redis, config.redis.seat_cache_ttl_seconds)),
            Err(e) => {
                warn!("Redis unavailable, seat cache disabled: {:?}", e);
                None
            }
        },
        None => {
            info!("REDIS_URL not set, seat cache disabled");
            None
        }
    };

    // Кеш мест сбрасывается движком после каждого коммита, менявшего места
    let mut engine = ReservationEngine::new(store);
    if let Some(cache) = &cache {
        engine = engine.with_listener(Arc::new(cache.clone()));
    }

    // --- Start background tasks ---
    ExpirySweeper::new(engine.clone(), config.booking.sweep_interval()).spawn();

    // --- Start the web server ---
    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;
    let app = seat_reservation::app(AppState::new(config, engine, cache));

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
