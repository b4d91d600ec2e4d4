use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::ReservationError;
use crate::services::reservation::{ReservationEngine, SweepReport};

/// Фоновое освобождение просроченных холдов.
///
/// Reserve и Confirm сами подметают просроченное перед работой, поэтому
/// свипер нужен только чтобы места не висели RESERVED при отсутствии трафика.
pub struct ExpirySweeper {
    engine: ReservationEngine,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(engine: ReservationEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Один проход SweepExpired. Затронутые секции движок сам сообщает слушателю.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, ReservationError> {
        self.engine.sweep_expired(now).await
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("🧹 Expiry sweeper started, interval {:?}", self.interval);
            let mut ticker = tokio::time::interval(self.interval);
            // Первый тик срабатывает сразу
            loop {
                ticker.tick().await;
                match self.run_once(Utc::now()).await {
                    Ok(report) if report.is_empty() => {}
                    Ok(report) => info!(
                        "🎫 Sweep released {} seats from {} expired bookings",
                        report.seats_released, report.bookings_expired
                    ),
                    Err(e) => error!("🧹 Sweep failed: {:?}", e),
                }
            }
        })
    }
}
