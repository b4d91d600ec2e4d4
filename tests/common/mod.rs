#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use seat_reservation::models::Seat;
use seat_reservation::services::seeder::{seed_demo_data, SeedSummary};
use seat_reservation::services::{ReservationEngine, ReserveSeats};
use seat_reservation::store::InMemoryReservationStore;

pub struct Fixture {
    pub store: InMemoryReservationStore,
    pub engine: ReservationEngine,
    pub seed: SeedSummary,
}

pub async fn seeded() -> Fixture {
    let store = InMemoryReservationStore::new();
    let seed = seed_demo_data(&store).await.unwrap();
    let engine = ReservationEngine::new(Arc::new(store.clone()));
    Fixture { store, engine, seed }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
}

impl Fixture {
    /// Первые `n` мест секции NORMAL (цена 2500).
    pub async fn normal_seats(&self, n: usize) -> Vec<i64> {
        self.section_seat_ids(self.seed.normal_section_id).await.into_iter().take(n).collect()
    }

    pub async fn section_seat_ids(&self, section_id: i64) -> Vec<i64> {
        self.engine
            .section_seats(section_id)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect()
    }

    pub fn request(&self, seat_ids: Vec<i64>, hold: Duration) -> ReserveSeats {
        ReserveSeats {
            user_id: self.seed.demo_user_id,
            section_id: self.seed.normal_section_id,
            seat_ids,
            hold,
        }
    }

    pub async fn seat(&self, seat_id: i64) -> Seat {
        self.store
            .seats()
            .await
            .into_iter()
            .find(|s| s.id == seat_id)
            .unwrap()
    }
}
