//! Пропускная способность reserve/confirm на in-memory хранилище.

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;

use seat_reservation::services::seeder::{seed_demo_data, SeedSummary};
use seat_reservation::services::{ReservationEngine, ReserveSeats};
use seat_reservation::store::InMemoryReservationStore;

async fn fresh() -> (ReservationEngine, SeedSummary, Vec<i64>) {
    let store = InMemoryReservationStore::new();
    let seed = seed_demo_data(&store).await.unwrap();
    let engine = ReservationEngine::new(Arc::new(store));
    let seats = engine
        .section_seats(seed.normal_section_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    (engine, seed, seats)
}

fn reserve_confirm(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap();

    c.bench_function("reserve_4_seats", |b| {
        b.iter_batched(
            || rt.block_on(fresh()),
            |(engine, seed, seats)| rt.block_on(async move {
                engine
                    .reserve(
                        ReserveSeats {
                            user_id: seed.demo_user_id,
                            section_id: seed.normal_section_id,
                            seat_ids: seats[..4].to_vec(),
                            hold: Duration::minutes(5),
                        },
                        now,
                    )
                    .await
                    .unwrap()
            }),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("reserve_then_confirm", |b| {
        b.iter_batched(
            || rt.block_on(fresh()),
            |(engine, seed, seats)| rt.block_on(async move {
                let held = engine
                    .reserve(
                        ReserveSeats {
                            user_id: seed.demo_user_id,
                            section_id: seed.normal_section_id,
                            seat_ids: seats[..4].to_vec(),
                            hold: Duration::minutes(5),
                        },
                        now,
                    )
                    .await
                    .unwrap();
                engine.confirm(held.booking_id, now).await.unwrap()
            }),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, reserve_confirm);
criterion_main!(benches);
