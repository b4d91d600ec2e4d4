mod common;

use chrono::Duration;

use common::{seeded, t0};
use seat_reservation::error::{BadRequestKind, ConflictKind, Entity, ReservationError};
use seat_reservation::models::{BookingStatus, SeatStatus};
use seat_reservation::services::ReserveSeats;

#[tokio::test]
async fn reserve_then_confirm_books_the_seats() {
    let fx = seeded().await;
    let seats = fx.normal_seats(3).await;

    let held = fx
        .engine
        .reserve(fx.request(seats.clone(), Duration::minutes(5)), t0())
        .await
        .unwrap();
    assert_eq!(held.status, BookingStatus::Reserved);
    assert_eq!(held.total_amount, 7500.0);
    assert_eq!(held.seat_ids, seats);
    assert_eq!(held.section_id, Some(fx.seed.normal_section_id));
    assert_eq!(held.expires_at, Some(t0() + Duration::minutes(5)));
    for id in &seats {
        assert_eq!(fx.seat(*id).await.status, SeatStatus::Reserved);
    }

    let confirmed = fx.engine.confirm(held.booking_id, t0() + Duration::minutes(1)).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.confirmed_at, Some(t0() + Duration::minutes(1)));
    assert_eq!(confirmed.expires_at, None);
    for id in &seats {
        let seat = fx.seat(*id).await;
        assert_eq!(seat.status, SeatStatus::Booked);
        assert_eq!(seat.revision, 2);
    }
    assert_eq!(fx.store.booking_seats().await.len(), 3);
}

#[tokio::test]
async fn one_taken_seat_fails_the_whole_reservation() {
    let fx = seeded().await;
    let seats = fx.normal_seats(5).await;

    let first = fx
        .engine
        .reserve(fx.request(vec![seats[2]], Duration::minutes(5)), t0())
        .await
        .unwrap();

    let err = fx
        .engine
        .reserve(fx.request(seats.clone(), Duration::minutes(5)), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::Conflict(ConflictKind::SeatUnavailable)));

    for (i, id) in seats.iter().enumerate() {
        let expected = if i == 2 { SeatStatus::Reserved } else { SeatStatus::Available };
        assert_eq!(fx.seat(*id).await.status, expected);
    }
    let bookings = fx.store.bookings().await;
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, first.booking_id);
    assert_eq!(fx.store.booking_seats().await.len(), 1);
}

#[tokio::test]
async fn confirm_past_the_deadline_expires_the_booking() {
    let fx = seeded().await;
    let seats = fx.normal_seats(2).await;

    let held = fx.engine.reserve(fx.request(seats.clone(), Duration::zero()), t0()).await.unwrap();

    let err = fx.engine.confirm(held.booking_id, t0() + Duration::seconds(1)).await.unwrap_err();
    assert!(matches!(err, ReservationError::Conflict(ConflictKind::ReservationExpired)));
    assert_eq!(err.to_string(), "reservation expired");

    let booking = fx.engine.booking(held.booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Expired);
    assert_eq!(booking.expires_at, None);
    for id in &seats {
        assert_eq!(fx.seat(*id).await.status, SeatStatus::Available);
    }
}

#[tokio::test]
async fn deadline_itself_is_too_late() {
    let fx = seeded().await;
    let seats = fx.normal_seats(1).await;
    let held = fx.engine.reserve(fx.request(seats, Duration::seconds(30)), t0()).await.unwrap();

    let err = fx.engine.confirm(held.booking_id, t0() + Duration::seconds(30)).await.unwrap_err();
    assert!(matches!(err, ReservationError::Conflict(ConflictKind::ReservationExpired)));
}

#[tokio::test]
async fn second_sweep_changes_nothing() {
    let fx = seeded().await;
    let seats = fx.normal_seats(4).await;
    fx.engine
        .reserve(fx.request(seats[..2].to_vec(), Duration::seconds(10)), t0())
        .await
        .unwrap();
    fx.engine
        .reserve(fx.request(seats[2..].to_vec(), Duration::seconds(10)), t0())
        .await
        .unwrap();

    let now = t0() + Duration::minutes(1);
    let first = fx.engine.sweep_expired(now).await.unwrap();
    assert_eq!(first.bookings_expired, 2);
    assert_eq!(first.seats_released, 4);
    assert!(first.sections.contains(&fx.seed.normal_section_id));

    let seats_after_first = fx.store.seats().await;
    let bookings_after_first = fx.store.bookings().await;

    let second = fx.engine.sweep_expired(now).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(fx.store.seats().await, seats_after_first);
    assert_eq!(fx.store.bookings().await, bookings_after_first);
}

#[tokio::test]
async fn sweep_leaves_live_holds_alone() {
    let fx = seeded().await;
    let seats = fx.normal_seats(1).await;
    let held = fx.engine.reserve(fx.request(seats.clone(), Duration::minutes(5)), t0()).await.unwrap();

    let report = fx.engine.sweep_expired(t0() + Duration::minutes(1)).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(fx.engine.booking(held.booking_id).await.unwrap().status, BookingStatus::Reserved);
    assert_eq!(fx.seat(seats[0]).await.status, SeatStatus::Reserved);
}

#[tokio::test]
async fn confirming_twice_is_a_conflict() {
    let fx = seeded().await;
    let seats = fx.normal_seats(2).await;
    let held = fx.engine.reserve(fx.request(seats, Duration::minutes(5)), t0()).await.unwrap();
    fx.engine.confirm(held.booking_id, t0()).await.unwrap();

    let seats_before = fx.store.seats().await;
    let bookings_before = fx.store.bookings().await;

    let err = fx.engine.confirm(held.booking_id, t0() + Duration::seconds(5)).await.unwrap_err();
    assert!(matches!(err, ReservationError::Conflict(ConflictKind::NotReserved)));
    assert_eq!(err.to_string(), "not in reserved state");
    assert_eq!(fx.store.seats().await, seats_before);
    assert_eq!(fx.store.bookings().await, bookings_before);
}

#[tokio::test]
async fn expired_hold_frees_seats_for_the_next_reserve() {
    let fx = seeded().await;
    let seats = fx.normal_seats(2).await;
    let stale = fx.engine.reserve(fx.request(seats.clone(), Duration::seconds(10)), t0()).await.unwrap();

    // Без явного свипа: Reserve сам подбирает просроченный холд
    let fresh = fx
        .engine
        .reserve(fx.request(seats.clone(), Duration::minutes(5)), t0() + Duration::minutes(1))
        .await
        .unwrap();
    assert_ne!(fresh.booking_id, stale.booking_id);
    assert_eq!(fx.engine.booking(stale.booking_id).await.unwrap().status, BookingStatus::Expired);

    let err = fx.engine.confirm(stale.booking_id, t0() + Duration::minutes(2)).await.unwrap_err();
    assert!(matches!(err, ReservationError::Conflict(ConflictKind::NotReserved)));
}

#[tokio::test]
async fn booked_seats_never_come_back() {
    let fx = seeded().await;
    let seats = fx.normal_seats(1).await;
    let held = fx.engine.reserve(fx.request(seats.clone(), Duration::seconds(10)), t0()).await.unwrap();
    fx.engine.confirm(held.booking_id, t0()).await.unwrap();

    let report = fx.engine.sweep_expired(t0() + Duration::days(1)).await.unwrap();
    assert!(report.is_empty());

    let err = fx
        .engine
        .reserve(fx.request(seats, Duration::minutes(5)), t0() + Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::Conflict(ConflictKind::SeatUnavailable)));
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let fx = seeded().await;
    let seats = fx.normal_seats(1).await;

    let mut req = fx.request(seats.clone(), Duration::minutes(5));
    req.user_id = 9_999;
    let err = fx.engine.reserve(req, t0()).await.unwrap_err();
    assert!(matches!(err, ReservationError::NotFound(Entity::User)));

    let mut req = fx.request(seats, Duration::minutes(5));
    req.section_id = 9_999;
    let err = fx.engine.reserve(req, t0()).await.unwrap_err();
    assert!(matches!(err, ReservationError::NotFound(Entity::Section)));

    let err = fx.engine.confirm(9_999, t0()).await.unwrap_err();
    assert!(matches!(err, ReservationError::NotFound(Entity::Booking)));
    assert_eq!(err.to_string(), "booking not found");

    assert!(fx.store.bookings().await.is_empty());
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let fx = seeded().await;
    let normal = fx.normal_seats(2).await;
    let balcony = fx.section_seat_ids(fx.seed.balcony_section_id).await;

    let cases: Vec<(ReserveSeats, BadRequestKind)> = vec![
        (fx.request(vec![], Duration::minutes(5)), BadRequestKind::NoSeatsRequested),
        (
            fx.request(vec![normal[0], normal[0]], Duration::minutes(5)),
            BadRequestKind::DuplicateSeat(normal[0]),
        ),
        (fx.request(normal.clone(), Duration::seconds(-1)), BadRequestKind::InvalidHold),
        (fx.request(vec![normal[0], 987_654], Duration::minutes(5)), BadRequestKind::SeatDoesNotExist),
        (fx.request(vec![normal[0], balcony[0]], Duration::minutes(5)), BadRequestKind::SeatNotInSection),
    ];

    for (req, expected) in cases {
        match fx.engine.reserve(req, t0()).await {
            Err(ReservationError::BadRequest(kind)) => assert_eq!(kind, expected),
            other => panic!("expected BadRequest({:?}), got {:?}", expected, other),
        }
    }

    assert!(fx.store.bookings().await.is_empty());
    assert!(fx.store.seats().await.iter().all(|s| s.status == SeatStatus::Available));
}

#[tokio::test]
async fn balcony_is_priced_by_its_own_section() {
    let fx = seeded().await;
    let balcony = fx.section_seat_ids(fx.seed.balcony_section_id).await;

    let mut req = fx.request(balcony[..2].to_vec(), Duration::minutes(5));
    req.section_id = fx.seed.balcony_section_id;
    let held = fx.engine.reserve(req, t0()).await.unwrap();
    assert_eq!(held.total_amount, 8000.0);
}

#[tokio::test]
async fn section_listing_reflects_holds() {
    let fx = seeded().await;
    let seats = fx.engine.section_seats(fx.seed.normal_section_id).await.unwrap();
    assert_eq!(seats.len(), 80);
    assert_eq!((seats[0].row_index, seats[0].column_index), (1, 1));
    assert_eq!((seats[79].row_index, seats[79].column_index), (8, 10));

    fx.engine
        .reserve(fx.request(vec![seats[0].id], Duration::minutes(5)), t0())
        .await
        .unwrap();
    let seats = fx.engine.section_seats(fx.seed.normal_section_id).await.unwrap();
    assert_eq!(seats[0].status, SeatStatus::Reserved);
    assert_eq!(seats.iter().filter(|s| s.status == SeatStatus::Available).count(), 79);

    let err = fx.engine.section_seats(9_999).await.unwrap_err();
    assert!(matches!(err, ReservationError::NotFound(Entity::Section)));
}
