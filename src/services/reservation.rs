//! reservation.rs
//!
//! Движок резервирования мест: двухфазная бронь (RESERVED -> CONFIRMED)
//! с ленивым истечением холда.
//!
//! Каждая операция выполняется в одной транзакции хранилища. Места захватываются
//! эксклюзивно до проверки их статуса, поэтому два параллельных запроса не могут
//! занять одно и то же место: второй дождётся коммита первого, увидит свежий
//! статус и получит Conflict.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{BadRequestKind, ConflictKind, Entity, ReservationError};
use crate::models::{Booking, BookingStatus, NewBooking, Seat, SeatStatus};
use crate::store::{ReservationStore, StoreTransaction};

/// Запрос на холд набора мест одной секции.
#[derive(Debug, Clone)]
pub struct ReserveSeats {
    pub user_id: i64,
    pub section_id: i64,
    pub seat_ids: Vec<i64>,
    pub hold: Duration,
}

/// Результат Reserve / Confirm / чтения брони.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingResult {
    pub booking_id: i64,
    pub user_id: i64,
    pub section_id: Option<i64>,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub seat_ids: Vec<i64>,
}

impl BookingResult {
    fn new(booking: &Booking, seats: &[Seat]) -> Self {
        Self {
            booking_id: booking.id,
            user_id: booking.user_id,
            section_id: seats.first().map(|s| s.section_id),
            total_amount: booking.total_amount,
            status: booking.status,
            reserved_at: booking.reserved_at,
            expires_at: booking.expires_at,
            confirmed_at: booking.confirmed_at,
            seat_ids: seats.iter().map(|s| s.id).collect(),
        }
    }
}

/// Что сделал один проход свипера.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub bookings_expired: usize,
    pub seats_released: usize,
    /// Секции, в которых освободились места (для инвалидации кеша)
    pub sections: BTreeSet<i64>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.bookings_expired == 0
    }
}

/// Получает id секций, в которых закоммичено изменение статуса мест.
/// Вызывается после каждого коммита, включая свипы внутри Reserve/Confirm.
#[async_trait]
pub trait SeatChangeListener: Send + Sync {
    async fn seats_changed(&self, section_ids: &BTreeSet<i64>);
}

#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    listener: Option<Arc<dyn SeatChangeListener>>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store, listener: None }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SeatChangeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    async fn notify(&self, section_ids: BTreeSet<i64>) {
        if let Some(listener) = &self.listener {
            if !section_ids.is_empty() {
                listener.seats_changed(&section_ids).await;
            }
        }
    }

    /// Ставит места на холд до `now + hold`.
    ///
    /// Перед этим в отдельной транзакции освобождаются все просроченные холды,
    /// чтобы их места были видны этой попытке. Любая ошибка после начала
    /// основной транзакции откатывает её целиком.
    #[instrument(
        skip(self, request),
        fields(user_id = request.user_id, section_id = request.section_id, seats = request.seat_ids.len())
    )]
    pub async fn reserve(&self, request: ReserveSeats, now: DateTime<Utc>) -> Result<BookingResult, ReservationError> {
        let expires_at = validate_reserve(&request, now)?;
        self.sweep(now, None).await?;

        let mut tx = self.store.begin().await?;

        let user = tx
            .find_user(request.user_id)
            .await?
            .ok_or(ReservationError::NotFound(Entity::User))?;
        let section = tx
            .find_section(request.section_id)
            .await?
            .ok_or(ReservationError::NotFound(Entity::Section))?;

        // Проверки только после захвата блокировок
        let mut seats = tx.lock_seats_for_update(&request.seat_ids).await?;
        if seats.len() != request.seat_ids.len() {
            return Err(ReservationError::BadRequest(BadRequestKind::SeatDoesNotExist));
        }
        if seats.iter().any(|s| s.section_id != section.id) {
            return Err(ReservationError::BadRequest(BadRequestKind::SeatNotInSection));
        }
        if let Some(taken) = seats.iter().find(|s| s.status != SeatStatus::Available) {
            debug!(seat_id = taken.id, status = %taken.status, "seat already claimed");
            return Err(ReservationError::Conflict(ConflictKind::SeatUnavailable));
        }

        for seat in &mut seats {
            seat.transition(SeatStatus::Reserved)?;
        }
        tx.save_seats(&seats).await?;

        let booking = tx
            .insert_booking(NewBooking {
                user_id: user.id,
                total_amount: section.price_for(seats.len()),
                reserved_at: now,
                expires_at,
            })
            .await?;

        let seat_ids: Vec<i64> = seats.iter().map(|s| s.id).collect();
        tx.save_booking_seats(booking.id, &seat_ids).await?;
        tx.commit().await?;
        self.notify(BTreeSet::from([section.id])).await;

        info!(booking_id = booking.id, total_amount = booking.total_amount, %expires_at, "seats reserved");
        Ok(BookingResult::new(&booking, &seats))
    }

    /// Подтверждает холд: места BOOKED, бронь CONFIRMED.
    ///
    /// Подтверждение после дедлайна никогда не проходит: бронь истекает здесь же,
    /// это фиксируется, и возвращается Conflict "reservation expired".
    #[instrument(skip(self))]
    pub async fn confirm(&self, booking_id: i64, now: DateTime<Utc>) -> Result<BookingResult, ReservationError> {
        // Саму подтверждаемую бронь свипер не трогает: её истечение
        // должно быть видно вызывающему как "reservation expired"
        self.sweep(now, Some(booking_id)).await?;

        let mut tx = self.store.begin().await?;

        let mut booking = tx
            .lock_booking_for_update(booking_id)
            .await?
            .ok_or(ReservationError::NotFound(Entity::Booking))?;
        if booking.status != BookingStatus::Reserved {
            return Err(ReservationError::Conflict(ConflictKind::NotReserved));
        }

        if booking.is_expired_at(now) {
            let released = expire_booking(tx.as_mut(), &mut booking).await?;
            tx.commit().await?;
            self.notify(released.iter().map(|s| s.section_id).collect()).await;
            warn!(booking_id, seats_released = released.len(), "confirmation arrived after the hold expired");
            return Err(ReservationError::Conflict(ConflictKind::ReservationExpired));
        }

        let mut seats = tx.find_seats_by_booking_id(booking.id).await?;
        if seats.is_empty() || seats.iter().any(|s| s.status != SeatStatus::Reserved) {
            return Err(ReservationError::Conflict(ConflictKind::SeatsNoLongerValid));
        }

        for seat in &mut seats {
            seat.transition(SeatStatus::Booked)?;
        }
        tx.save_seats(&seats).await?;

        booking.confirm(now)?;
        tx.save_booking(&booking).await?;
        tx.commit().await?;
        self.notify(seats.iter().map(|s| s.section_id).collect()).await;

        info!(booking_id, seats = seats.len(), "booking confirmed");
        Ok(BookingResult::new(&booking, &seats))
    }

    /// Освобождает все холды с `expires_at < now`. Повторный вызов ничего не меняет.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, ReservationError> {
        self.sweep(now, None).await
    }

    async fn sweep(&self, now: DateTime<Utc>, skip_booking: Option<i64>) -> Result<SweepReport, ReservationError> {
        let mut tx = self.store.begin().await?;
        let stale = tx
            .find_bookings_by_status_and_expiry_before(BookingStatus::Reserved, now)
            .await?;

        let mut report = SweepReport::default();
        for mut booking in stale.into_iter().filter(|b| Some(b.id) != skip_booking) {
            let released = expire_booking(tx.as_mut(), &mut booking).await?;
            debug!(booking_id = booking.id, seats = released.len(), "hold expired");
            report.bookings_expired += 1;
            report.seats_released += released.len();
            report.sections.extend(released.iter().map(|s| s.section_id));
        }
        tx.commit().await?;
        self.notify(report.sections.clone()).await;

        if !report.is_empty() {
            info!(
                bookings = report.bookings_expired,
                seats = report.seats_released,
                "expired holds reclaimed"
            );
        }
        Ok(report)
    }

    /// Бронь с её местами, без блокировок и без изменений.
    pub async fn booking(&self, booking_id: i64) -> Result<BookingResult, ReservationError> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or(ReservationError::NotFound(Entity::Booking))?;
        let seat_ids: Vec<i64> = tx
            .find_booking_seats(booking_id)
            .await?
            .into_iter()
            .map(|link| link.seat_id)
            .collect();
        let seats = tx.find_seats_by_ids(&seat_ids).await?;
        tx.rollback().await?;
        Ok(BookingResult::new(&booking, &seats))
    }

    pub async fn section_seats(&self, section_id: i64) -> Result<Vec<Seat>, ReservationError> {
        let mut tx = self.store.begin().await?;
        tx.find_section(section_id)
            .await?
            .ok_or(ReservationError::NotFound(Entity::Section))?;
        let seats = tx.find_seats_by_section(section_id).await?;
        tx.rollback().await?;
        Ok(seats)
    }
}

fn validate_reserve(request: &ReserveSeats, now: DateTime<Utc>) -> Result<DateTime<Utc>, ReservationError> {
    if request.seat_ids.is_empty() {
        return Err(ReservationError::BadRequest(BadRequestKind::NoSeatsRequested));
    }
    let mut seen = HashSet::with_capacity(request.seat_ids.len());
    for &seat_id in &request.seat_ids {
        if !seen.insert(seat_id) {
            return Err(ReservationError::BadRequest(BadRequestKind::DuplicateSeat(seat_id)));
        }
    }
    if request.hold < Duration::zero() {
        return Err(ReservationError::BadRequest(BadRequestKind::InvalidHold));
    }
    now.checked_add_signed(request.hold)
        .ok_or(ReservationError::BadRequest(BadRequestKind::InvalidHold))
}

/// Переводит одну RESERVED-бронь в EXPIRED и возвращает освобождённые места.
/// Места, которые уже ушли из RESERVED, не трогаются.
async fn expire_booking(
    tx: &mut dyn StoreTransaction,
    booking: &mut Booking,
) -> Result<Vec<Seat>, ReservationError> {
    let mut released: Vec<Seat> = tx
        .find_seats_by_booking_id(booking.id)
        .await?
        .into_iter()
        .filter(|s| s.status == SeatStatus::Reserved)
        .collect();
    for seat in &mut released {
        seat.transition(SeatStatus::Available)?;
    }
    tx.save_seats(&released).await?;

    booking.expire()?;
    tx.save_booking(booking).await?;
    Ok(released)
}
