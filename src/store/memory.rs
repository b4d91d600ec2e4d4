//! In-memory реализация контрактов хранилища для тестов и бенчмарков.
//!
//! Транзакция держит единственный мьютекс всё время жизни и работает с копией
//! состояния, которая записывается обратно при `commit`. Это сериализует все
//! транзакции целиком, что строже построчных блокировок Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingLedger, CatalogStore, ReservationStore, SeatStore, StoreTransaction};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Booking, BookingSeat, BookingStatus, NewBooking, NewSection, Seat, SeatStatus, Section, User,
    Venue,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    user: i64,
    venue: i64,
    section: i64,
    seat: i64,
    booking: i64,
    booking_seat: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    venues: BTreeMap<i64, Venue>,
    sections: BTreeMap<i64, Section>,
    seats: BTreeMap<i64, Seat>,
    bookings: BTreeMap<i64, Booking>,
    booking_seats: Vec<BookingSeat>,
    ids: Sequences,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Все брони журнала (ждёт завершения текущей транзакции).
    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.values().cloned().collect()
    }

    pub async fn booking_seats(&self) -> Vec<BookingSeat> {
        self.state.lock().await.booking_seats.clone()
    }

    pub async fn seats(&self) -> Vec<Seat> {
        self.state.lock().await.seats.values().cloned().collect()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryTransaction {
    fn seat(&self, seat_id: i64) -> StoreResult<&Seat> {
        self.working
            .seats
            .get(&seat_id)
            .ok_or_else(|| StoreError::Inconsistent(format!("seat {} does not exist", seat_id)))
    }
}

#[async_trait]
impl SeatStore for MemoryTransaction {
    async fn find_seats_by_ids(&mut self, seat_ids: &[i64]) -> StoreResult<Vec<Seat>> {
        let mut seats: Vec<Seat> = seat_ids
            .iter()
            .filter_map(|id| self.working.seats.get(id).cloned())
            .collect();
        seats.sort_by_key(|s| s.id);
        seats.dedup_by_key(|s| s.id);
        Ok(seats)
    }

    async fn find_seats_by_section(&mut self, section_id: i64) -> StoreResult<Vec<Seat>> {
        let mut seats: Vec<Seat> = self
            .working
            .seats
            .values()
            .filter(|s| s.section_id == section_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| (s.row_index, s.column_index));
        Ok(seats)
    }

    async fn lock_seats_for_update(&mut self, seat_ids: &[i64]) -> StoreResult<Vec<Seat>> {
        // Вся транзакция и так под мьютексом
        self.find_seats_by_ids(seat_ids).await
    }

    async fn save_seats(&mut self, seats: &[Seat]) -> StoreResult<()> {
        for seat in seats {
            self.seat(seat.id)?;
            self.working.seats.insert(seat.id, seat.clone());
        }
        Ok(())
    }

    async fn count_seats_in_section(&mut self, section_id: i64) -> StoreResult<i64> {
        Ok(self.working.seats.values().filter(|s| s.section_id == section_id).count() as i64)
    }

    async fn insert_seat_grid(&mut self, section: &Section) -> StoreResult<u64> {
        if self.count_seats_in_section(section.id).await? > 0 {
            return Ok(0);
        }
        let mut created = 0;
        for row_index in 1..=section.total_rows {
            for column_index in 1..=section.total_columns {
                let id = next_id(&mut self.working.ids.seat);
                self.working.seats.insert(
                    id,
                    Seat {
                        id,
                        section_id: section.id,
                        row_index,
                        column_index,
                        status: SeatStatus::Available,
                        revision: 0,
                    },
                );
                created += 1;
            }
        }
        Ok(created)
    }
}

#[async_trait]
impl BookingLedger for MemoryTransaction {
    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        if !self.working.users.contains_key(&booking.user_id) {
            return Err(StoreError::Inconsistent(format!("user {} does not exist", booking.user_id)));
        }
        let id = next_id(&mut self.working.ids.booking);
        let row = Booking {
            id,
            user_id: booking.user_id,
            total_amount: booking.total_amount,
            status: BookingStatus::Reserved,
            reserved_at: booking.reserved_at,
            expires_at: Some(booking.expires_at),
            confirmed_at: None,
        };
        self.working.bookings.insert(id, row.clone());
        Ok(row)
    }

    async fn save_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        match self.working.bookings.get_mut(&booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(StoreError::Inconsistent(format!("booking {} does not exist", booking.id))),
        }
    }

    async fn find_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.working.bookings.get(&booking_id).cloned())
    }

    async fn lock_booking_for_update(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        self.find_booking(booking_id).await
    }

    async fn find_bookings_by_status_and_expiry_before(
        &mut self,
        status: BookingStatus,
        before: DateTime<Utc>,
    ) -> StoreResult<Vec<Booking>> {
        Ok(self
            .working
            .bookings
            .values()
            .filter(|b| b.status == status && b.expires_at.is_some_and(|at| at < before))
            .cloned()
            .collect())
    }

    async fn save_booking_seats(&mut self, booking_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<BookingSeat>> {
        if !self.working.bookings.contains_key(&booking_id) {
            return Err(StoreError::Inconsistent(format!("booking {} does not exist", booking_id)));
        }
        let mut links = Vec::with_capacity(seat_ids.len());
        for &seat_id in seat_ids {
            self.seat(seat_id)?;
            let link = BookingSeat {
                id: next_id(&mut self.working.ids.booking_seat),
                booking_id,
                seat_id,
            };
            self.working.booking_seats.push(link.clone());
            links.push(link);
        }
        Ok(links)
    }

    async fn find_booking_seats(&mut self, booking_id: i64) -> StoreResult<Vec<BookingSeat>> {
        Ok(self
            .working
            .booking_seats
            .iter()
            .filter(|link| link.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn find_seats_by_booking_id(&mut self, booking_id: i64) -> StoreResult<Vec<Seat>> {
        let links = self.find_booking_seats(booking_id).await?;
        let mut seats = links
            .iter()
            .map(|link| self.seat(link.seat_id).cloned())
            .collect::<StoreResult<Vec<_>>>()?;
        seats.sort_by_key(|s| s.id);
        Ok(seats)
    }
}

#[async_trait]
impl CatalogStore for MemoryTransaction {
    async fn find_user(&mut self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.working.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&mut self, name: &str, email: &str) -> StoreResult<User> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(StoreError::Inconsistent(format!("email {} already registered", email)));
        }
        let user = User {
            id: next_id(&mut self.working.ids.user),
            name: name.to_string(),
            email: email.to_string(),
        };
        self.working.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_venue_by_name(&mut self, name: &str) -> StoreResult<Option<Venue>> {
        Ok(self.working.venues.values().find(|v| v.name == name).cloned())
    }

    async fn insert_venue(&mut self, name: &str, address: Option<&str>) -> StoreResult<Venue> {
        let venue = Venue {
            id: next_id(&mut self.working.ids.venue),
            name: name.to_string(),
            address: address.map(str::to_string),
        };
        self.working.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    async fn find_section(&mut self, section_id: i64) -> StoreResult<Option<Section>> {
        Ok(self.working.sections.get(&section_id).cloned())
    }

    async fn find_section_by_name(&mut self, venue_id: i64, name: &str) -> StoreResult<Option<Section>> {
        Ok(self
            .working
            .sections
            .values()
            .find(|s| s.venue_id == venue_id && s.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn insert_section(&mut self, section: NewSection) -> StoreResult<Section> {
        if !self.working.venues.contains_key(&section.venue_id) {
            return Err(StoreError::Inconsistent(format!("venue {} does not exist", section.venue_id)));
        }
        let row = Section {
            id: next_id(&mut self.working.ids.section),
            venue_id: section.venue_id,
            name: section.name,
            price: section.price,
            total_rows: section.total_rows,
            total_columns: section.total_columns,
        };
        self.working.sections.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
