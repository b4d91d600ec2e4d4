//! Контракты хранилища, которыми пользуется движок резервирования.
//!
//! Все операции выполняются внутри транзакции [`StoreTransaction`], которую
//! открывает [`ReservationStore::begin`]. Транзакция, которую уронили без
//! `commit`, откатывается.
//!
//! Дисциплина блокировок пессимистическая: методы `lock_*` и
//! [`BookingLedger::find_seats_by_booking_id`] удерживают строки эксклюзивно
//! до конца транзакции. Порядок захвата всегда бронь -> места.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::{
    Booking, BookingSeat, BookingStatus, NewBooking, NewSection, Seat, Section, User, Venue,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryReservationStore;
pub use postgres::PgReservationStore;

#[async_trait]
pub trait SeatStore: Send {
    /// Места по id, без блокировки. Отсутствующие id просто не попадают в результат.
    async fn find_seats_by_ids(&mut self, seat_ids: &[i64]) -> StoreResult<Vec<Seat>>;

    async fn find_seats_by_section(&mut self, section_id: i64) -> StoreResult<Vec<Seat>>;

    /// Эксклюзивно блокирует найденные места до конца транзакции (порядок по id).
    async fn lock_seats_for_update(&mut self, seat_ids: &[i64]) -> StoreResult<Vec<Seat>>;

    async fn save_seats(&mut self, seats: &[Seat]) -> StoreResult<()>;

    async fn count_seats_in_section(&mut self, section_id: i64) -> StoreResult<i64>;

    /// Генерирует сетку rows x columns свободных мест (нумерация с 1).
    /// Для секции, у которой места уже есть, ничего не делает и возвращает 0.
    async fn insert_seat_grid(&mut self, section: &Section) -> StoreResult<u64>;
}

#[async_trait]
pub trait BookingLedger: Send {
    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking>;

    async fn save_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn find_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>>;

    async fn lock_booking_for_update(&mut self, booking_id: i64) -> StoreResult<Option<Booking>>;

    /// Брони в статусе `status` с `expires_at < before`, заблокированные на запись.
    async fn find_bookings_by_status_and_expiry_before(
        &mut self,
        status: BookingStatus,
        before: DateTime<Utc>,
    ) -> StoreResult<Vec<Booking>>;

    async fn save_booking_seats(&mut self, booking_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<BookingSeat>>;

    async fn find_booking_seats(&mut self, booking_id: i64) -> StoreResult<Vec<BookingSeat>>;

    /// Места брони через BookingSeat; строки мест блокируются на запись.
    async fn find_seats_by_booking_id(&mut self, booking_id: i64) -> StoreResult<Vec<Seat>>;
}

/// Данные каталога (пользователи, площадки, секции). Движок их только читает;
/// запись нужна сидеру демо-данных.
#[async_trait]
pub trait CatalogStore: Send {
    async fn find_user(&mut self, user_id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;

    async fn insert_user(&mut self, name: &str, email: &str) -> StoreResult<User>;

    async fn find_venue_by_name(&mut self, name: &str) -> StoreResult<Option<Venue>>;

    async fn insert_venue(&mut self, name: &str, address: Option<&str>) -> StoreResult<Venue>;

    async fn find_section(&mut self, section_id: i64) -> StoreResult<Option<Section>>;

    async fn find_section_by_name(&mut self, venue_id: i64, name: &str) -> StoreResult<Option<Section>>;

    async fn insert_section(&mut self, section: NewSection) -> StoreResult<Section>;
}

#[async_trait]
pub trait StoreTransaction: SeatStore + BookingLedger + CatalogStore + Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}
