use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{BookingLedger, CatalogStore, ReservationStore, SeatStore, StoreTransaction};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Booking, BookingSeat, BookingStatus, NewBooking, NewSection, Seat, SeatStatus, Section, User,
    Venue,
};

const SEAT_COLUMNS: &str = "id, section_id, row_index, column_index, status, revision";
const BOOKING_COLUMNS: &str = "id, user_id, total_amount, status, reserved_at, expires_at, confirmed_at";

/// Хранилище поверх пула Postgres. Каждая транзакция движка = одна транзакция БД.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SeatStore for PgStoreTransaction {
    async fn find_seats_by_ids(&mut self, seat_ids: &[i64]) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(seat_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn find_seats_by_section(&mut self, section_id: i64) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE section_id = $1 ORDER BY row_index, column_index"
        ))
        .bind(section_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn lock_seats_for_update(&mut self, seat_ids: &[i64]) -> StoreResult<Vec<Seat>> {
        // ORDER BY id даёт одинаковый порядок захвата строк во всех транзакциях
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(seat_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn save_seats(&mut self, seats: &[Seat]) -> StoreResult<()> {
        if seats.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = seats.iter().map(|s| s.id).collect();
        let statuses: Vec<&str> = seats.iter().map(|s| s.status.as_str()).collect();
        let revisions: Vec<i64> = seats.iter().map(|s| s.revision).collect();

        let result = sqlx::query(
            r#"
            UPDATE seats AS s
            SET status = v.status, revision = v.revision
            FROM UNNEST($1::BIGINT[], $2::TEXT[], $3::BIGINT[]) AS v(id, status, revision)
            WHERE s.id = v.id
            "#,
        )
        .bind(ids)
        .bind(statuses)
        .bind(revisions)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != seats.len() as u64 {
            return Err(StoreError::Inconsistent(format!(
                "expected to update {} seats, updated {}",
                seats.len(),
                result.rows_affected()
            )));
        }
        Ok(())
    }

    async fn count_seats_in_section(&mut self, section_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seats WHERE section_id = $1")
            .bind(section_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn insert_seat_grid(&mut self, section: &Section) -> StoreResult<u64> {
        if self.count_seats_in_section(section.id).await? > 0 {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO seats (section_id, row_index, column_index, status)
            SELECT $1, r, c, $4
            FROM generate_series(1, $2) AS r
            CROSS JOIN generate_series(1, $3) AS c
            ON CONFLICT (section_id, row_index, column_index) DO NOTHING
            "#,
        )
        .bind(section.id)
        .bind(section.total_rows)
        .bind(section.total_columns)
        .bind(SeatStatus::Available)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BookingLedger for PgStoreTransaction {
    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (user_id, total_amount, status, reserved_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.user_id)
        .bind(booking.total_amount)
        .bind(BookingStatus::Reserved)
        .bind(booking.reserved_at)
        .bind(booking.expires_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn save_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, expires_at = $3, confirmed_at = $4 WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.status)
        .bind(booking.expires_at)
        .bind(booking.confirmed_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Inconsistent(format!("booking {} does not exist", booking.id)));
        }
        Ok(())
    }

    async fn find_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn lock_booking_for_update(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn find_bookings_by_status_and_expiry_before(
        &mut self,
        status: BookingStatus,
        before: DateTime<Utc>,
    ) -> StoreResult<Vec<Booking>> {
        // FOR UPDATE перепроверяет WHERE после ожидания блокировки, так что бронь,
        // которую параллельно подтвердили, сюда уже не попадёт
        let rows = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE status = $1 AND expires_at < $2
             ORDER BY id
             FOR UPDATE"
        ))
        .bind(status)
        .bind(before)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn save_booking_seats(&mut self, booking_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<BookingSeat>> {
        let rows = sqlx::query_as::<_, BookingSeat>(
            r#"
            INSERT INTO booking_seats (booking_id, seat_id)
            SELECT $1, seat_id FROM UNNEST($2::BIGINT[]) AS seat_id
            RETURNING id, booking_id, seat_id
            "#,
        )
        .bind(booking_id)
        .bind(seat_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn find_booking_seats(&mut self, booking_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let rows = sqlx::query_as::<_, BookingSeat>(
            "SELECT id, booking_id, seat_id FROM booking_seats WHERE booking_id = $1 ORDER BY seat_id",
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn find_seats_by_booking_id(&mut self, booking_id: i64) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT s.id, s.section_id, s.row_index, s.column_index, s.status, s.revision
            FROM seats s
            JOIN booking_seats bs ON bs.seat_id = s.id
            WHERE bs.booking_id = $1
            ORDER BY s.id
            FOR UPDATE OF s
            "#,
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }
}

#[async_trait]
impl CatalogStore for PgStoreTransaction {
    async fn find_user(&mut self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn insert_user(&mut self, name: &str, email: &str) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id, name, email",
        )
        .bind(name)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn find_venue_by_name(&mut self, name: &str) -> StoreResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>("SELECT id, name, address FROM venues WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(venue)
    }

    async fn insert_venue(&mut self, name: &str, address: Option<&str>) -> StoreResult<Venue> {
        let venue = sqlx::query_as::<_, Venue>(
            "INSERT INTO venues (name, address) VALUES ($1, $2) RETURNING id, name, address",
        )
        .bind(name)
        .bind(address)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(venue)
    }

    async fn find_section(&mut self, section_id: i64) -> StoreResult<Option<Section>> {
        let section = sqlx::query_as::<_, Section>(
            "SELECT id, venue_id, name, price, total_rows, total_columns FROM sections WHERE id = $1",
        )
        .bind(section_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(section)
    }

    async fn find_section_by_name(&mut self, venue_id: i64, name: &str) -> StoreResult<Option<Section>> {
        let section = sqlx::query_as::<_, Section>(
            "SELECT id, venue_id, name, price, total_rows, total_columns
             FROM sections
             WHERE venue_id = $1 AND LOWER(name) = LOWER($2)",
        )
        .bind(venue_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(section)
    }

    async fn insert_section(&mut self, section: NewSection) -> StoreResult<Section> {
        let row = sqlx::query_as::<_, Section>(
            "INSERT INTO sections (venue_id, name, price, total_rows, total_columns)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, venue_id, name, price, total_rows, total_columns",
        )
        .bind(section.venue_id)
        .bind(section.name)
        .bind(section.price)
        .bind(section.total_rows)
        .bind(section.total_columns)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
