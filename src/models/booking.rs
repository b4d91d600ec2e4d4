use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::InvalidTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Reserved,
    Confirmed,
    Expired,
}

text_status!(BookingStatus {
    BookingStatus::Reserved => "RESERVED",
    BookingStatus::Confirmed => "CONFIRMED",
    BookingStatus::Expired => "EXPIRED",
});

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Reserved)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub reserved_at: DateTime<Utc>,
    /// Есть только пока бронь в RESERVED
    pub expires_at: Option<DateTime<Utc>>,
    /// Есть только после CONFIRMED
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Бронь до вставки в журнал (id выдаёт хранилище).
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub user_id: i64,
    pub total_amount: f64,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Booking {
    /// Дедлайн включительный: бронь с `expires_at == now` уже нельзя подтвердить.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.leave_reserved(BookingStatus::Confirmed)?;
        self.confirmed_at = Some(now);
        Ok(())
    }

    pub fn expire(&mut self) -> Result<(), InvalidTransition> {
        self.leave_reserved(BookingStatus::Expired)
    }

    fn leave_reserved(&mut self, next: BookingStatus) -> Result<(), InvalidTransition> {
        if self.status != BookingStatus::Reserved {
            return Err(InvalidTransition {
                entity: "booking",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.expires_at = None;
        Ok(())
    }
}

/// Связь брони с местом. Создаётся вместе с бронью и больше не меняется.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BookingSeat {
    pub id: i64,
    pub booking_id: i64,
    pub seat_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reserved_booking() -> Booking {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        Booking {
            id: 7,
            user_id: 1,
            total_amount: 5000.0,
            status: BookingStatus::Reserved,
            reserved_at: t0,
            expires_at: Some(t0 + Duration::seconds(300)),
            confirmed_at: None,
        }
    }

    #[test]
    fn deadline_is_inclusive() {
        let b = reserved_booking();
        let deadline = b.expires_at.unwrap();
        assert!(!b.is_expired_at(deadline - Duration::seconds(1)));
        assert!(b.is_expired_at(deadline));
        assert!(b.is_expired_at(deadline + Duration::seconds(1)));
    }

    #[test]
    fn confirm_sets_timestamp_and_clears_expiry() {
        let mut b = reserved_booking();
        let now = b.reserved_at + Duration::seconds(10);
        b.confirm(now).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.confirmed_at, Some(now));
        assert_eq!(b.expires_at, None);
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut b = reserved_booking();
        b.expire().unwrap();
        assert!(b.status.is_terminal());
        assert!(b.confirm(b.reserved_at).is_err());
        assert!(b.expire().is_err());
        assert_eq!(b.status, BookingStatus::Expired);
        assert_eq!(b.confirmed_at, None);
    }
}
