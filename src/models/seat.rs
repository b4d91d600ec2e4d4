use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::InvalidTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Available,
    Reserved,
    Booked,
}

text_status!(SeatStatus {
    SeatStatus::Available => "AVAILABLE",
    SeatStatus::Reserved => "RESERVED",
    SeatStatus::Booked => "BOOKED",
});

impl SeatStatus {
    /// AVAILABLE -> RESERVED -> BOOKED, и RESERVED -> AVAILABLE при истечении брони.
    /// BOOKED терминален.
    pub fn can_transition_to(self, next: SeatStatus) -> bool {
        matches!(
            (self, next),
            (SeatStatus::Available, SeatStatus::Reserved)
                | (SeatStatus::Reserved, SeatStatus::Booked)
                | (SeatStatus::Reserved, SeatStatus::Available)
        )
    }

    /// Активное притязание брони на место
    pub fn is_claimed(self) -> bool {
        !matches!(self, SeatStatus::Available)
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub section_id: i64,
    pub row_index: i32,
    pub column_index: i32,
    pub status: SeatStatus,
    pub revision: i64,
}

impl Seat {
    pub fn transition(&mut self, next: SeatStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                entity: "seat",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.revision += 1;
        Ok(())
    }
}
