use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub venue_id: i64,
    pub name: String,
    pub price: f64,
    pub total_rows: i32,
    pub total_columns: i32,
}

impl Section {
    pub fn capacity(&self) -> i64 {
        i64::from(self.total_rows.max(0)) * i64::from(self.total_columns.max(0))
    }

    // Сумма брони считается от цены секции
    pub fn price_for(&self, seat_count: usize) -> f64 {
        self.price * seat_count as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSection {
    pub venue_id: i64,
    pub name: String,
    pub price: f64,
    pub total_rows: i32,
    pub total_columns: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Venue {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
}
