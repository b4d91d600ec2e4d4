//! Демо-данные: два пользователя, площадка и две секции с сетками мест.
//!
//! Сидер идемпотентен: всё ищется по естественным ключам (email, имя
//! площадки, имя секции) и создаётся только при отсутствии.

use tracing::info;

use crate::error::StoreError;
use crate::models::{NewSection, Section, User};
use crate::store::{ReservationStore, StoreTransaction};

pub const ADMIN_EMAIL: &str = "admin@myseat.com";
pub const DEMO_USER_EMAIL: &str = "user@myseat.com";
pub const VENUE_NAME: &str = "MySeat Main Auditorium";

struct SectionPlan {
    name: &'static str,
    price: f64,
    rows: i32,
    columns: i32,
}

const SECTIONS: [SectionPlan; 2] = [
    SectionPlan { name: "NORMAL", price: 2500.0, rows: 8, columns: 10 },
    SectionPlan { name: "BALCONY", price: 4000.0, rows: 5, columns: 8 },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub admin_user_id: i64,
    pub demo_user_id: i64,
    pub venue_id: i64,
    pub normal_section_id: i64,
    pub balcony_section_id: i64,
    pub seats_created: u64,
}

pub async fn seed_demo_data(store: &dyn ReservationStore) -> Result<SeedSummary, StoreError> {
    let mut tx = store.begin().await?;

    let admin = find_or_create_user(tx.as_mut(), "System Admin", ADMIN_EMAIL).await?;
    let demo = find_or_create_user(tx.as_mut(), "Demo User", DEMO_USER_EMAIL).await?;

    let venue = match tx.find_venue_by_name(VENUE_NAME).await? {
        Some(venue) => venue,
        None => tx.insert_venue(VENUE_NAME, Some("Colombo 07")).await?,
    };

    let mut sections = Vec::with_capacity(SECTIONS.len());
    let mut seats_created = 0;
    for plan in &SECTIONS {
        let section = find_or_create_section(tx.as_mut(), venue.id, plan).await?;
        seats_created += tx.insert_seat_grid(&section).await?;
        sections.push(section);
    }
    tx.commit().await?;

    let capacity: i64 = sections.iter().map(Section::capacity).sum();
    info!(
        "🌱 Demo data ready: venue {}, capacity {}, {} new seats",
        venue.id, capacity, seats_created
    );

    Ok(SeedSummary {
        admin_user_id: admin.id,
        demo_user_id: demo.id,
        venue_id: venue.id,
        normal_section_id: sections[0].id,
        balcony_section_id: sections[1].id,
        seats_created,
    })
}

async fn find_or_create_user(tx: &mut dyn StoreTransaction, name: &str, email: &str) -> Result<User, StoreError> {
    match tx.find_user_by_email(email).await? {
        Some(user) => Ok(user),
        None => tx.insert_user(name, email).await,
    }
}

async fn find_or_create_section(
    tx: &mut dyn StoreTransaction,
    venue_id: i64,
    plan: &SectionPlan,
) -> Result<Section, StoreError> {
    if let Some(section) = tx.find_section_by_name(venue_id, plan.name).await? {
        return Ok(section);
    }
    tx.insert_section(NewSection {
        venue_id,
        name: plan.name.to_string(),
        price: plan.price,
        total_rows: plan.rows,
        total_columns: plan.columns,
    })
    .await
}
