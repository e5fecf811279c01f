use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{parse_id, RowError};

/// Database model for rooms
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoomRow {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl RoomRow {
    pub fn to_shared(&self) -> Result<shared::Room, RowError> {
        Ok(shared::Room {
            id: parse_id("rooms.id", &self.id)?,
            household_id: parse_id("rooms.household_id", &self.household_id)?,
            name: self.name.clone(),
            created_at: self.created_at,
        })
    }
}
