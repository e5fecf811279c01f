use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{parse_id, RowError};

/// Database model for household memberships
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MembershipRow {
    pub id: String,
    pub household_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl MembershipRow {
    pub fn to_shared(&self) -> Result<shared::HouseholdMembership, RowError> {
        let role = self.role.parse().map_err(|_| RowError::InvalidValue {
            column: "household_memberships.role",
            value: self.role.clone(),
        })?;

        Ok(shared::HouseholdMembership {
            id: parse_id("household_memberships.id", &self.id)?,
            household_id: parse_id("household_memberships.household_id", &self.household_id)?,
            user_id: parse_id("household_memberships.user_id", &self.user_id)?,
            role,
            joined_at: self.joined_at,
        })
    }
}
