use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{parse_id, RowError};

/// Database model for households
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HouseholdRow {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HouseholdRow {
    pub fn to_shared(&self) -> Result<shared::Household, RowError> {
        Ok(shared::Household {
            id: parse_id("households.id", &self.id)?,
            name: self.name.clone(),
            created_by: parse_id("households.created_by", &self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_household_row_to_shared() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let creator = Uuid::new_v4();

        let row = HouseholdRow {
            id: id.to_string(),
            name: "Flat 3B".to_string(),
            created_by: creator.to_string(),
            created_at: now,
            updated_at: now,
        };

        let shared = row.to_shared().unwrap();

        assert_eq!(shared.id, id);
        assert_eq!(shared.name, "Flat 3B");
        assert_eq!(shared.created_by, creator);
    }
}
