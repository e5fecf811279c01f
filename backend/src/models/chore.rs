use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Chore, CompletionRecord, Deadline, Interval};
use sqlx::FromRow;

use super::{parse_id, parse_optional_id, RowError};

/// Database model for chores.
///
/// The completion record is flattened into three nullable columns; it is
/// present exactly when `completed_at` is set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChoreRow {
    pub id: String,
    pub household_id: String,
    pub room_id: Option<String>,
    pub name: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub interval_type: String,
    pub interval_value: i64,
    pub due_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub previous_due_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChoreRow {
    pub fn to_shared(&self) -> Result<Chore, RowError> {
        let kind = self.interval_type.parse().map_err(|_| RowError::InvalidValue {
            column: "chores.interval_type",
            value: self.interval_type.clone(),
        })?;
        let value = u32::try_from(self.interval_value).map_err(|_| RowError::InvalidValue {
            column: "chores.interval_value",
            value: self.interval_value.to_string(),
        })?;

        let last_completion = match (self.completed_at, self.completed_by.as_deref()) {
            (Some(completed_at), Some(completed_by)) => Some(CompletionRecord {
                completed_at,
                completed_by: parse_id("chores.completed_by", completed_by)?,
                previous_due_at: Deadline::from(self.previous_due_at),
            }),
            (None, None) => None,
            _ => {
                return Err(RowError::InvalidValue {
                    column: "chores.completed_by",
                    value: format!("{:?}", self.completed_by),
                })
            }
        };

        Ok(Chore {
            id: parse_id("chores.id", &self.id)?,
            household_id: parse_id("chores.household_id", &self.household_id)?,
            room_id: parse_optional_id("chores.room_id", self.room_id.as_deref())?,
            name: self.name.clone(),
            description: self.description.clone(),
            assigned_to: parse_optional_id("chores.assigned_to", self.assigned_to.as_deref())?,
            interval: Interval::new(kind, value),
            due_at: Deadline::from(self.due_at),
            is_overdue: self.is_overdue,
            last_completion,
            created_by: parse_id("chores.created_by", &self.created_by)?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub fn from_shared(chore: &Chore) -> Self {
        let completion = chore.last_completion.as_ref();
        Self {
            id: chore.id.to_string(),
            household_id: chore.household_id.to_string(),
            room_id: chore.room_id.map(|id| id.to_string()),
            name: chore.name.clone(),
            description: chore.description.clone(),
            assigned_to: chore.assigned_to.map(|id| id.to_string()),
            interval_type: chore.interval.kind.as_str().to_string(),
            interval_value: i64::from(chore.interval.value),
            due_at: chore.due_at.as_option(),
            is_overdue: chore.is_overdue,
            completed_at: completion.map(|c| c.completed_at),
            completed_by: completion.map(|c| c.completed_by.to_string()),
            previous_due_at: completion.and_then(|c| c.previous_due_at.as_option()),
            created_by: chore.created_by.to_string(),
            version: chore.version,
            created_at: chore.created_at,
            updated_at: chore.updated_at,
        }
    }
}
