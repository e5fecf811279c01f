use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{parse_id, RowError};

/// Database model for household invitations
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InvitationRow {
    pub id: String,
    pub household_id: String,
    pub email: String,
    pub role: String,
    pub invited_by: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl InvitationRow {
    pub fn to_shared(&self) -> Result<shared::Invitation, RowError> {
        let role = self.role.parse().map_err(|_| RowError::InvalidValue {
            column: "household_invitations.role",
            value: self.role.clone(),
        })?;
        let status = self.status.parse().map_err(|_| RowError::InvalidValue {
            column: "household_invitations.status",
            value: self.status.clone(),
        })?;

        Ok(shared::Invitation {
            id: parse_id("household_invitations.id", &self.id)?,
            household_id: parse_id("household_invitations.household_id", &self.household_id)?,
            email: self.email.clone(),
            role,
            invited_by: parse_id("household_invitations.invited_by", &self.invited_by)?,
            status,
            created_at: self.created_at,
            expires_at: self.expires_at,
            responded_at: self.responded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{InvitationStatus, Role};
    use uuid::Uuid;

    #[test]
    fn test_invitation_row_to_shared() {
        let now = Utc::now();
        let expires = now + chrono::Duration::days(7);
        let id = Uuid::new_v4();
        let household_id = Uuid::new_v4();
        let invited_by = Uuid::new_v4();

        let row = InvitationRow {
            id: id.to_string(),
            household_id: household_id.to_string(),
            email: "invitee@example.com".to_string(),
            role: "member".to_string(),
            invited_by: invited_by.to_string(),
            status: "pending".to_string(),
            created_at: now,
            expires_at: expires,
            responded_at: None,
        };

        let shared = row.to_shared().unwrap();

        assert_eq!(shared.id, id);
        assert_eq!(shared.household_id, household_id);
        assert_eq!(shared.email, "invitee@example.com");
        assert_eq!(shared.role, Role::Member);
        assert_eq!(shared.invited_by, invited_by);
        assert_eq!(shared.status, InvitationStatus::Pending);
        assert_eq!(shared.expires_at, expires);
        assert!(shared.responded_at.is_none());
    }
}
