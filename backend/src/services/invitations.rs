use chrono::{Duration, Utc};
use futures::future::try_join_all;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{HouseholdRow, InvitationRow, RowError};
use crate::services::households::{self as household_service, HouseholdError};
use shared::{HouseholdMembership, Invitation, InvitationStatus, InvitationWithHousehold, Role, User};

const INVITATION_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("Invitation not found")]
    NotFound,
    #[error("User already has a pending invitation")]
    AlreadyExists,
    #[error("User is already a member of this household")]
    AlreadyMember,
    #[error("Invitation has expired")]
    Expired,
    #[error("Invitation is not for this user")]
    NotForUser,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Corrupt invitation record: {0}")]
    Row(#[from] RowError),
    #[error(transparent)]
    Household(#[from] HouseholdError),
}

/// Create a new invitation (7-day expiration)
pub async fn create_invitation(
    pool: &SqlitePool,
    household_id: &Uuid,
    email: &str,
    role: Role,
    invited_by: &Uuid,
) -> Result<Invitation, InvitationError> {
    let email = email.trim().to_lowercase();

    let already_member = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM household_memberships m
        JOIN users u ON u.id = m.user_id
        WHERE m.household_id = ? AND u.email = ?
        "#,
    )
    .bind(household_id.to_string())
    .bind(&email)
    .fetch_one(pool)
    .await?;

    if already_member > 0 {
        return Err(InvitationError::AlreadyMember);
    }

    expire_old_invitations(pool).await?;

    let existing_pending = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM household_invitations WHERE household_id = ? AND email = ? AND status = 'pending'",
    )
    .bind(household_id.to_string())
    .bind(&email)
    .fetch_one(pool)
    .await?;

    if existing_pending > 0 {
        return Err(InvitationError::AlreadyExists);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let expires_at = now + Duration::days(INVITATION_EXPIRY_DAYS);

    sqlx::query(
        r#"
        INSERT INTO household_invitations (id, household_id, email, role, invited_by, status, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(household_id.to_string())
    .bind(&email)
    .bind(role.as_str())
    .bind(invited_by.to_string())
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(Invitation {
        id,
        household_id: *household_id,
        email,
        role,
        invited_by: *invited_by,
        status: InvitationStatus::Pending,
        created_at: now,
        expires_at,
        responded_at: None,
    })
}

/// Pending invitations of a household
pub async fn get_household_invitations(
    pool: &SqlitePool,
    household_id: &Uuid,
) -> Result<Vec<Invitation>, InvitationError> {
    expire_old_invitations(pool).await?;

    let invitations: Vec<InvitationRow> = sqlx::query_as(
        "SELECT * FROM household_invitations WHERE household_id = ? AND status = 'pending' ORDER BY created_at DESC",
    )
    .bind(household_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(invitations
        .iter()
        .map(InvitationRow::to_shared)
        .collect::<Result<_, _>>()?)
}

/// Pending invitations addressed to an email, with their households
pub async fn get_user_invitations(
    pool: &SqlitePool,
    email: &str,
) -> Result<Vec<InvitationWithHousehold>, InvitationError> {
    expire_old_invitations(pool).await?;

    let invitations: Vec<InvitationRow> = sqlx::query_as(
        "SELECT * FROM household_invitations WHERE email = ? AND status = 'pending' ORDER BY created_at DESC",
    )
    .bind(email.trim().to_lowercase())
    .fetch_all(pool)
    .await?;

    try_join_all(invitations.iter().map(|invitation| async move {
        let household: HouseholdRow = sqlx::query_as("SELECT * FROM households WHERE id = ?")
            .bind(&invitation.household_id)
            .fetch_one(pool)
            .await?;

        Ok::<_, InvitationError>(InvitationWithHousehold {
            invitation: invitation.to_shared()?,
            household: household.to_shared()?,
        })
    }))
    .await
}

pub async fn get_invitation(
    pool: &SqlitePool,
    invitation_id: &Uuid,
) -> Result<Invitation, InvitationError> {
    let invitation: InvitationRow =
        sqlx::query_as("SELECT * FROM household_invitations WHERE id = ?")
            .bind(invitation_id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or(InvitationError::NotFound)?;

    Ok(invitation.to_shared()?)
}

/// Pending, unexpired invitation addressed to `user`
async fn get_open_invitation_for(
    pool: &SqlitePool,
    invitation_id: &Uuid,
    user: &User,
) -> Result<Invitation, InvitationError> {
    let invitation = get_invitation(pool, invitation_id).await?;

    if !invitation.email.eq_ignore_ascii_case(&user.email) {
        return Err(InvitationError::NotForUser);
    }

    if invitation.status != InvitationStatus::Pending {
        return Err(InvitationError::NotFound);
    }

    if invitation.expires_at < Utc::now() {
        sqlx::query("UPDATE household_invitations SET status = 'expired' WHERE id = ?")
            .bind(invitation_id.to_string())
            .execute(pool)
            .await?;
        return Err(InvitationError::Expired);
    }

    Ok(invitation)
}

/// Accept an invitation: mark it accepted and create the membership
pub async fn accept_invitation(
    pool: &SqlitePool,
    invitation_id: &Uuid,
    user: &User,
) -> Result<HouseholdMembership, InvitationError> {
    let invitation = get_open_invitation_for(pool, invitation_id, user).await?;

    if household_service::is_member(pool, &invitation.household_id, &user.id).await? {
        return Err(InvitationError::AlreadyMember);
    }

    sqlx::query(
        "UPDATE household_invitations SET status = 'accepted', responded_at = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(invitation_id.to_string())
    .execute(pool)
    .await?;

    let membership =
        household_service::add_member(pool, &invitation.household_id, &user.id, invitation.role)
            .await?;

    log::info!("User {} joined household {}", user.id, invitation.household_id);
    Ok(membership)
}

pub async fn decline_invitation(
    pool: &SqlitePool,
    invitation_id: &Uuid,
    user: &User,
) -> Result<(), InvitationError> {
    get_open_invitation_for(pool, invitation_id, user).await?;

    sqlx::query(
        "UPDATE household_invitations SET status = 'declined', responded_at = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(invitation_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Revoke a pending invitation of a household
pub async fn cancel_invitation(
    pool: &SqlitePool,
    household_id: &Uuid,
    invitation_id: &Uuid,
) -> Result<(), InvitationError> {
    let result = sqlx::query(
        "DELETE FROM household_invitations WHERE id = ? AND household_id = ? AND status = 'pending'",
    )
    .bind(invitation_id.to_string())
    .bind(household_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(InvitationError::NotFound);
    }

    Ok(())
}

async fn expire_old_invitations(pool: &SqlitePool) -> Result<(), InvitationError> {
    sqlx::query(
        "UPDATE household_invitations SET status = 'expired' WHERE status = 'pending' AND expires_at < ?",
    )
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}
