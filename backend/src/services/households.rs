use chrono::Utc;
use futures::future::try_join_all;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{HouseholdRow, MembershipRow, RowError, UserRow};
use shared::{
    CreateHouseholdRequest, Household, HouseholdMembership, MemberWithUser, Role,
    UpdateHouseholdRequest,
};

#[derive(Debug, Error)]
pub enum HouseholdError {
    #[error("Household not found")]
    NotFound,
    #[error("User is not a member of this household")]
    NotMember,
    #[error("The last admin cannot leave or be demoted")]
    LastAdmin,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Corrupt household record: {0}")]
    Row(#[from] RowError),
}

/// Create a household; the creator becomes its first admin
pub async fn create_household(
    pool: &SqlitePool,
    creator_id: &Uuid,
    request: &CreateHouseholdRequest,
) -> Result<Household, HouseholdError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO households (id, name, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&request.name)
    .bind(creator_id.to_string())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO household_memberships (id, household_id, user_id, role, joined_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(id.to_string())
    .bind(creator_id.to_string())
    .bind(Role::Admin.as_str())
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    log::info!("Household {} created by {}", id, creator_id);

    Ok(Household {
        id,
        name: request.name.clone(),
        created_by: *creator_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_household(pool: &SqlitePool, household_id: &Uuid) -> Result<Option<Household>, HouseholdError> {
    let household: Option<HouseholdRow> = sqlx::query_as("SELECT * FROM households WHERE id = ?")
        .bind(household_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(household.map(|h| h.to_shared()).transpose()?)
}

pub async fn list_user_households(pool: &SqlitePool, user_id: &Uuid) -> Result<Vec<Household>, HouseholdError> {
    let households: Vec<HouseholdRow> = sqlx::query_as(
        r#"
        SELECT h.* FROM households h
        JOIN household_memberships m ON h.id = m.household_id
        WHERE m.user_id = ?
        ORDER BY h.created_at DESC
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(households
        .iter()
        .map(HouseholdRow::to_shared)
        .collect::<Result<_, _>>()?)
}

pub async fn update_household(
    pool: &SqlitePool,
    household_id: &Uuid,
    request: &UpdateHouseholdRequest,
) -> Result<Household, HouseholdError> {
    let mut household: HouseholdRow = sqlx::query_as("SELECT * FROM households WHERE id = ?")
        .bind(household_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(HouseholdError::NotFound)?;

    if let Some(ref name) = request.name {
        household.name = name.clone();
    }

    let now = Utc::now();
    household.updated_at = now;

    sqlx::query("UPDATE households SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&household.name)
        .bind(now)
        .bind(household_id.to_string())
        .execute(pool)
        .await?;

    Ok(household.to_shared()?)
}

/// Delete a household together with its chores, rooms, invitations and memberships
pub async fn delete_household(pool: &SqlitePool, household_id: &Uuid) -> Result<(), HouseholdError> {
    let id = household_id.to_string();
    let mut tx = pool.begin().await?;

    for statement in [
        "DELETE FROM chores WHERE household_id = ?",
        "DELETE FROM rooms WHERE household_id = ?",
        "DELETE FROM household_invitations WHERE household_id = ?",
        "DELETE FROM household_memberships WHERE household_id = ?",
    ] {
        sqlx::query(statement).bind(&id).execute(&mut *tx).await?;
    }

    let result = sqlx::query("DELETE FROM households WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(HouseholdError::NotFound);
    }

    tx.commit().await?;
    log::info!("Household {} deleted", household_id);
    Ok(())
}

pub async fn is_member(pool: &SqlitePool, household_id: &Uuid, user_id: &Uuid) -> Result<bool, HouseholdError> {
    Ok(get_member_role(pool, household_id, user_id).await?.is_some())
}

pub async fn get_member_role(
    pool: &SqlitePool,
    household_id: &Uuid,
    user_id: &Uuid,
) -> Result<Option<Role>, HouseholdError> {
    let membership: Option<MembershipRow> = sqlx::query_as(
        "SELECT * FROM household_memberships WHERE household_id = ? AND user_id = ?",
    )
    .bind(household_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(membership
        .map(|m| m.to_shared())
        .transpose()?
        .map(|m| m.role))
}

pub async fn list_members(pool: &SqlitePool, household_id: &Uuid) -> Result<Vec<MemberWithUser>, HouseholdError> {
    let memberships: Vec<MembershipRow> = sqlx::query_as(
        "SELECT * FROM household_memberships WHERE household_id = ? ORDER BY joined_at ASC",
    )
    .bind(household_id.to_string())
    .fetch_all(pool)
    .await?;

    try_join_all(memberships.iter().map(|membership| async move {
        let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&membership.user_id)
            .fetch_one(pool)
            .await?;

        Ok::<_, HouseholdError>(MemberWithUser {
            membership: membership.to_shared()?,
            user: user.to_shared()?,
        })
    }))
    .await
}

pub async fn update_member_role(
    pool: &SqlitePool,
    household_id: &Uuid,
    user_id: &Uuid,
    role: Role,
) -> Result<HouseholdMembership, HouseholdError> {
    let membership = get_membership(pool, household_id, user_id).await?;

    if membership.role == Role::Admin && role != Role::Admin {
        ensure_not_last_admin(pool, household_id).await?;
    }

    sqlx::query("UPDATE household_memberships SET role = ? WHERE household_id = ? AND user_id = ?")
        .bind(role.as_str())
        .bind(household_id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(HouseholdMembership { role, ..membership })
}

/// Remove a member; also used when a member leaves on their own.
/// Chores assigned to the member become unassigned.
pub async fn remove_member(
    pool: &SqlitePool,
    household_id: &Uuid,
    user_id: &Uuid,
) -> Result<(), HouseholdError> {
    let membership = get_membership(pool, household_id, user_id).await?;

    if membership.role == Role::Admin {
        ensure_not_last_admin(pool, household_id).await?;
    }

    let mut tx = pool.begin().await?;

    // bump the version so an edit loaded before the removal cannot restore the assignee
    sqlx::query(
        "UPDATE chores SET assigned_to = NULL, version = version + 1, updated_at = ? WHERE household_id = ? AND assigned_to = ?",
    )
    .bind(Utc::now())
    .bind(household_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM household_memberships WHERE household_id = ? AND user_id = ?")
        .bind(household_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    log::info!("User {} left household {}", user_id, household_id);
    Ok(())
}

async fn get_membership(
    pool: &SqlitePool,
    household_id: &Uuid,
    user_id: &Uuid,
) -> Result<HouseholdMembership, HouseholdError> {
    let membership: MembershipRow = sqlx::query_as(
        "SELECT * FROM household_memberships WHERE household_id = ? AND user_id = ?",
    )
    .bind(household_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(HouseholdError::NotMember)?;

    Ok(membership.to_shared()?)
}

async fn ensure_not_last_admin(pool: &SqlitePool, household_id: &Uuid) -> Result<(), HouseholdError> {
    let admins = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM household_memberships WHERE household_id = ? AND role = ?",
    )
    .bind(household_id.to_string())
    .bind(Role::Admin.as_str())
    .fetch_one(pool)
    .await?;

    if admins <= 1 {
        return Err(HouseholdError::LastAdmin);
    }
    Ok(())
}

/// Insert a membership directly; used when an invitation is accepted
pub async fn add_member(
    pool: &SqlitePool,
    household_id: &Uuid,
    user_id: &Uuid,
    role: Role,
) -> Result<HouseholdMembership, HouseholdError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO household_memberships (id, household_id, user_id, role, joined_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(household_id.to_string())
    .bind(user_id.to_string())
    .bind(role.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(HouseholdMembership {
        id,
        household_id: *household_id,
        user_id: *user_id,
        role,
        joined_at: now,
    })
}
