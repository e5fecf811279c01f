use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ChoreRow, RowError};
use crate::services::households::{self as household_service, HouseholdError};
use crate::services::rooms::{self as room_service, RoomError};
use crate::services::scheduler::{self, ScheduleError};
use shared::{Chore, CreateChoreRequest, UpcomingDueDates, UpdateChoreRequest};

#[derive(Debug, Error)]
pub enum ChoreError {
    #[error("Chore not found")]
    NotFound,
    #[error("Chore was modified concurrently, reload and retry")]
    Conflict,
    #[error("Chore name must not be empty")]
    EmptyName,
    #[error("Recurring chores need a due date")]
    MissingDeadline,
    #[error("Assignee is not a member of this household")]
    InvalidAssignee,
    #[error("Room does not belong to this household")]
    InvalidRoom,
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Corrupt chore record: {0}")]
    Row(#[from] RowError),
    #[error(transparent)]
    Household(#[from] HouseholdError),
    #[error(transparent)]
    Room(#[from] RoomError),
}

pub async fn create_chore(
    pool: &SqlitePool,
    household_id: &Uuid,
    created_by: &Uuid,
    request: &CreateChoreRequest,
) -> Result<Chore, ChoreError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ChoreError::EmptyName);
    }
    scheduler::validate_interval(&request.interval)?;
    validate_links(pool, household_id, request.assigned_to, request.room_id).await?;

    let now = Utc::now();
    let due_at = scheduler::initial_due_date(&request.interval, request.due_at, now)?;

    let mut chore = Chore {
        id: Uuid::new_v4(),
        household_id: *household_id,
        room_id: request.room_id,
        name: name.to_string(),
        description: request.description.clone().unwrap_or_default(),
        assigned_to: request.assigned_to,
        interval: request.interval,
        due_at,
        is_overdue: false,
        last_completion: None,
        created_by: *created_by,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    chore.is_overdue = scheduler::is_chore_overdue_at(&chore, now);

    let row = ChoreRow::from_shared(&chore);
    sqlx::query(
        r#"
        INSERT INTO chores (id, household_id, room_id, name, description, assigned_to, interval_type, interval_value,
            due_at, is_overdue, completed_at, completed_by, previous_due_at, created_by, version, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.household_id)
    .bind(&row.room_id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.assigned_to)
    .bind(&row.interval_type)
    .bind(row.interval_value)
    .bind(row.due_at)
    .bind(row.is_overdue)
    .bind(row.completed_at)
    .bind(&row.completed_by)
    .bind(row.previous_due_at)
    .bind(&row.created_by)
    .bind(row.version)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(pool)
    .await?;

    log::debug!("Chore {} created in household {}", chore.id, household_id);
    Ok(chore)
}

/// Fetch a chore of a household. The overdue flag is recomputed on read.
pub async fn get_chore(
    pool: &SqlitePool,
    household_id: &Uuid,
    chore_id: &Uuid,
) -> Result<Option<Chore>, ChoreError> {
    let row: Option<ChoreRow> = sqlx::query_as("SELECT * FROM chores WHERE id = ? AND household_id = ?")
        .bind(chore_id.to_string())
        .bind(household_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(row
        .map(|r| r.to_shared())
        .transpose()?
        .map(|mut chore| {
            chore.is_overdue = scheduler::is_chore_overdue(&chore);
            chore
        }))
}

/// All chores of a household, most urgent first
pub async fn list_chores(pool: &SqlitePool, household_id: &Uuid) -> Result<Vec<Chore>, ChoreError> {
    let rows: Vec<ChoreRow> = sqlx::query_as("SELECT * FROM chores WHERE household_id = ?")
        .bind(household_id.to_string())
        .fetch_all(pool)
        .await?;

    let now = Utc::now();
    let mut chores = rows
        .iter()
        .map(|row| {
            let mut chore = row.to_shared()?;
            chore.is_overdue = scheduler::is_chore_overdue_at(&chore, now);
            Ok(chore)
        })
        .collect::<Result<Vec<_>, ChoreError>>()?;

    scheduler::sort_by_urgency(&mut chores, now);
    Ok(chores)
}

/// Apply an edit. Changing the interval reschedules the chore one interval
/// from now, unless the same request sets the due date explicitly.
pub async fn update_chore(
    pool: &SqlitePool,
    household_id: &Uuid,
    chore_id: &Uuid,
    request: &UpdateChoreRequest,
) -> Result<Chore, ChoreError> {
    let mut chore = fetch_existing(pool, household_id, chore_id).await?;
    let now = Utc::now();

    if let Some(ref name) = request.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChoreError::EmptyName);
        }
        chore.name = name.to_string();
    }
    if let Some(ref description) = request.description {
        chore.description = description.clone();
    }
    if request.assigned_to.is_some() || request.room_id.is_some() {
        validate_links(pool, household_id, request.assigned_to, request.room_id).await?;
    }
    if let Some(assigned_to) = request.assigned_to {
        chore.assigned_to = Some(assigned_to);
    }
    if let Some(room_id) = request.room_id {
        chore.room_id = Some(room_id);
    }

    if let Some(interval) = request.interval {
        scheduler::validate_interval(&interval)?;
        if interval != chore.interval {
            chore.interval = interval;
            chore.due_at = scheduler::initial_due_date(&interval, None, now)?;
        }
    }
    if let Some(due_at) = request.due_at {
        chore.due_at = due_at;
    }
    if chore.interval.is_recurring() && !chore.due_at.is_scheduled() {
        return Err(ChoreError::MissingDeadline);
    }

    chore.is_overdue = scheduler::is_chore_overdue_at(&chore, now);
    chore.updated_at = now;

    save_chore(pool, &chore).await
}

pub async fn delete_chore(pool: &SqlitePool, household_id: &Uuid, chore_id: &Uuid) -> Result<(), ChoreError> {
    let result = sqlx::query("DELETE FROM chores WHERE id = ? AND household_id = ?")
        .bind(chore_id.to_string())
        .bind(household_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ChoreError::NotFound);
    }
    Ok(())
}

/// Mark a chore done by `actor_id`
pub async fn complete_chore(
    pool: &SqlitePool,
    household_id: &Uuid,
    chore_id: &Uuid,
    actor_id: &Uuid,
) -> Result<Chore, ChoreError> {
    let chore = fetch_existing(pool, household_id, chore_id).await?;
    let completed = scheduler::complete_chore(&chore, *actor_id, Utc::now())?;

    let saved = save_chore(pool, &completed).await?;
    log::info!(
        "Chore {} completed by {}, next due {:?}",
        chore_id,
        actor_id,
        saved.due_at.as_option()
    );
    Ok(saved)
}

/// Undo the last completion of a chore
pub async fn undo_completion(
    pool: &SqlitePool,
    household_id: &Uuid,
    chore_id: &Uuid,
) -> Result<Chore, ChoreError> {
    let chore = fetch_existing(pool, household_id, chore_id).await?;
    let restored = scheduler::undo_completion(&chore, Utc::now())?;

    let saved = save_chore(pool, &restored).await?;
    log::info!("Completion of chore {} undone", chore_id);
    Ok(saved)
}

/// Preview the next `count` due dates, starting from whichever is later of
/// now and the current deadline, the same base completion uses. One-off
/// chores only have their own deadline, if any.
pub async fn upcoming_due_dates(
    pool: &SqlitePool,
    household_id: &Uuid,
    chore_id: &Uuid,
    count: i64,
) -> Result<UpcomingDueDates, ChoreError> {
    let chore = fetch_existing(pool, household_id, chore_id).await?;
    let count = count.min(scheduler::MAX_UPCOMING);

    let dates = if chore.interval.is_recurring() {
        let now = Utc::now();
        let from = chore.due_at.as_option().map_or(now, |due| due.max(now));
        scheduler::get_upcoming_due_dates(from, &chore.interval, count)?
    } else {
        chore
            .due_at
            .as_option()
            .into_iter()
            .take(usize::try_from(count).unwrap_or(0))
            .collect()
    };

    Ok(UpcomingDueDates {
        chore_id: chore.id,
        interval: chore.interval,
        dates,
    })
}

async fn fetch_existing(pool: &SqlitePool, household_id: &Uuid, chore_id: &Uuid) -> Result<Chore, ChoreError> {
    let row: ChoreRow = sqlx::query_as("SELECT * FROM chores WHERE id = ? AND household_id = ?")
        .bind(chore_id.to_string())
        .bind(household_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(ChoreError::NotFound)?;

    Ok(row.to_shared()?)
}

/// Write a chore back if nobody else changed it since it was read.
///
/// The row is matched on the version the chore was loaded with; the stored
/// version is bumped on success.
async fn save_chore(pool: &SqlitePool, chore: &Chore) -> Result<Chore, ChoreError> {
    let saved = Chore {
        version: chore.version + 1,
        ..chore.clone()
    };
    let row = ChoreRow::from_shared(&saved);

    let result = sqlx::query(
        r#"
        UPDATE chores SET room_id = ?, name = ?, description = ?, assigned_to = ?, interval_type = ?,
            interval_value = ?, due_at = ?, is_overdue = ?, completed_at = ?, completed_by = ?,
            previous_due_at = ?, version = ?, updated_at = ?
        WHERE id = ? AND household_id = ? AND version = ?
        "#,
    )
    .bind(&row.room_id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.assigned_to)
    .bind(&row.interval_type)
    .bind(row.interval_value)
    .bind(row.due_at)
    .bind(row.is_overdue)
    .bind(row.completed_at)
    .bind(&row.completed_by)
    .bind(row.previous_due_at)
    .bind(row.version)
    .bind(row.updated_at)
    .bind(&row.id)
    .bind(&row.household_id)
    .bind(chore.version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chores WHERE id = ?")
            .bind(&row.id)
            .fetch_one(pool)
            .await?;
        return Err(if exists > 0 {
            ChoreError::Conflict
        } else {
            ChoreError::NotFound
        });
    }

    Ok(saved)
}

async fn validate_links(
    pool: &SqlitePool,
    household_id: &Uuid,
    assigned_to: Option<Uuid>,
    room_id: Option<Uuid>,
) -> Result<(), ChoreError> {
    if let Some(user_id) = assigned_to {
        if !household_service::is_member(pool, household_id, &user_id).await? {
            return Err(ChoreError::InvalidAssignee);
        }
    }
    if let Some(room_id) = room_id {
        if room_service::get_room(pool, household_id, &room_id).await?.is_none() {
            return Err(ChoreError::InvalidRoom);
        }
    }
    Ok(())
}
