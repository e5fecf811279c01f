use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::time;

use crate::models::{ChoreRow, RowError};
use crate::services::scheduler;
use shared::Chore;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackgroundJobError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Corrupt chore record: {0}")]
    Row(#[from] RowError),
    #[error("Reminder window of {0} reaches past the last representable date")]
    WindowOutOfRange(Duration),
}

/// Result of one overdue-flag refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverdueReport {
    pub checked: i64,
    pub newly_overdue: i64,
    pub cleared: i64,
}

/// Configuration for the background job scheduler
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Seconds between overdue checks
    pub check_interval_secs: u64,
    /// How far ahead a deadline counts as "due soon"
    pub reminder_window: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            reminder_window: Duration::hours(24),
        }
    }
}

/// Remembers which deadline each chore was last reminded about, so a chore
/// stays quiet on later ticks until it gets a new deadline.
#[derive(Debug, Default)]
pub struct ReminderLog {
    reminded: HashMap<Uuid, DateTime<Utc>>,
}

impl ReminderLog {
    /// Keep the chores not yet reminded for their current deadline and
    /// forget chores that left the window.
    pub fn take_new(&mut self, due_soon: Vec<Chore>) -> Vec<Chore> {
        let mut seen = HashMap::with_capacity(due_soon.len());
        let mut fresh = Vec::new();

        for chore in due_soon {
            let Some(due) = chore.due_at.as_option() else {
                continue;
            };
            let is_new = self.reminded.get(&chore.id) != Some(&due);
            seen.insert(chore.id, due);
            if is_new {
                fresh.push(chore);
            }
        }

        self.reminded = seen;
        fresh
    }
}

/// Run the periodic chore checks forever
pub async fn start_scheduler(pool: Arc<SqlitePool>, config: JobConfig) {
    log::info!(
        "Background job scheduler started. Overdue check every {} seconds",
        config.check_interval_secs
    );

    let mut ticker = time::interval(std::time::Duration::from_secs(config.check_interval_secs.max(1)));
    let mut reminders = ReminderLog::default();

    loop {
        ticker.tick().await;
        let now = Utc::now();

        match refresh_overdue_flags(&pool, now).await {
            Ok(report) => {
                log::info!(
                    "Overdue check complete: checked {} chores, {} newly overdue, {} cleared",
                    report.checked,
                    report.newly_overdue,
                    report.cleared
                );
            }
            Err(e) => {
                log::error!("Error refreshing overdue flags: {}", e);
            }
        }

        match find_due_soon(&pool, now, config.reminder_window).await {
            Ok(chores) => {
                for chore in reminders.take_new(chores) {
                    log::info!(
                        "Reminder: chore {} ({}) in household {} is due at {:?}",
                        chore.id,
                        chore.name,
                        chore.household_id,
                        chore.due_at.as_option()
                    );
                }
            }
            Err(e) => {
                log::error!("Error looking up chores due soon: {}", e);
            }
        }
    }
}

/// Recompute the stored `is_overdue` flag of every chore.
///
/// Only rows whose flag changed are written. The write is matched on the
/// version that was read so a concurrent completion is never overwritten; the
/// version itself is left alone since the flag is derived data.
pub async fn refresh_overdue_flags(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<OverdueReport, BackgroundJobError> {
    let rows: Vec<ChoreRow> = sqlx::query_as("SELECT * FROM chores")
        .fetch_all(pool)
        .await?;

    let mut report = OverdueReport::default();

    for row in rows {
        let chore = row.to_shared()?;
        report.checked += 1;

        let overdue = scheduler::is_chore_overdue_at(&chore, now);
        if overdue == chore.is_overdue {
            continue;
        }

        let result = sqlx::query("UPDATE chores SET is_overdue = ? WHERE id = ? AND version = ?")
            .bind(overdue)
            .bind(&row.id)
            .bind(row.version)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            log::debug!("Chore {} changed during overdue check, skipping", row.id);
            continue;
        }

        if overdue {
            report.newly_overdue += 1;
        } else {
            report.cleared += 1;
        }
    }

    Ok(report)
}

/// Pending chores whose deadline falls within `[now, now + window)`
pub async fn find_due_soon(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<Chore>, BackgroundJobError> {
    let rows: Vec<ChoreRow> = sqlx::query_as(
        "SELECT * FROM chores WHERE due_at IS NOT NULL AND completed_at IS NULL",
    )
    .fetch_all(pool)
    .await?;

    let until = now
        .checked_add_signed(window)
        .ok_or(BackgroundJobError::WindowOutOfRange(window))?;
    let mut chores = Vec::new();
    for row in rows {
        let chore = row.to_shared()?;
        if let Some(due) = chore.due_at.as_option() {
            if due >= now && due < until {
                chores.push(chore);
            }
        }
    }

    chores.sort_by_key(|c| c.due_at.as_option());
    Ok(chores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::auth::create_test_user;
    use crate::services::{chores as chore_service, households as household_service};
    use shared::{CreateChoreRequest, CreateHouseholdRequest, Deadline, Interval, IntervalType};

    async fn setup() -> (SqlitePool, Uuid, Uuid) {
        let pool = db::test_pool().await;
        let user = create_test_user(&pool, "alice").await;
        let household = household_service::create_household(
            &pool,
            &user.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        (pool, household.id, user.id)
    }

    async fn create(pool: &SqlitePool, household_id: &Uuid, user_id: &Uuid, name: &str, due: DateTime<Utc>) -> Chore {
        chore_service::create_chore(
            pool,
            household_id,
            user_id,
            &CreateChoreRequest {
                name: name.to_string(),
                description: None,
                interval: Interval::new(IntervalType::Daily, 1),
                due_at: Some(due),
                assigned_to: None,
                room_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_job_config_default() {
        let config = JobConfig::default();
        assert_eq!(config.check_interval_secs, 300);
        assert_eq!(config.reminder_window, Duration::hours(24));
    }

    #[tokio::test]
    async fn test_refresh_overdue_flags() {
        let (pool, household_id, user_id) = setup().await;
        let now = Utc::now();
        let chore = create(&pool, &household_id, &user_id, "Dishes", now + Duration::hours(2)).await;
        assert!(!chore.is_overdue);

        let later = now + Duration::hours(3);
        let report = refresh_overdue_flags(&pool, later).await.unwrap();
        assert_eq!(
            report,
            OverdueReport { checked: 1, newly_overdue: 1, cleared: 0 }
        );

        let stored: bool = sqlx::query_scalar("SELECT is_overdue FROM chores WHERE id = ?")
            .bind(chore.id.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(stored);

        // flag is already in sync, nothing to write
        let report = refresh_overdue_flags(&pool, later).await.unwrap();
        assert_eq!(report.newly_overdue, 0);

        let report = refresh_overdue_flags(&pool, now).await.unwrap();
        assert_eq!(report.cleared, 1);
    }

    #[tokio::test]
    async fn test_find_due_soon_window_out_of_range() {
        let (pool, _, _) = setup().await;
        let window = Duration::hours(2_000_000_000_000);

        assert!(matches!(
            find_due_soon(&pool, Utc::now(), window).await,
            Err(BackgroundJobError::WindowOutOfRange(_))
        ));
    }

    #[tokio::test]
    async fn test_reminder_log_reminds_once_per_deadline() {
        let (pool, household_id, user_id) = setup().await;
        let now = Utc::now();
        let chore = create(&pool, &household_id, &user_id, "Bins", now + Duration::hours(1)).await;

        let mut log = ReminderLog::default();
        let due = find_due_soon(&pool, now, Duration::hours(24)).await.unwrap();
        assert_eq!(log.take_new(due).len(), 1);

        // next tick, same deadline
        let due = find_due_soon(&pool, now, Duration::hours(24)).await.unwrap();
        assert!(log.take_new(due).is_empty());

        // a new deadline is reminded again
        let moved = Chore {
            due_at: Deadline::Scheduled(now + Duration::hours(2)),
            ..chore.clone()
        };
        assert_eq!(log.take_new(vec![moved.clone()]).len(), 1);

        // leaving the window forgets the chore
        assert!(log.take_new(vec![]).is_empty());
        assert_eq!(log.take_new(vec![moved]).len(), 1);
    }

    #[tokio::test]
    async fn test_find_due_soon() {
        let (pool, household_id, user_id) = setup().await;
        let now = Utc::now();
        create(&pool, &household_id, &user_id, "soon", now + Duration::hours(5)).await;
        create(&pool, &household_id, &user_id, "sooner", now + Duration::hours(1)).await;
        create(&pool, &household_id, &user_id, "later", now + Duration::days(3)).await;
        create(&pool, &household_id, &user_id, "past", now - Duration::hours(1)).await;

        let due = find_due_soon(&pool, now, Duration::hours(24)).await.unwrap();
        let names: Vec<&str> = due.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sooner", "soon"]);
    }
}
