use chrono::{DateTime, Days, Months, Utc};
use shared::{Chore, CompletionRecord, Deadline, Interval, IntervalType};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound for upcoming-date previews requested over the API
pub const MAX_UPCOMING: i64 = 52;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Due date out of range")]
    OutOfRange,
}

/// Validate an interval at the create/edit boundary
pub fn validate_interval(interval: &Interval) -> Result<(), ScheduleError> {
    if interval.value < 1 {
        return Err(ScheduleError::InvalidInterval(
            "value must be at least 1".to_string(),
        ));
    }
    if interval.kind == IntervalType::Once && interval.value != 1 {
        return Err(ScheduleError::InvalidInterval(
            "one-off chores must have value 1".to_string(),
        ));
    }
    Ok(())
}

/// Compute the next due date one interval after `from`.
///
/// Months and years follow calendar arithmetic: the day of month is kept and
/// clamped to the last day when the target month is shorter (Jan 31 + 1 month
/// is Feb 28/29). One-off intervals have no next occurrence and are rejected.
pub fn calculate_next_due_date(
    from: DateTime<Utc>,
    interval: &Interval,
) -> Result<DateTime<Utc>, ScheduleError> {
    if interval.value < 1 {
        return Err(ScheduleError::InvalidInterval(
            "value must be at least 1".to_string(),
        ));
    }

    let value = interval.value;
    let next = match interval.kind {
        IntervalType::Daily | IntervalType::Custom => {
            from.checked_add_days(Days::new(u64::from(value)))
        }
        IntervalType::Weekly => from.checked_add_days(Days::new(u64::from(value) * 7)),
        IntervalType::Monthly => from.checked_add_months(Months::new(value)),
        IntervalType::Yearly => value
            .checked_mul(12)
            .and_then(|months| from.checked_add_months(Months::new(months))),
        IntervalType::Once => {
            return Err(ScheduleError::InvalidInterval(
                "one-off chores do not recur".to_string(),
            ));
        }
    };

    next.ok_or(ScheduleError::OutOfRange)
}

/// Enumerate the next `count` due dates after `from`, each one interval after
/// the previous. A non-positive count yields no dates.
pub fn get_upcoming_due_dates(
    from: DateTime<Utc>,
    interval: &Interval,
    count: i64,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    validate_interval(interval)?;
    if !interval.is_recurring() {
        return Err(ScheduleError::InvalidInterval(
            "one-off chores do not recur".to_string(),
        ));
    }
    let count = usize::try_from(count).unwrap_or(0);
    if count == 0 {
        return Ok(Vec::new());
    }
    let first = calculate_next_due_date(from, interval)?;

    let mut failure = None;
    let dates: Vec<DateTime<Utc>> = std::iter::successors(Some(first), |previous| {
        match calculate_next_due_date(*previous, interval) {
            Ok(next) => Some(next),
            Err(e) => {
                failure = Some(e);
                None
            }
        }
    })
    .take(count)
    .collect();

    match failure {
        Some(e) if dates.len() < count => Err(e),
        _ => Ok(dates),
    }
}

/// Whether a chore is overdue right now
pub fn is_chore_overdue(chore: &Chore) -> bool {
    is_chore_overdue_at(chore, Utc::now())
}

/// A chore is overdue when it has a deadline in the past and has not been
/// completed since. Undated chores are never overdue.
pub fn is_chore_overdue_at(chore: &Chore, now: DateTime<Utc>) -> bool {
    match chore.due_at {
        Deadline::NoDeadline => false,
        Deadline::Scheduled(due) => due < now && chore.last_completion.is_none(),
    }
}

/// Initial deadline for a new chore: an explicit date wins, otherwise
/// one-off chores stay undated and recurring chores are due one interval
/// from now.
pub fn initial_due_date(
    interval: &Interval,
    explicit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Deadline, ScheduleError> {
    if let Some(at) = explicit {
        return Ok(Deadline::Scheduled(at));
    }

    if interval.is_recurring() {
        Ok(Deadline::Scheduled(calculate_next_due_date(now, interval)?))
    } else {
        Ok(Deadline::NoDeadline)
    }
}

/// Mark a chore done.
///
/// Recurring chores are rescheduled from whichever is later of now and the
/// current deadline, so a chore completed late is not immediately overdue
/// again. One-off chores keep their deadline. Completing an already completed
/// chore reschedules it once more.
pub fn complete_chore(
    chore: &Chore,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Chore, ScheduleError> {
    let previous_due_at = chore.due_at;

    let due_at = if chore.interval.is_recurring() {
        let base = match previous_due_at {
            Deadline::Scheduled(due) => due.max(now),
            Deadline::NoDeadline => now,
        };
        Deadline::Scheduled(calculate_next_due_date(base, &chore.interval)?)
    } else {
        previous_due_at
    };

    Ok(Chore {
        due_at,
        is_overdue: false,
        last_completion: Some(CompletionRecord {
            completed_at: now,
            completed_by: actor_id,
            previous_due_at,
        }),
        updated_at: now,
        ..chore.clone()
    })
}

/// Reverse the most recent completion, restoring the deadline it replaced
pub fn undo_completion(chore: &Chore, now: DateTime<Utc>) -> Result<Chore, ScheduleError> {
    let completion = chore.last_completion.as_ref().ok_or_else(|| {
        ScheduleError::InvalidTransition("No completion to undo".to_string())
    })?;

    let mut restored = Chore {
        due_at: completion.previous_due_at,
        last_completion: None,
        updated_at: now,
        ..chore.clone()
    };
    restored.is_overdue = is_chore_overdue_at(&restored, now);

    Ok(restored)
}

/// Order chores for display: pending before completed, overdue first, then
/// by deadline with undated chores last.
pub fn sort_by_urgency(chores: &mut [Chore], now: DateTime<Utc>) {
    chores.sort_by(|a, b| compare_urgency(a, b, now));
}

fn compare_urgency(a: &Chore, b: &Chore, now: DateTime<Utc>) -> Ordering {
    a.is_completed()
        .cmp(&b.is_completed())
        .then_with(|| is_chore_overdue_at(b, now).cmp(&is_chore_overdue_at(a, now)))
        .then_with(|| match (a.due_at, b.due_at) {
            (Deadline::Scheduled(x), Deadline::Scheduled(y)) => x.cmp(&y),
            (Deadline::Scheduled(_), Deadline::NoDeadline) => Ordering::Less,
            (Deadline::NoDeadline, Deadline::Scheduled(_)) => Ordering::Greater,
            (Deadline::NoDeadline, Deadline::NoDeadline) => Ordering::Equal,
        })
        .then_with(|| a.name.cmp(&b.name))
}
