use std::sync::Arc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::middleware::RateLimiter;

pub mod user;
pub mod household;
pub mod membership;
pub mod room;
pub mod chore;
pub mod invitation;

pub use user::*;
pub use household::*;
pub use membership::*;
pub use room::*;
pub use chore::*;
pub use invitation::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub login_rate_limiter: Arc<RateLimiter>,
}

/// A stored row that cannot be turned into its domain type
#[derive(Debug, Error)]
pub enum RowError {
    #[error("Invalid id in column {column}: {source}")]
    InvalidId {
        column: &'static str,
        source: uuid::Error,
    },
    #[error("Invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
}

pub(crate) fn parse_id(column: &'static str, value: &str) -> Result<Uuid, RowError> {
    Uuid::parse_str(value).map_err(|source| RowError::InvalidId { column, source })
}

pub(crate) fn parse_optional_id(
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<Uuid>, RowError> {
    value.map(|v| parse_id(column, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id("id", &id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_id("id", "not-a-uuid"),
            Err(RowError::InvalidId { column: "id", .. })
        ));
    }

    #[test]
    fn test_parse_optional_id() {
        assert_eq!(parse_optional_id("room_id", None).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(
            parse_optional_id("room_id", Some(&id.to_string())).unwrap(),
            Some(id)
        );
    }
}
