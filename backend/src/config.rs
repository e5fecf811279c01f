use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Reminders look at most one year ahead
const MAX_REMINDER_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub cors_origins: Vec<String>,
    pub overdue_check_interval_secs: u64,
    pub reminder_window_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:chores.db?mode=rwc".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-key-change-in-production".to_string()),
            jwt_expiration_hours: parse_var("JWT_EXPIRATION_HOURS", 24)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost".to_string())
                .split(',')
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            overdue_check_interval_secs: parse_var("OVERDUE_CHECK_INTERVAL_SECS", 300)?,
            reminder_window_hours: parse_var("REMINDER_WINDOW_HOURS", 24)?,
        };

        check_range("REMINDER_WINDOW_HOURS", config.reminder_window_hours, 1, MAX_REMINDER_WINDOW_HOURS)?;
        Ok(config)
    }

    pub fn reminder_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.reminder_window_hours)
    }
}

fn check_range(name: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { name, value, min, max });
    }
    Ok(())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("DATABASE_URL");
        env::remove_var("JWT_SECRET");
        env::remove_var("JWT_EXPIRATION_HOURS");
        env::remove_var("CORS_ORIGINS");
        env::remove_var("OVERDUE_CHECK_INTERVAL_SECS");
        env::remove_var("REMINDER_WINDOW_HOURS");
    }

    #[test]
    fn test_config_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite:chores.db?mode=rwc");
        assert_eq!(config.jwt_expiration_hours, 24);
        assert_eq!(config.cors_origins, vec!["http://localhost".to_string()]);
        assert_eq!(config.overdue_check_interval_secs, 300);
        assert_eq!(config.reminder_window_hours, 24);
    }

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("HOST", "0.0.0.0");
        env::set_var("PORT", "3000");
        env::set_var("DATABASE_URL", "sqlite:test.db");
        env::set_var("JWT_SECRET", "test-secret");
        env::set_var("JWT_EXPIRATION_HOURS", "48");
        env::set_var("CORS_ORIGINS", "http://a.test, http://b.test");
        env::set_var("OVERDUE_CHECK_INTERVAL_SECS", "60");
        env::set_var("REMINDER_WINDOW_HOURS", "6");

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite:test.db");
        assert_eq!(config.jwt_secret, "test-secret");
        assert_eq!(config.jwt_expiration_hours, 48);
        assert_eq!(
            config.cors_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.overdue_check_interval_secs, 60);
        assert_eq!(config.reminder_window_hours, 6);

        // Clean up
        clear_env();
    }

    #[test]
    fn test_config_invalid_number() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("PORT", "eighty");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.to_string(), "PORT must be a number, got \"eighty\"");

        clear_env();
    }

    #[test]
    fn test_config_reminder_window_range() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        for value in ["-1", "0", "2000000000000"] {
            env::set_var("REMINDER_WINDOW_HOURS", value);
            assert!(
                matches!(
                    Config::from_env(),
                    Err(ConfigError::OutOfRange { name: "REMINDER_WINDOW_HOURS", .. })
                ),
                "{} should be rejected",
                value
            );
        }

        env::set_var("REMINDER_WINDOW_HOURS", "8784");
        let config = Config::from_env().unwrap();
        assert_eq!(config.reminder_window(), chrono::Duration::hours(8784));

        clear_env();
    }

    #[test]
    fn test_config_cors_origin_trailing_slash() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("CORS_ORIGINS", "http://a.test/");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test".to_string()]);

        clear_env();
    }
}
