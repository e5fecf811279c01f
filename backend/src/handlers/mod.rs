use actix_web::{web, HttpRequest, HttpResponse};
use shared::{ApiError, Role};
use uuid::Uuid;

use crate::models::AppState;
use crate::services::households as household_service;

pub mod auth;
pub mod users;
pub mod households;
pub mod invitations;
pub mod rooms;
pub mod chores;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth::configure)
            .configure(users::configure)
            .configure(invitations::configure)
            .configure(households::configure)
    );
}

// Guards shared by the handlers. Each returns the response to send when the
// check fails.

pub(crate) fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Uuid, HttpResponse> {
    crate::middleware::auth::extract_user_id(req, &state.config.jwt_secret).map_err(|_| {
        HttpResponse::Unauthorized().json(ApiError::new("unauthorized", "Invalid or missing token"))
    })
}

pub(crate) fn parse_id(value: &str, what: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(value).map_err(|_| {
        HttpResponse::BadRequest().json(ApiError::new("invalid_id", format!("Invalid {} ID format", what)))
    })
}

/// Role of the caller in the household; 403 when not a member
pub(crate) async fn require_member(
    state: &AppState,
    household_id: &Uuid,
    user_id: &Uuid,
) -> Result<Role, HttpResponse> {
    match household_service::get_member_role(&state.db, household_id, user_id).await {
        Ok(Some(role)) => Ok(role),
        Ok(None) => Err(HttpResponse::Forbidden().json(ApiError::new(
            "forbidden",
            "You are not a member of this household",
        ))),
        Err(e) => Err(internal_error("Error checking membership", e)),
    }
}

pub(crate) async fn require_admin(
    state: &AppState,
    household_id: &Uuid,
    user_id: &Uuid,
) -> Result<(), HttpResponse> {
    let role = require_member(state, household_id, user_id).await?;
    if !role.can_manage_household() {
        return Err(HttpResponse::Forbidden().json(ApiError::new(
            "forbidden",
            "Only admins can do this",
        )));
    }
    Ok(())
}

pub(crate) fn internal_error(context: &str, error: impl std::fmt::Debug) -> HttpResponse {
    log::error!("{}: {:?}", context, error);
    HttpResponse::InternalServerError().json(ApiError::new("internal_error", context))
}

#[cfg(test)]
pub(crate) mod test_support {
    use actix_web::{web, App};
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db;
    use crate::middleware::RateLimiter;
    use crate::models::AppState;
    use crate::services::auth as auth_service;
    use shared::User;

    pub const SECRET: &str = "test-secret";

    pub async fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState {
            db: db::test_pool().await,
            config: Config {
                host: "127.0.0.1".to_string(),
                port: 0,
                database_url: "sqlite::memory:".to_string(),
                jwt_secret: SECRET.to_string(),
                jwt_expiration_hours: 1,
                cors_origins: vec![],
                overdue_check_interval_secs: 300,
                reminder_window_hours: 24,
            },
            login_rate_limiter: Arc::new(RateLimiter::new(5, 15 * 60)),
        })
    }

    pub fn app(
        state: web::Data<AppState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().app_data(state).configure(super::configure_routes)
    }

    pub fn bearer(user: &User) -> (&'static str, String) {
        let token = auth_service::create_jwt(&user.id, SECRET, 1).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }
}
