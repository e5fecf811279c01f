use actix_web::{web, HttpResponse, Result};
use shared::{ApiError, ApiSuccess};

use crate::handlers::{authenticate, internal_error};
use crate::models::AppState;
use crate::services::auth as auth_service;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/users").route("/me", web::get().to(get_current_user)));
}

async fn get_current_user(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match auth_service::get_user_by_id(&state.db, &user_id).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ApiError::new("not_found", "User not found"))),
        Err(e) => Ok(internal_error("Failed to fetch user", e)),
    }
}
