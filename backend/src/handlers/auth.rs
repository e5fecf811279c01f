use actix_web::{web, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, AuthResponse, CreateUserRequest, LoginRequest};

use crate::handlers::internal_error;
use crate::models::AppState;
use crate::services::auth::{self as auth_service, AuthError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
    );
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    // Validate input
    if request.username.trim().is_empty() || request.email.trim().is_empty() || request.password.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Username, email, and password are required",
        )));
    }

    if !request.email.contains('@') {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Email address is invalid",
        )));
    }

    if request.password.len() < 8 {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Password must be at least 8 characters",
        )));
    }

    match auth_service::register_user(&state.db, &request).await {
        Ok(user) => {
            match auth_service::create_jwt(&user.id, &state.config.jwt_secret, state.config.jwt_expiration_hours) {
                Ok(token) => Ok(HttpResponse::Created().json(ApiSuccess::new(AuthResponse { token, user }))),
                Err(e) => Ok(internal_error("Failed to create token", e)),
            }
        }
        Err(AuthError::UserAlreadyExists) => Ok(HttpResponse::Conflict().json(ApiError::new(
            "registration_error",
            AuthError::UserAlreadyExists.to_string(),
        ))),
        Err(e) => Ok(internal_error("Failed to register user", e)),
    }
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    let key = request.username.trim().to_lowercase();

    if !state.login_rate_limiter.check(&key) {
        log::warn!("Login rate limit hit for {}", key);
        return Ok(HttpResponse::TooManyRequests().json(ApiError::new(
            "rate_limited",
            "Too many login attempts, try again later",
        )));
    }

    match auth_service::login_user(&state.db, &request).await {
        Ok(user) => {
            state.login_rate_limiter.clear(&key);
            match auth_service::create_jwt(&user.id, &state.config.jwt_secret, state.config.jwt_expiration_hours) {
                Ok(token) => Ok(HttpResponse::Ok().json(ApiSuccess::new(AuthResponse { token, user }))),
                Err(e) => Ok(internal_error("Failed to create token", e)),
            }
        }
        Err(AuthError::InvalidCredentials) => {
            state.login_rate_limiter.record(&key);
            Ok(HttpResponse::Unauthorized().json(ApiError::new(
                "authentication_error",
                "Invalid username or password",
            )))
        }
        Err(e) => Ok(internal_error("Failed to log in", e)),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::json;

    use crate::handlers::test_support::{app, test_state};

    #[actix_rt::test]
    async fn test_register_and_login() {
        let state = test_state().await;
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({"username": "carol", "email": "carol@example.com", "password": "long enough"}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "carol", "password": "long enough"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        assert!(body["data"]["token"].as_str().is_some());
        assert_eq!(body["data"]["user"]["username"], "carol");
    }

    #[actix_rt::test]
    async fn test_register_rejects_short_password() {
        let state = test_state().await;
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({"username": "dave", "email": "dave@example.com", "password": "short"}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_login_rate_limited() {
        let state = test_state().await;
        let service = test::init_service(app(state)).await;

        for _ in 0..5 {
            let req = test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({"username": "mallory", "password": "guess"}))
                .to_request();
            let resp = test::call_service(&service, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "Mallory", "password": "guess"}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
