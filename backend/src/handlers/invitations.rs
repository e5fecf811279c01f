use actix_web::{web, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, CreateInvitationRequest, Role, User};
use uuid::Uuid;

use crate::handlers::{authenticate, internal_error, parse_id, require_admin};
use crate::models::AppState;
use crate::services::auth as auth_service;
use crate::services::invitations::{self as invitation_service, InvitationError};

/// Routes for the invitations addressed to the caller
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invitations")
            .route("", web::get().to(list_my_invitations))
            .route("/{id}/accept", web::post().to(accept_invitation))
            .route("/{id}/decline", web::post().to(decline_invitation))
    );
}

/// Routes mounted under `/households/{household_id}`
pub fn configure_household(cfg: &mut web::ServiceConfig) {
    cfg.route("/invitations", web::get().to(list_household_invitations))
        .route("/invitations", web::post().to(invite_member))
        .route("/invitations/{invitation_id}", web::delete().to(cancel_invitation));
}

fn invitation_error(context: &str, e: InvitationError) -> HttpResponse {
    match e {
        InvitationError::NotFound => {
            HttpResponse::NotFound().json(ApiError::new("not_found", "Invitation not found"))
        }
        InvitationError::AlreadyExists | InvitationError::AlreadyMember => {
            HttpResponse::Conflict().json(ApiError::new("conflict", e.to_string()))
        }
        InvitationError::Expired => {
            HttpResponse::BadRequest().json(ApiError::new("invitation_expired", e.to_string()))
        }
        InvitationError::NotForUser => {
            HttpResponse::Forbidden().json(ApiError::new("forbidden", e.to_string()))
        }
        e => internal_error(context, e),
    }
}

async fn current_user(state: &AppState, user_id: &Uuid) -> Result<User, HttpResponse> {
    match auth_service::get_user_by_id(&state.db, user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(HttpResponse::Unauthorized().json(ApiError::new("unauthorized", "Unknown user"))),
        Err(e) => Err(internal_error("Failed to fetch user", e)),
    }
}

async fn list_household_invitations(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let household_id = match parse_id(&path.into_inner(), "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_admin(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match invitation_service::get_household_invitations(&state.db, &household_id).await {
        Ok(invitations) => Ok(HttpResponse::Ok().json(ApiSuccess::new(invitations))),
        Err(e) => Ok(invitation_error("Failed to list invitations", e)),
    }
}

async fn invite_member(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
    body: web::Json<CreateInvitationRequest>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let household_id = match parse_id(&path.into_inner(), "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_admin(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    let request = body.into_inner();
    if !request.email.contains('@') {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "A valid email address is required",
        )));
    }

    let role = request.role.unwrap_or(Role::Member);
    match invitation_service::create_invitation(&state.db, &household_id, &request.email, role, &user_id).await {
        Ok(invitation) => Ok(HttpResponse::Created().json(ApiSuccess::new(invitation))),
        Err(e) => Ok(invitation_error("Failed to create invitation", e)),
    }
}

async fn cancel_invitation(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let (household_id, invitation_id) = path.into_inner();
    let household_id = match parse_id(&household_id, "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let invitation_id = match parse_id(&invitation_id, "invitation") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_admin(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match invitation_service::cancel_invitation(&state.db, &household_id, &invitation_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(invitation_error("Failed to cancel invitation", e)),
    }
}

async fn list_my_invitations(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let user = match current_user(&state, &user_id).await {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    match invitation_service::get_user_invitations(&state.db, &user.email).await {
        Ok(invitations) => Ok(HttpResponse::Ok().json(ApiSuccess::new(invitations))),
        Err(e) => Ok(invitation_error("Failed to list invitations", e)),
    }
}

async fn accept_invitation(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let invitation_id = match parse_id(&path.into_inner(), "invitation") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let user = match current_user(&state, &user_id).await {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    match invitation_service::accept_invitation(&state.db, &invitation_id, &user).await {
        Ok(membership) => Ok(HttpResponse::Ok().json(ApiSuccess::new(membership))),
        Err(e) => Ok(invitation_error("Failed to accept invitation", e)),
    }
}

async fn decline_invitation(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let invitation_id = match parse_id(&path.into_inner(), "invitation") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let user = match current_user(&state, &user_id).await {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    match invitation_service::decline_invitation(&state.db, &invitation_id, &user).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(invitation_error("Failed to decline invitation", e)),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::json;

    use crate::handlers::test_support::{app, bearer, test_state};
    use crate::services::auth::create_test_user;
    use crate::services::households as household_service;
    use shared::CreateHouseholdRequest;

    #[actix_rt::test]
    async fn test_invite_and_accept_over_http() {
        let state = test_state().await;
        let admin = create_test_user(&state.db, "kim").await;
        let guest = create_test_user(&state.db, "leo").await;
        let household = household_service::create_household(
            &state.db,
            &admin.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        let pool = state.db.clone();
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/households/{}/invitations", household.id))
            .insert_header(bearer(&admin))
            .set_json(json!({"email": guest.email}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        let invitation_id = body["data"]["id"].as_str().unwrap().to_string();

        // only the invitee may answer
        let req = test::TestRequest::post()
            .uri(&format!("/api/invitations/{}/accept", invitation_id))
            .insert_header(bearer(&admin))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/api/invitations")
            .insert_header(bearer(&guest))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

        let req = test::TestRequest::post()
            .uri(&format!("/api/invitations/{}/accept", invitation_id))
            .insert_header(bearer(&guest))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        assert!(household_service::is_member(&pool, &household.id, &guest.id).await.unwrap());
    }
}
