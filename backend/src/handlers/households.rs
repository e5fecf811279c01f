use actix_web::{web, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, CreateHouseholdRequest, UpdateHouseholdRequest, UpdateRoleRequest};

use crate::handlers::{authenticate, chores, internal_error, invitations, parse_id, require_admin, require_member, rooms};
use crate::models::AppState;
use crate::services::households::{self as household_service, HouseholdError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/households")
            .route("", web::get().to(list_households))
            .route("", web::post().to(create_household))
            .route("/{id}", web::get().to(get_household))
            .route("/{id}", web::put().to(update_household))
            .route("/{id}", web::delete().to(delete_household))
            .route("/{id}/members", web::get().to(list_members))
            .route("/{id}/members/{user_id}", web::delete().to(remove_member))
            .route("/{id}/members/{user_id}/role", web::put().to(update_member_role))
            .route("/{id}/leave", web::post().to(leave_household))
            .service(
                web::scope("/{household_id}")
                    .configure(invitations::configure_household)
                    .configure(rooms::configure)
                    .configure(chores::configure)
            )
    );
}

fn household_error(context: &str, e: HouseholdError) -> HttpResponse {
    match e {
        HouseholdError::NotFound => {
            HttpResponse::NotFound().json(ApiError::new("not_found", "Household not found"))
        }
        HouseholdError::NotMember => HttpResponse::NotFound().json(ApiError::new(
            "not_found",
            "User is not a member of this household",
        )),
        HouseholdError::LastAdmin => HttpResponse::BadRequest().json(ApiError::new(
            "last_admin",
            "A household needs at least one admin",
        )),
        e => internal_error(context, e),
    }
}

async fn list_households(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match household_service::list_user_households(&state.db, &user_id).await {
        Ok(households) => Ok(HttpResponse::Ok().json(ApiSuccess::new(households))),
        Err(e) => Ok(internal_error("Failed to list households", e)),
    }
}

async fn create_household(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    body: web::Json<CreateHouseholdRequest>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let request = body.into_inner();
    if request.name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Household name is required",
        )));
    }

    match household_service::create_household(&state.db, &user_id, &request).await {
        Ok(household) => Ok(HttpResponse::Created().json(ApiSuccess::new(household))),
        Err(e) => Ok(internal_error("Failed to create household", e)),
    }
}

async fn get_household(
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
    if let Err(response) = require_member(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match household_service::get_household(&state.db, &household_id).await {
        Ok(Some(household)) => Ok(HttpResponse::Ok().json(ApiSuccess::new(household))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ApiError::new("not_found", "Household not found"))),
        Err(e) => Ok(internal_error("Failed to fetch household", e)),
    }
}

async fn update_household(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateHouseholdRequest>,
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
    if request.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Household name must not be empty",
        )));
    }

    match household_service::update_household(&state.db, &household_id, &request).await {
        Ok(household) => Ok(HttpResponse::Ok().json(ApiSuccess::new(household))),
        Err(e) => Ok(household_error("Failed to update household", e)),
    }
}

async fn delete_household(
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

    match household_service::delete_household(&state.db, &household_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(household_error("Failed to delete household", e)),
    }
}

async fn list_members(
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
    if let Err(response) = require_member(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match household_service::list_members(&state.db, &household_id).await {
        Ok(members) => Ok(HttpResponse::Ok().json(ApiSuccess::new(members))),
        Err(e) => Ok(internal_error("Failed to list members", e)),
    }
}

async fn update_member_role(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let (household_id, member_id) = path.into_inner();
    let household_id = match parse_id(&household_id, "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let member_id = match parse_id(&member_id, "user") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_admin(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match household_service::update_member_role(&state.db, &household_id, &member_id, body.role).await {
        Ok(membership) => Ok(HttpResponse::Ok().json(ApiSuccess::new(membership))),
        Err(e) => Ok(household_error("Failed to update member role", e)),
    }
}

async fn remove_member(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let (household_id, member_id) = path.into_inner();
    let household_id = match parse_id(&household_id, "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let member_id = match parse_id(&member_id, "user") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_admin(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match household_service::remove_member(&state.db, &household_id, &member_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(household_error("Failed to remove member", e)),
    }
}

async fn leave_household(
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
    if let Err(response) = require_member(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match household_service::remove_member(&state.db, &household_id, &user_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(household_error("Failed to leave household", e)),
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
    use shared::{CreateHouseholdRequest, Role};

    #[actix_rt::test]
    async fn test_create_and_list_households() {
        let state = test_state().await;
        let user = create_test_user(&state.db, "frank").await;
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri("/api/households")
            .insert_header(bearer(&user))
            .set_json(json!({"name": "Flat"}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/households")
            .insert_header(bearer(&user))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["data"][0]["name"], "Flat");
    }

    #[actix_rt::test]
    async fn test_non_member_is_forbidden() {
        let state = test_state().await;
        let owner = create_test_user(&state.db, "grace").await;
        let stranger = create_test_user(&state.db, "heidi").await;
        let household = household_service::create_household(
            &state.db,
            &owner.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/households/{}", household.id))
            .insert_header(bearer(&stranger))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn test_last_admin_cannot_leave() {
        let state = test_state().await;
        let owner = create_test_user(&state.db, "ivan").await;
        let member = create_test_user(&state.db, "judy").await;
        let household = household_service::create_household(
            &state.db,
            &owner.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        household_service::add_member(&state.db, &household.id, &member.id, Role::Member)
            .await
            .unwrap();
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/households/{}/leave", household.id))
            .insert_header(bearer(&owner))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/api/households/{}/leave", household.id))
            .insert_header(bearer(&member))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
