use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use shared::{ApiError, ApiSuccess, CreateChoreRequest, UpdateChoreRequest};
use uuid::Uuid;

use crate::handlers::{authenticate, internal_error, parse_id, require_member};
use crate::models::AppState;
use crate::services::chores::{self as chore_service, ChoreError};
use crate::services::households::HouseholdError;
use crate::services::scheduler::ScheduleError;

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    #[serde(default = "default_count")]
    count: i64,
}

fn default_count() -> i64 {
    5
}

/// Routes mounted under `/households/{household_id}`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/chores", web::get().to(list_chores))
        .route("/chores", web::post().to(create_chore))
        .route("/chores/{chore_id}", web::get().to(get_chore))
        .route("/chores/{chore_id}", web::put().to(update_chore))
        .route("/chores/{chore_id}", web::delete().to(delete_chore))
        .route("/chores/{chore_id}/complete", web::post().to(complete_chore))
        .route("/chores/{chore_id}/undo", web::post().to(undo_completion))
        .route("/chores/{chore_id}/upcoming", web::get().to(upcoming_due_dates));
}

fn chore_error(context: &str, e: ChoreError) -> HttpResponse {
    match e {
        ChoreError::NotFound | ChoreError::Household(HouseholdError::NotFound) => {
            HttpResponse::NotFound().json(ApiError::new("not_found", "Chore not found"))
        }
        ChoreError::Conflict => HttpResponse::Conflict().json(ApiError::new("conflict", e.to_string())),
        ChoreError::EmptyName
        | ChoreError::MissingDeadline
        | ChoreError::InvalidAssignee
        | ChoreError::InvalidRoom => {
            HttpResponse::BadRequest().json(ApiError::new("validation_error", e.to_string()))
        }
        ChoreError::Schedule(ScheduleError::InvalidInterval(message)) => {
            HttpResponse::BadRequest().json(ApiError::new("invalid_interval", message))
        }
        ChoreError::Schedule(ScheduleError::InvalidTransition(message)) => {
            HttpResponse::BadRequest().json(ApiError::new("invalid_transition", message))
        }
        ChoreError::Schedule(ScheduleError::OutOfRange) => HttpResponse::BadRequest().json(ApiError::new(
            "out_of_range",
            ScheduleError::OutOfRange.to_string(),
        )),
        e => internal_error(context, e),
    }
}

/// Parse `{household_id}/{chore_id}` and check the caller belongs to the household
async fn chore_path(
    state: &AppState,
    req: &actix_web::HttpRequest,
    path: (String, String),
) -> Result<(Uuid, Uuid, Uuid), HttpResponse> {
    let user_id = authenticate(req, state)?;
    let household_id = parse_id(&path.0, "household")?;
    let chore_id = parse_id(&path.1, "chore")?;
    require_member(state, &household_id, &user_id).await?;
    Ok((user_id, household_id, chore_id))
}

async fn list_chores(
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

    match chore_service::list_chores(&state.db, &household_id).await {
        Ok(chores) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chores))),
        Err(e) => Ok(chore_error("Failed to list chores", e)),
    }
}

async fn create_chore(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
    body: web::Json<CreateChoreRequest>,
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

    match chore_service::create_chore(&state.db, &household_id, &user_id, &body.into_inner()).await {
        Ok(chore) => Ok(HttpResponse::Created().json(ApiSuccess::new(chore))),
        Err(e) => Ok(chore_error("Failed to create chore", e)),
    }
}

async fn get_chore(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (_, household_id, chore_id) = match chore_path(&state, &req, path.into_inner()).await {
        Ok(ids) => ids,
        Err(response) => return Ok(response),
    };

    match chore_service::get_chore(&state.db, &household_id, &chore_id).await {
        Ok(Some(chore)) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chore))),
        Ok(None) => Ok(chore_error("Failed to fetch chore", ChoreError::NotFound)),
        Err(e) => Ok(chore_error("Failed to fetch chore", e)),
    }
}

async fn update_chore(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<UpdateChoreRequest>,
) -> Result<HttpResponse> {
    let (_, household_id, chore_id) = match chore_path(&state, &req, path.into_inner()).await {
        Ok(ids) => ids,
        Err(response) => return Ok(response),
    };

    match chore_service::update_chore(&state.db, &household_id, &chore_id, &body.into_inner()).await {
        Ok(chore) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chore))),
        Err(e) => Ok(chore_error("Failed to update chore", e)),
    }
}

async fn delete_chore(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (_, household_id, chore_id) = match chore_path(&state, &req, path.into_inner()).await {
        Ok(ids) => ids,
        Err(response) => return Ok(response),
    };

    match chore_service::delete_chore(&state.db, &household_id, &chore_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(chore_error("Failed to delete chore", e)),
    }
}

async fn complete_chore(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, household_id, chore_id) = match chore_path(&state, &req, path.into_inner()).await {
        Ok(ids) => ids,
        Err(response) => return Ok(response),
    };

    match chore_service::complete_chore(&state.db, &household_id, &chore_id, &user_id).await {
        Ok(chore) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chore))),
        Err(e) => Ok(chore_error("Failed to complete chore", e)),
    }
}

async fn undo_completion(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (_, household_id, chore_id) = match chore_path(&state, &req, path.into_inner()).await {
        Ok(ids) => ids,
        Err(response) => return Ok(response),
    };

    match chore_service::undo_completion(&state.db, &household_id, &chore_id).await {
        Ok(chore) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chore))),
        Err(e) => Ok(chore_error("Failed to undo completion", e)),
    }
}

async fn upcoming_due_dates(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
    query: web::Query<UpcomingQuery>,
) -> Result<HttpResponse> {
    let (_, household_id, chore_id) = match chore_path(&state, &req, path.into_inner()).await {
        Ok(ids) => ids,
        Err(response) => return Ok(response),
    };

    match chore_service::upcoming_due_dates(&state.db, &household_id, &chore_id, query.count).await {
        Ok(upcoming) => Ok(HttpResponse::Ok().json(ApiSuccess::new(upcoming))),
        Err(e) => Ok(chore_error("Failed to compute upcoming due dates", e)),
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
    async fn test_chore_lifecycle_over_http() {
        let state = test_state().await;
        let user = create_test_user(&state.db, "mona").await;
        let household = household_service::create_household(
            &state.db,
            &user.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        let service = test::init_service(app(state)).await;
        let base = format!("/api/households/{}/chores", household.id);

        let req = test::TestRequest::post()
            .uri(&base)
            .insert_header(bearer(&user))
            .set_json(json!({
                "name": "Water plants",
                "interval": {"type": "weekly", "value": 1},
                "due_at": "2030-01-01T09:00:00Z"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        let chore_id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["due_at"]["at"], "2030-01-01T09:00:00Z");

        let req = test::TestRequest::get()
            .uri(&format!("{}/{}/upcoming?count=3", base, chore_id))
            .insert_header(bearer(&user))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(
            body["data"]["dates"],
            json!(["2030-01-08T09:00:00Z", "2030-01-15T09:00:00Z", "2030-01-22T09:00:00Z"])
        );

        let req = test::TestRequest::post()
            .uri(&format!("{}/{}/complete", base, chore_id))
            .insert_header(bearer(&user))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["data"]["due_at"]["at"], "2030-01-08T09:00:00Z");

        let req = test::TestRequest::post()
            .uri(&format!("{}/{}/undo", base, chore_id))
            .insert_header(bearer(&user))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["data"]["due_at"]["at"], "2030-01-01T09:00:00Z");

        // nothing left to undo
        let req = test::TestRequest::post()
            .uri(&format!("{}/{}/undo", base, chore_id))
            .insert_header(bearer(&user))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_invalid_interval_rejected() {
        let state = test_state().await;
        let user = create_test_user(&state.db, "nina").await;
        let household = household_service::create_household(
            &state.db,
            &user.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        let service = test::init_service(app(state)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/households/{}/chores", household.id))
            .insert_header(bearer(&user))
            .set_json(json!({"name": "Nothing", "interval": {"type": "daily", "value": 0}}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
