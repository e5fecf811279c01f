use actix_web::{web, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, RoomRequest};
use uuid::Uuid;

use crate::handlers::{authenticate, internal_error, parse_id, require_member};
use crate::models::AppState;
use crate::services::rooms::{self as room_service, RoomError};

/// Routes mounted under `/households/{household_id}`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/rooms", web::get().to(list_rooms))
        .route("/rooms", web::post().to(create_room))
        .route("/rooms/{room_id}", web::put().to(rename_room))
        .route("/rooms/{room_id}", web::delete().to(delete_room));
}

fn room_error(context: &str, e: RoomError) -> HttpResponse {
    match e {
        RoomError::NotFound => HttpResponse::NotFound().json(ApiError::new("not_found", "Room not found")),
        RoomError::EmptyName => HttpResponse::BadRequest().json(ApiError::new("validation_error", e.to_string())),
        e => internal_error(context, e),
    }
}

/// Caller must be allowed to manage rooms of the household
async fn require_room_manager(state: &AppState, household_id: &Uuid, user_id: &Uuid) -> Result<(), HttpResponse> {
    let role = require_member(state, household_id, user_id).await?;
    if !role.can_manage_rooms() {
        return Err(HttpResponse::Forbidden().json(ApiError::new(
            "forbidden",
            "Only admins can manage rooms",
        )));
    }
    Ok(())
}

async fn list_rooms(
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

    match room_service::list_rooms(&state.db, &household_id).await {
        Ok(rooms) => Ok(HttpResponse::Ok().json(ApiSuccess::new(rooms))),
        Err(e) => Ok(room_error("Failed to list rooms", e)),
    }
}

async fn create_room(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<String>,
    body: web::Json<RoomRequest>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let household_id = match parse_id(&path.into_inner(), "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_room_manager(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match room_service::create_room(&state.db, &household_id, &body.name).await {
        Ok(room) => Ok(HttpResponse::Created().json(ApiSuccess::new(room))),
        Err(e) => Ok(room_error("Failed to create room", e)),
    }
}

async fn rename_room(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<RoomRequest>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let (household_id, room_id) = path.into_inner();
    let household_id = match parse_id(&household_id, "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let room_id = match parse_id(&room_id, "room") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_room_manager(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match room_service::rename_room(&state.db, &household_id, &room_id, &body.name).await {
        Ok(room) => Ok(HttpResponse::Ok().json(ApiSuccess::new(room))),
        Err(e) => Ok(room_error("Failed to rename room", e)),
    }
}

async fn delete_room(
    state: web::Data<AppState>,
    req: actix_web::HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let user_id = match authenticate(&req, &state) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let (household_id, room_id) = path.into_inner();
    let household_id = match parse_id(&household_id, "household") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let room_id = match parse_id(&room_id, "room") {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    if let Err(response) = require_room_manager(&state, &household_id, &user_id).await {
        return Ok(response);
    }

    match room_service::delete_room(&state.db, &household_id, &room_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(room_error("Failed to delete room", e)),
    }
}
