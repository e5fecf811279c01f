use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RoomRow, RowError};
use shared::Room;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,
    #[error("Room name must not be empty")]
    EmptyName,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Corrupt room record: {0}")]
    Row(#[from] RowError),
}

pub async fn create_room(pool: &SqlitePool, household_id: &Uuid, name: &str) -> Result<Room, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::EmptyName);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query("INSERT INTO rooms (id, household_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(household_id.to_string())
        .bind(name)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(Room {
        id,
        household_id: *household_id,
        name: name.to_string(),
        created_at: now,
    })
}

pub async fn list_rooms(pool: &SqlitePool, household_id: &Uuid) -> Result<Vec<Room>, RoomError> {
    let rooms: Vec<RoomRow> = sqlx::query_as("SELECT * FROM rooms WHERE household_id = ? ORDER BY name ASC")
        .bind(household_id.to_string())
        .fetch_all(pool)
        .await?;

    Ok(rooms.iter().map(RoomRow::to_shared).collect::<Result<_, _>>()?)
}

/// Look up a room, scoped to its household
pub async fn get_room(pool: &SqlitePool, household_id: &Uuid, room_id: &Uuid) -> Result<Option<Room>, RoomError> {
    let room: Option<RoomRow> = sqlx::query_as("SELECT * FROM rooms WHERE id = ? AND household_id = ?")
        .bind(room_id.to_string())
        .bind(household_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(room.map(|r| r.to_shared()).transpose()?)
}

pub async fn rename_room(
    pool: &SqlitePool,
    household_id: &Uuid,
    room_id: &Uuid,
    name: &str,
) -> Result<Room, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::EmptyName);
    }

    let mut room = get_room(pool, household_id, room_id).await?.ok_or(RoomError::NotFound)?;

    sqlx::query("UPDATE rooms SET name = ? WHERE id = ?")
        .bind(name)
        .bind(room_id.to_string())
        .execute(pool)
        .await?;

    room.name = name.to_string();
    Ok(room)
}

/// Delete a room; its chores stay in the household without a room
pub async fn delete_room(pool: &SqlitePool, household_id: &Uuid, room_id: &Uuid) -> Result<(), RoomError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE chores SET room_id = NULL, version = version + 1, updated_at = ? WHERE room_id = ? AND household_id = ?",
    )
    .bind(Utc::now())
    .bind(room_id.to_string())
    .bind(household_id.to_string())
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM rooms WHERE id = ? AND household_id = ?")
        .bind(room_id.to_string())
        .bind(household_id.to_string())
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RoomError::NotFound);
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::auth::create_test_user;
    use crate::services::{chores as chore_service, households as household_service};
    use shared::{CreateChoreRequest, CreateHouseholdRequest, Interval, IntervalType};

    async fn setup() -> (SqlitePool, Uuid) {
        let pool = db::test_pool().await;
        let admin = create_test_user(&pool, "admin").await;
        let household = household_service::create_household(
            &pool,
            &admin.id,
            &CreateHouseholdRequest { name: "Home".to_string() },
        )
        .await
        .unwrap();
        (pool, household.id)
    }

    #[tokio::test]
    async fn test_room_crud() {
        let (pool, household_id) = setup().await;

        let kitchen = create_room(&pool, &household_id, " Kitchen ").await.unwrap();
        assert_eq!(kitchen.name, "Kitchen");
        create_room(&pool, &household_id, "Bathroom").await.unwrap();

        let names: Vec<String> = list_rooms(&pool, &household_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Bathroom".to_string(), "Kitchen".to_string()]);

        let renamed = rename_room(&pool, &household_id, &kitchen.id, "Galley").await.unwrap();
        assert_eq!(renamed.name, "Galley");

        delete_room(&pool, &household_id, &kitchen.id).await.unwrap();
        assert!(get_room(&pool, &household_id, &kitchen.id).await.unwrap().is_none());
        assert!(matches!(
            delete_room(&pool, &household_id, &kitchen.id).await,
            Err(RoomError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_room_detaches_chores() {
        let (pool, household_id) = setup().await;
        let admin = create_test_user(&pool, "cook").await;
        let room = create_room(&pool, &household_id, "Kitchen").await.unwrap();
        let chore = chore_service::create_chore(
            &pool,
            &household_id,
            &admin.id,
            &CreateChoreRequest {
                name: "Descale kettle".to_string(),
                description: None,
                interval: Interval::new(IntervalType::Monthly, 1),
                due_at: None,
                assigned_to: None,
                room_id: Some(room.id),
            },
        )
        .await
        .unwrap();

        delete_room(&pool, &household_id, &room.id).await.unwrap();

        let stored = chore_service::get_chore(&pool, &household_id, &chore.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.room_id, None);
        assert_eq!(stored.version, chore.version + 1);
    }

    #[tokio::test]
    async fn test_room_requires_name() {
        let (pool, household_id) = setup().await;
        assert!(matches!(
            create_room(&pool, &household_id, "   ").await,
            Err(RoomError::EmptyName)
        ));
    }

    #[tokio::test]
    async fn test_room_scoped_to_household() {
        let (pool, household_id) = setup().await;
        let room = create_room(&pool, &household_id, "Attic").await.unwrap();

        assert!(get_room(&pool, &Uuid::new_v4(), &room.id).await.unwrap().is_none());
    }
}
