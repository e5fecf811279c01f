use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RowError, UserRow};
use shared::{CreateUserRequest, LoginRequest, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Corrupt user record: {0}")]
    Row(#[from] RowError),
    #[error("Password hashing error")]
    HashingError,
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

pub async fn register_user(pool: &SqlitePool, request: &CreateUserRequest) -> Result<User, AuthError> {
    let email = request.email.trim().to_lowercase();

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE username = ? OR email = ?"
    )
    .bind(&request.username)
    .bind(&email)
    .fetch_one(pool)
    .await?;

    if existing > 0 {
        return Err(AuthError::UserAlreadyExists);
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(request.password.as_bytes(), &salt)
        .map_err(|_| AuthError::HashingError)?
        .to_string();

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(id.to_string())
    .bind(&request.username)
    .bind(&email)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    log::info!("Registered user {}", id);

    Ok(User {
        id,
        username: request.username.clone(),
        email,
        created_at: now,
        updated_at: now,
    })
}

pub async fn login_user(pool: &SqlitePool, request: &LoginRequest) -> Result<User, AuthError> {
    let user: UserRow = sqlx::query_as(
        "SELECT * FROM users WHERE username = ?"
    )
    .bind(&request.username)
    .fetch_optional(pool)
    .await?
    .ok_or(AuthError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(request.password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    Ok(user.to_shared()?)
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: &Uuid) -> Result<Option<User>, AuthError> {
    let user: Option<UserRow> = sqlx::query_as(
        "SELECT * FROM users WHERE id = ?"
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(user.map(|u| u.to_shared()).transpose()?)
}

pub fn create_jwt(user_id: &Uuid, secret: &str, expiration_hours: i64) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
pub(crate) async fn create_test_user(pool: &SqlitePool, name: &str) -> User {
    register_user(
        pool,
        &CreateUserRequest {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "correct horse battery".to_string(),
        },
    )
    .await
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_create_and_verify_jwt() {
        let user_id = Uuid::new_v4();
        let secret = "test-secret";

        let token = create_jwt(&user_id, secret, 24).unwrap();
        let verified_id = verify_jwt(&token, secret).unwrap();

        assert_eq!(user_id, verified_id);
    }

    #[test]
    fn test_verify_jwt_invalid_secret() {
        let user_id = Uuid::new_v4();
        let token = create_jwt(&user_id, "secret1", 24).unwrap();

        let result = verify_jwt(&token, "secret2");
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_jwt_expired() {
        let token = create_jwt(&Uuid::new_v4(), "secret", -2).unwrap();
        assert!(verify_jwt(&token, "secret").is_err());
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let pool = db::test_pool().await;
        let user = create_test_user(&pool, "alice").await;
        assert_eq!(user.email, "alice@example.com");

        let logged_in = login_user(
            &pool,
            &LoginRequest {
                username: "alice".to_string(),
                password: "correct horse battery".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.id, user.id);

        let wrong = login_user(
            &pool,
            &LoginRequest {
                username: "alice".to_string(),
                password: "wrong password".to_string(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let pool = db::test_pool().await;
        create_test_user(&pool, "alice").await;

        let duplicate = register_user(
            &pool,
            &CreateUserRequest {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                password: "another password".to_string(),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let pool = db::test_pool().await;
        let user = create_test_user(&pool, "bob").await;

        let found = get_user_by_id(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(found.username, "bob");
        assert!(get_user_by_id(&pool, &Uuid::new_v4()).await.unwrap().is_none());
    }
}
