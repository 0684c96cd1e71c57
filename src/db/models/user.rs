//! User models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl User {
    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Emails are stored lowercased; lookups are case-insensitive
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(db)
            .await
    }

    pub async fn create(
        db: &SqlitePool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = super::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name.trim())
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = crate::db::init_memory().await.unwrap();
        let user = User::create(&db, " Dana ", "Dana@Example.com", "hash")
            .await
            .unwrap();
        assert_eq!(user.name, "Dana");
        assert_eq!(user.email, "dana@example.com");

        let found = User::find_by_email(&db, "DANA@example.COM").await.unwrap();
        assert_eq!(found.unwrap().id, user.id);
        assert!(User::find_by_id(&db, &user.id).await.unwrap().is_some());
        assert!(User::find_by_id(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = crate::db::init_memory().await.unwrap();
        User::create(&db, "A", "a@example.com", "hash").await.unwrap();
        let err = User::create(&db, "B", "A@example.com", "hash").await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "1".to_string(),
            name: "n".to_string(),
            email: "e@x.io".to_string(),
            password_hash: "secret".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
