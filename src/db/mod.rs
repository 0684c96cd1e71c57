mod models;

pub use models::*;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("barometer.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;

    prepare(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Open a private in-memory database with the full schema applied
pub async fn init_memory() -> Result<DbPool> {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    prepare(&pool).await?;
    Ok(pool)
}

async fn prepare(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;
    run_migrations(pool).await
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users and ingredient catalog
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Recipes
    if !table_exists(pool, "recipe_ingredients").await? {
        execute_sql(pool, include_str!("../../migrations/002_recipes.sql")).await?;
    }

    // Migration 003: Menus
    if !table_exists(pool, "menu_recipes").await? {
        execute_sql(pool, include_str!("../../migrations/003_menus.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_schema() {
        let pool = init_memory().await.unwrap();
        for table in [
            "users",
            "ingredients",
            "ingredient_sources",
            "ingredient_sizes",
            "recipes",
            "recipe_ingredients",
            "menus",
            "menu_recipes",
        ] {
            assert!(table_exists(&pool, table).await.unwrap(), "missing {}", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_init_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init(dir.path()).await.unwrap();
        assert!(table_exists(&pool, "menus").await.unwrap());
        assert!(dir.path().join("barometer.db").exists());
    }
}
