//! Menu models: named lists of recipes with a sale price each.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Menu {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MenuEntry {
    #[serde(skip_serializing)]
    pub position: i64,
    pub recipe_id: String,
    pub recipe_name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuResponse {
    pub id: String,
    pub name: String,
    pub recipes: Vec<MenuEntry>,
    pub recipe_count: usize,
    /// Sum of entry prices
    pub revenue: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl MenuResponse {
    pub fn new(menu: Menu, recipes: Vec<MenuEntry>) -> Self {
        Self {
            id: menu.id,
            name: menu.name,
            recipe_count: recipes.len(),
            revenue: recipes.iter().map(|e| e.price).sum(),
            recipes,
            created_at: menu.created_at,
            updated_at: menu.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuEntryInput {
    pub recipe_id: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub recipes: Vec<MenuEntryInput>,
}

impl Menu {
    pub async fn list_for_user(db: &SqlitePool, user_id: &str) -> Result<Vec<Menu>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM menus WHERE created_by = ? ORDER BY name COLLATE NOCASE ASC")
            .bind(user_id)
            .fetch_all(db)
            .await
    }

    pub async fn find_for_user(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Menu>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM menus WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    pub async fn entries(db: &SqlitePool, menu_id: &str) -> Result<Vec<MenuEntry>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT mr.position, mr.recipe_id, r.name AS recipe_name, mr.price
            FROM menu_recipes mr
            JOIN recipes r ON r.id = mr.recipe_id
            WHERE mr.menu_id = ?
            ORDER BY mr.position ASC
            "#,
        )
        .bind(menu_id)
        .fetch_all(db)
        .await
    }

    pub async fn details(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<MenuResponse>, sqlx::Error> {
        let Some(menu) = Self::find_for_user(db, id, user_id).await? else {
            return Ok(None);
        };
        let entries = Self::entries(db, &menu.id).await?;
        Ok(Some(MenuResponse::new(menu, entries)))
    }

    pub async fn list_details(db: &SqlitePool, user_id: &str) -> Result<Vec<MenuResponse>, sqlx::Error> {
        let menus = Self::list_for_user(db, user_id).await?;
        let mut details = Vec::with_capacity(menus.len());
        for menu in menus {
            let entries = Self::entries(db, &menu.id).await?;
            details.push(MenuResponse::new(menu, entries));
        }
        Ok(details)
    }

    async fn insert_entries(
        conn: &mut SqliteConnection,
        menu_id: &str,
        first_position: i64,
        entries: &[MenuEntryInput],
    ) -> Result<(), sqlx::Error> {
        for (offset, entry) in entries.iter().enumerate() {
            sqlx::query("INSERT INTO menu_recipes (menu_id, position, recipe_id, price) VALUES (?, ?, ?, ?)")
                .bind(menu_id)
                .bind(first_position + offset as i64)
                .bind(&entry.recipe_id)
                .bind(entry.price)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    pub async fn create(db: &SqlitePool, user_id: &str, input: &MenuInput) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = super::now();
        let mut tx = db.begin().await?;

        sqlx::query("INSERT INTO menus (id, name, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(input.name.trim())
            .bind(user_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        Self::insert_entries(&mut tx, &id, 0, &input.recipes).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Replace name and entries; returns false when the menu is not the user's
    pub async fn update(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
        input: &MenuInput,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = db.begin().await?;

        let result = sqlx::query("UPDATE menus SET name = ?, updated_at = ? WHERE id = ? AND created_by = ?")
            .bind(input.name.trim())
            .bind(super::now())
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM menu_recipes WHERE menu_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::insert_entries(&mut tx, id, 0, &input.recipes).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Add a recipe at the end of an existing menu
    pub async fn append_recipe(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
        entry: &MenuEntryInput,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = db.begin().await?;

        let result = sqlx::query("UPDATE menus SET updated_at = ? WHERE id = ? AND created_by = ?")
            .bind(super::now())
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM menu_recipes WHERE menu_id = ?",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        Self::insert_entries(&mut tx, id, next, std::slice::from_ref(entry)).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete(db: &SqlitePool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM menus WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, CreateIngredientRequest, Ingredient, Recipe, RecipeIngredientInput, RecipeInput, User};
    use crate::engine::units::Amount;

    async fn setup() -> (SqlitePool, User, String, String) {
        let db = init_memory().await.unwrap();
        let user = User::create(&db, "Owner", "owner@example.com", "hash")
            .await
            .unwrap();
        let req = CreateIngredientRequest {
            name: "Rum".to_string(),
            alcohol_type: None,
            proof: None,
            sources: None,
        };
        let ingredient = Ingredient::create_custom(&db, &user.id, &req).await.unwrap();
        let mut recipe_ids = Vec::new();
        for name in ["Daiquiri", "Mojito"] {
            let input = RecipeInput {
                name: name.to_string(),
                ingredients: vec![RecipeIngredientInput {
                    ingredient_id: ingredient.clone(),
                    amount: Amount::oz(2.0),
                }],
            };
            recipe_ids.push(Recipe::create(&db, &user.id, &input).await.unwrap());
        }
        let mojito = recipe_ids.pop().unwrap();
        let daiquiri = recipe_ids.pop().unwrap();
        (db, user, daiquiri, mojito)
    }

    fn entry(recipe_id: &str, price: f64) -> MenuEntryInput {
        MenuEntryInput {
            recipe_id: recipe_id.to_string(),
            price,
        }
    }

    #[tokio::test]
    async fn test_menu_revenue_and_count() {
        let (db, user, daiquiri, mojito) = setup().await;
        let input = MenuInput {
            name: "Summer".to_string(),
            recipes: vec![entry(&daiquiri, 11.0), entry(&mojito, 12.5)],
        };
        let id = Menu::create(&db, &user.id, &input).await.unwrap();

        let menu = Menu::details(&db, &id, &user.id).await.unwrap().unwrap();
        assert_eq!(menu.recipe_count, 2);
        assert!((menu.revenue - 23.5).abs() < 1e-9);
        assert_eq!(menu.recipes[0].recipe_name, "Daiquiri");
        assert_eq!(menu.recipes[1].recipe_name, "Mojito");
    }

    #[tokio::test]
    async fn test_append_and_latest_price() {
        let (db, user, daiquiri, mojito) = setup().await;
        let first = Menu::create(
            &db,
            &user.id,
            &MenuInput {
                name: "Lunch".to_string(),
                recipes: vec![entry(&daiquiri, 9.0)],
            },
        )
        .await
        .unwrap();
        let second = Menu::create(
            &db,
            &user.id,
            &MenuInput {
                name: "Dinner".to_string(),
                recipes: vec![entry(&mojito, 13.0)],
            },
        )
        .await
        .unwrap();

        assert!(Menu::append_recipe(&db, &second, &user.id, &entry(&daiquiri, 14.0))
            .await
            .unwrap());
        let dinner = Menu::details(&db, &second, &user.id).await.unwrap().unwrap();
        assert_eq!(dinner.recipes.len(), 2);
        assert_eq!(dinner.recipes[1].recipe_id, daiquiri);
        let lunch = Menu::details(&db, &first, &user.id).await.unwrap().unwrap();
        assert_eq!(lunch.recipes.len(), 1);

        // Dinner was touched last, so its price wins
        let price = Recipe::latest_menu_price(&db, &daiquiri, &user.id).await.unwrap();
        assert_eq!(price, Some(14.0));
    }

    #[tokio::test]
    async fn test_recipe_delete_removes_entries() {
        let (db, user, daiquiri, mojito) = setup().await;
        let id = Menu::create(
            &db,
            &user.id,
            &MenuInput {
                name: "Bar".to_string(),
                recipes: vec![entry(&daiquiri, 9.0), entry(&mojito, 10.0)],
            },
        )
        .await
        .unwrap();

        Recipe::delete(&db, &daiquiri, &user.id).await.unwrap();
        let menu = Menu::details(&db, &id, &user.id).await.unwrap().unwrap();
        assert_eq!(menu.recipe_count, 1);
        assert_eq!(menu.recipes[0].recipe_id, mojito);
    }

    #[tokio::test]
    async fn test_update_and_delete_scoped_to_owner() {
        let (db, user, daiquiri, _) = setup().await;
        let other = User::create(&db, "Other", "other@example.com", "hash").await.unwrap();
        let id = Menu::create(
            &db,
            &user.id,
            &MenuInput {
                name: "Bar".to_string(),
                recipes: vec![entry(&daiquiri, 9.0)],
            },
        )
        .await
        .unwrap();

        let input = MenuInput {
            name: "Renamed".to_string(),
            recipes: Vec::new(),
        };
        assert!(!Menu::update(&db, &id, &other.id, &input).await.unwrap());
        assert!(!Menu::delete(&db, &id, &other.id).await.unwrap());
        assert!(!Menu::append_recipe(&db, &id, &other.id, &entry(&daiquiri, 1.0)).await.unwrap());

        assert!(Menu::update(&db, &id, &user.id, &input).await.unwrap());
        let menu = Menu::details(&db, &id, &user.id).await.unwrap().unwrap();
        assert_eq!(menu.name, "Renamed");
        assert_eq!(menu.recipe_count, 0);
        assert!(Menu::delete(&db, &id, &user.id).await.unwrap());
    }
}
