//! Recipe models: a named, ordered list of ingredient amounts owned by a user.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::ingredient::Ingredient;
use crate::engine::cost_calculator::{Brand, Slot};
use crate::engine::units::{Amount, Unit};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One stored ingredient line joined with the ingredient's name
#[derive(Debug, Clone, FromRow)]
pub struct RecipeLine {
    pub position: i64,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub unit: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeLineResponse {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub amount: Amount,
}

impl From<RecipeLine> for RecipeLineResponse {
    fn from(line: RecipeLine) -> Self {
        Self {
            ingredient_id: line.ingredient_id,
            ingredient_name: line.ingredient_name,
            // Only known units are ever written
            amount: Amount::new(Unit::from_str(&line.unit).unwrap_or(Unit::Oz), line.quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeResponse {
    pub id: String,
    pub name: String,
    pub ingredients: Vec<RecipeLineResponse>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeIngredientInput {
    pub ingredient_id: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredientInput>,
}

/// Menu to place a new recipe on. Without `menu_id` a new menu named
/// `name` is created.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuPlacement {
    #[serde(default)]
    pub menu_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecipeRequest {
    #[serde(flatten)]
    pub recipe: RecipeInput,
    #[serde(default)]
    pub menus: Vec<MenuPlacement>,
}

impl Recipe {
    pub async fn list_for_user(db: &SqlitePool, user_id: &str) -> Result<Vec<Recipe>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM recipes WHERE created_by = ? ORDER BY name COLLATE NOCASE ASC")
            .bind(user_id)
            .fetch_all(db)
            .await
    }

    pub async fn find_for_user(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Recipe>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM recipes WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    pub async fn lines(db: &SqlitePool, recipe_id: &str) -> Result<Vec<RecipeLine>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT ri.position, ri.ingredient_id, i.name AS ingredient_name, ri.unit, ri.quantity
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ?
            ORDER BY ri.position ASC
            "#,
        )
        .bind(recipe_id)
        .fetch_all(db)
        .await
    }

    pub async fn details(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<RecipeResponse>, sqlx::Error> {
        let Some(recipe) = Self::find_for_user(db, id, user_id).await? else {
            return Ok(None);
        };
        let lines = Self::lines(db, &recipe.id).await?;
        Ok(Some(RecipeResponse {
            id: recipe.id,
            name: recipe.name,
            ingredients: lines.into_iter().map(RecipeLineResponse::from).collect(),
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
        }))
    }

    pub async fn list_details(db: &SqlitePool, user_id: &str) -> Result<Vec<RecipeResponse>, sqlx::Error> {
        let recipes = Self::list_for_user(db, user_id).await?;
        let mut details = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            let lines = Self::lines(db, &recipe.id).await?;
            details.push(RecipeResponse {
                id: recipe.id,
                name: recipe.name,
                ingredients: lines.into_iter().map(RecipeLineResponse::from).collect(),
                created_at: recipe.created_at,
                updated_at: recipe.updated_at,
            });
        }
        Ok(details)
    }

    async fn insert_lines(
        conn: &mut SqliteConnection,
        recipe_id: &str,
        lines: &[RecipeIngredientInput],
    ) -> Result<(), sqlx::Error> {
        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO recipe_ingredients (recipe_id, position, ingredient_id, unit, quantity)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(recipe_id)
            .bind(position as i64)
            .bind(&line.ingredient_id)
            .bind(line.amount.unit.as_str())
            .bind(line.amount.quantity)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn create(db: &SqlitePool, user_id: &str, input: &RecipeInput) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = super::now();
        let mut tx = db.begin().await?;

        sqlx::query(
            "INSERT INTO recipes (id, name, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        Self::insert_lines(&mut tx, &id, &input.ingredients).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Replace name and lines; returns false when the recipe is not the user's
    pub async fn update(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
        input: &RecipeInput,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = db.begin().await?;

        let result = sqlx::query("UPDATE recipes SET name = ?, updated_at = ? WHERE id = ? AND created_by = ?")
            .bind(input.name.trim())
            .bind(super::now())
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::insert_lines(&mut tx, id, &input.ingredients).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Menu entries for the recipe go with it
    pub async fn delete(db: &SqlitePool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Price of the recipe on the user's most recently updated menu
    pub async fn latest_menu_price(
        db: &SqlitePool,
        recipe_id: &str,
        user_id: &str,
    ) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT mr.price FROM menu_recipes mr
            JOIN menus m ON m.id = mr.menu_id
            WHERE mr.recipe_id = ? AND m.created_by = ?
            ORDER BY m.updated_at DESC, m.rowid DESC, mr.position ASC
            LIMIT 1
            "#,
        )
        .bind(recipe_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }
}

/// Calculator inputs for a stored recipe: one slot per line, whose
/// candidate brands are the sources of that line's ingredient.
pub async fn cost_inputs(
    db: &SqlitePool,
    recipe: &RecipeResponse,
    user_id: &str,
) -> Result<(Vec<Slot>, Vec<Brand>), sqlx::Error> {
    let mut slots = Vec::with_capacity(recipe.ingredients.len());
    let mut catalog: Vec<Brand> = Vec::new();

    for line in &recipe.ingredients {
        let brands = match Ingredient::details(db, &line.ingredient_id, user_id).await? {
            Some(ingredient) => ingredient.to_brands(),
            None => Vec::new(),
        };
        slots.push(Slot {
            label: line.ingredient_name.clone(),
            amount: line.amount,
            brands: brands.iter().map(|b| b.id.clone()).collect(),
        });
        for brand in brands {
            if !catalog.iter().any(|b| b.id == brand.id) {
                catalog.push(brand);
            }
        }
    }

    Ok((slots, catalog))
}
