//! Ingredient catalog models: ingredients, their sources and package sizes.
//!
//! Scraped ingredients are global (`created_by IS NULL`) and visible to every
//! user. Custom ingredients belong to the user who created them.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::HashMap;

use crate::engine::cost_calculator::{Brand, PackageSize};
use crate::engine::units::{format_ml, parse_size_ml, unit_price_per_oz, Amount, Unit};

/// Source name given to user-entered ingredients
pub const CUSTOM_SOURCE: &str = "CUSTOM";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub name_key: String,
    pub alcohol_type: Option<String>,
    pub proof: Option<f64>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IngredientSource {
    pub id: String,
    pub ingredient_id: String,
    pub name: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IngredientSize {
    pub id: String,
    #[serde(skip_serializing)]
    pub source_id: String,
    /// Printed size, e.g. "1.75L"
    pub label: String,
    pub unit: String,
    /// Quantity in `unit` (always ml for stored sizes)
    pub quantity: f64,
    /// Sale price of one package
    pub price: f64,
    pub regular_price: f64,
    pub discount: f64,
    /// Price per fluid ounce
    pub unit_price: f64,
    #[serde(skip_serializing)]
    pub position: i64,
}

impl IngredientSize {
    /// Size string handed to the cost calculator. The printed label is kept
    /// only when it describes the stored quantity, so the calculator prices
    /// the package exactly as `unit_price` does.
    pub fn calculator_size(&self) -> String {
        match parse_size_ml(&self.label) {
            Some(ml) if (ml - self.quantity).abs() < 1e-6 => self.label.clone(),
            _ => format_ml(self.quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceResponse {
    pub id: String,
    pub name: String,
    pub sizes: Vec<IngredientSize>,
}

/// Ingredient with its sources and sizes
#[derive(Debug, Clone, Serialize)]
pub struct IngredientResponse {
    pub id: String,
    pub name: String,
    pub alcohol_type: Option<String>,
    pub proof: Option<f64>,
    pub created_by: Option<String>,
    pub is_custom: bool,
    pub sources: Vec<SourceResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl IngredientResponse {
    pub fn new(ingredient: Ingredient, sources: Vec<SourceResponse>) -> Self {
        Self {
            is_custom: ingredient.created_by.is_some(),
            id: ingredient.id,
            name: ingredient.name,
            alcohol_type: ingredient.alcohol_type,
            proof: ingredient.proof,
            created_by: ingredient.created_by,
            sources,
            created_at: ingredient.created_at,
            updated_at: ingredient.updated_at,
        }
    }

    /// Size with the lowest price per ounce across all sources
    pub fn best_value(&self) -> Option<&IngredientSize> {
        self.sources
            .iter()
            .flat_map(|s| s.sizes.iter())
            .filter(|s| s.unit_price > 0.0)
            .min_by(|a, b| a.unit_price.total_cmp(&b.unit_price))
    }

    /// Each source is a brand the cost calculator can choose from
    pub fn to_brands(&self) -> Vec<Brand> {
        self.sources
            .iter()
            .map(|source| Brand {
                id: source.id.clone(),
                name: if source.name == CUSTOM_SOURCE {
                    self.name.clone()
                } else {
                    format!("{} ({})", self.name, source.name)
                },
                sizes: source
                    .sizes
                    .iter()
                    .map(|size| PackageSize {
                        size: size.calculator_size(),
                        sale_price: size.price,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizeInput {
    /// Printed size; derived from the quantity when omitted
    #[serde(default)]
    pub label: Option<String>,
    pub unit: Unit,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub regular_price: Option<f64>,
    #[serde(default)]
    pub discount: Option<f64>,
}

impl SizeInput {
    pub fn quantity_ml(&self) -> f64 {
        Amount::new(self.unit, self.quantity).to_ml()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceInput {
    pub name: String,
    #[serde(default)]
    pub sizes: Vec<SizeInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIngredientRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alcohol_type: Option<String>,
    #[serde(default)]
    pub proof: Option<f64>,
    #[serde(default)]
    pub sources: Option<Vec<SourceInput>>,
}

/// Partial update. A missing `alcohol_type` or `proof` keeps the stored
/// value; an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIngredientRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub alcohol_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub proof: Option<Option<f64>>,
    #[serde(default)]
    pub sources: Option<Vec<SourceInput>>,
}

/// Marks a field as present, keeping a `null` value as `Some(None)`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Collapse runs of whitespace and trim
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape LIKE wildcards so search text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Key used to match scraped rows to existing ingredients
pub fn name_key(name: &str) -> String {
    normalize_name(name).to_lowercase()
}

impl Ingredient {
    /// Global ingredients plus the user's own, optionally filtered by name
    pub async fn list_visible(
        db: &SqlitePool,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Ingredient>, sqlx::Error> {
        let pattern = search
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

        sqlx::query_as(
            r#"
            SELECT * FROM ingredients
            WHERE (created_by IS NULL OR created_by = ?)
              AND (? IS NULL
                   OR name_key LIKE ? ESCAPE '\'
                   OR LOWER(COALESCE(alcohol_type, '')) LIKE ? ESCAPE '\')
            ORDER BY name_key ASC
            "#,
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(db)
        .await
    }

    pub async fn find_visible(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Ingredient>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM ingredients WHERE id = ? AND (created_by IS NULL OR created_by = ?)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    /// Sources with sizes for a single ingredient
    pub async fn sources(db: &SqlitePool, ingredient_id: &str) -> Result<Vec<SourceResponse>, sqlx::Error> {
        let sources: Vec<IngredientSource> = sqlx::query_as(
            "SELECT * FROM ingredient_sources WHERE ingredient_id = ? ORDER BY position ASC",
        )
        .bind(ingredient_id)
        .fetch_all(db)
        .await?;

        let sizes: Vec<IngredientSize> = sqlx::query_as(
            r#"
            SELECT z.* FROM ingredient_sizes z
            JOIN ingredient_sources s ON s.id = z.source_id
            WHERE s.ingredient_id = ?
            ORDER BY z.position ASC
            "#,
        )
        .bind(ingredient_id)
        .fetch_all(db)
        .await?;

        Ok(group_sources(sources, sizes)
            .remove(ingredient_id)
            .unwrap_or_default())
    }

    /// Sources with sizes for every ingredient visible to the user, keyed by ingredient id
    pub async fn visible_sources(
        db: &SqlitePool,
        user_id: &str,
    ) -> Result<HashMap<String, Vec<SourceResponse>>, sqlx::Error> {
        let sources: Vec<IngredientSource> = sqlx::query_as(
            r#"
            SELECT s.* FROM ingredient_sources s
            JOIN ingredients i ON i.id = s.ingredient_id
            WHERE i.created_by IS NULL OR i.created_by = ?
            ORDER BY s.position ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let sizes: Vec<IngredientSize> = sqlx::query_as(
            r#"
            SELECT z.* FROM ingredient_sizes z
            JOIN ingredient_sources s ON s.id = z.source_id
            JOIN ingredients i ON i.id = s.ingredient_id
            WHERE i.created_by IS NULL OR i.created_by = ?
            ORDER BY z.position ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        Ok(group_sources(sources, sizes))
    }

    /// Ingredient with its sources, if visible to the user
    pub async fn details(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<IngredientResponse>, sqlx::Error> {
        let Some(ingredient) = Self::find_visible(db, id, user_id).await? else {
            return Ok(None);
        };
        let sources = Self::sources(db, &ingredient.id).await?;
        Ok(Some(IngredientResponse::new(ingredient, sources)))
    }

    /// Every visible ingredient with its sources
    pub async fn list_details(
        db: &SqlitePool,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<IngredientResponse>, sqlx::Error> {
        let ingredients = Self::list_visible(db, user_id, search).await?;
        let mut sources = Self::visible_sources(db, user_id).await?;
        Ok(ingredients
            .into_iter()
            .map(|i| {
                let s = sources.remove(&i.id).unwrap_or_default();
                IngredientResponse::new(i, s)
            })
            .collect())
    }

    /// Insert an ingredient row and return its id
    pub async fn insert(
        conn: &mut SqliteConnection,
        name: &str,
        alcohol_type: Option<&str>,
        proof: Option<f64>,
        created_by: Option<&str>,
    ) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = super::now();
        let name = normalize_name(name);

        sqlx::query(
            r#"
            INSERT INTO ingredients (id, name, name_key, alcohol_type, proof, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(name_key(&name))
        .bind(alcohol_type)
        .bind(proof)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Append a source with its sizes after any existing sources
    pub async fn add_source(
        conn: &mut SqliteConnection,
        ingredient_id: &str,
        source: &SourceInput,
    ) -> Result<String, sqlx::Error> {
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM ingredient_sources WHERE ingredient_id = ?",
        )
        .bind(ingredient_id)
        .fetch_one(&mut *conn)
        .await?;

        let source_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO ingredient_sources (id, ingredient_id, name, position) VALUES (?, ?, ?, ?)",
        )
        .bind(&source_id)
        .bind(ingredient_id)
        .bind(source.name.trim())
        .bind(position)
        .execute(&mut *conn)
        .await?;

        Self::insert_sizes(conn, &source_id, &source.sizes).await?;
        Ok(source_id)
    }

    /// Replace the sizes of a source
    pub async fn replace_sizes(
        conn: &mut SqliteConnection,
        source_id: &str,
        sizes: &[SizeInput],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM ingredient_sizes WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *conn)
            .await?;
        Self::insert_sizes(conn, source_id, sizes).await
    }

    async fn insert_sizes(
        conn: &mut SqliteConnection,
        source_id: &str,
        sizes: &[SizeInput],
    ) -> Result<(), sqlx::Error> {
        for (position, size) in sizes.iter().enumerate() {
            let quantity_ml = size.quantity_ml();
            let label = size
                .label
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| format_ml(quantity_ml));

            sqlx::query(
                r#"
                INSERT INTO ingredient_sizes
                    (id, source_id, label, unit, quantity, price, regular_price, discount, unit_price, position)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(source_id)
            .bind(label.trim())
            .bind(Unit::Ml.as_str())
            .bind(quantity_ml)
            .bind(size.price)
            .bind(size.regular_price.unwrap_or(size.price))
            .bind(size.discount.unwrap_or(0.0))
            .bind(unit_price_per_oz(size.price, quantity_ml))
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Create a user-owned ingredient. Without explicit sources it gets an
    /// empty `CUSTOM` source.
    pub async fn create_custom(
        db: &SqlitePool,
        user_id: &str,
        req: &CreateIngredientRequest,
    ) -> Result<String, sqlx::Error> {
        let mut tx = db.begin().await?;

        let id = Self::insert(
            &mut tx,
            &req.name,
            req.alcohol_type.as_deref(),
            req.proof,
            Some(user_id),
        )
        .await?;

        let default_sources = [SourceInput {
            name: CUSTOM_SOURCE.to_string(),
            sizes: Vec::new(),
        }];
        let sources = req
            .sources
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&default_sources);
        for source in sources {
            Self::add_source(&mut tx, &id, source).await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Update a user-owned ingredient; returns false when it does not exist
    /// or is not owned by the user.
    pub async fn update_owned(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
        req: &UpdateIngredientRequest,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = db.begin().await?;

        let name = req.name.as_deref().map(normalize_name);
        let key = name.as_deref().map(name_key);
        let result = sqlx::query(
            r#"
            UPDATE ingredients SET
                name = COALESCE(?, name),
                name_key = COALESCE(?, name_key),
                alcohol_type = CASE WHEN ? THEN ? ELSE alcohol_type END,
                proof = CASE WHEN ? THEN ? ELSE proof END,
                updated_at = ?
            WHERE id = ? AND created_by = ?
            "#,
        )
        .bind(&name)
        .bind(&key)
        .bind(req.alcohol_type.is_some())
        .bind(req.alcohol_type.clone().flatten())
        .bind(req.proof.is_some())
        .bind(req.proof.flatten())
        .bind(super::now())
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(ref sources) = req.sources {
            sqlx::query("DELETE FROM ingredient_sources WHERE ingredient_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for source in sources {
                Self::add_source(&mut tx, id, source).await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Delete a user-owned ingredient; returns false when nothing was deleted
    pub async fn delete_owned(db: &SqlitePool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ingredients WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn group_sources(
    sources: Vec<IngredientSource>,
    sizes: Vec<IngredientSize>,
) -> HashMap<String, Vec<SourceResponse>> {
    let mut sizes_by_source: HashMap<String, Vec<IngredientSize>> = HashMap::new();
    for size in sizes {
        sizes_by_source
            .entry(size.source_id.clone())
            .or_default()
            .push(size);
    }

    let mut grouped: HashMap<String, Vec<SourceResponse>> = HashMap::new();
    for source in sources {
        let sizes = sizes_by_source.remove(&source.id).unwrap_or_default();
        grouped
            .entry(source.ingredient_id)
            .or_default()
            .push(SourceResponse {
                id: source.id,
                name: source.name,
                sizes,
            });
    }
    grouped
}
