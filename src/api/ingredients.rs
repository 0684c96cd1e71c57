use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_amount, validate_name, validate_package_price, validate_proof};
use crate::db::{
    CreateIngredientRequest, Ingredient, IngredientResponse, SourceInput, UpdateIngredientRequest,
    User,
};
use crate::engine::units::Amount;
use crate::AppState;

/// Column the ingredient list is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientSort {
    #[default]
    Name,
    Category,
    /// Size of the best-value package
    Size,
    /// Price of the best-value package
    Price,
    UnitPrice,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub sort: IngredientSort,
    #[serde(default)]
    pub desc: bool,
}

/// Order ingredients for display. Ingredients without any priced size sort
/// last on the size and price columns.
pub fn sort_ingredients(ingredients: &mut [IngredientResponse], sort: IngredientSort, desc: bool) {
    let by_best = |a: &IngredientResponse, b: &IngredientResponse, f: fn(&crate::db::IngredientSize) -> f64| {
        match (a.best_value(), b.best_value()) {
            (Some(x), Some(y)) => f(x).total_cmp(&f(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    };

    ingredients.sort_by(|a, b| {
        let ordering = match sort {
            IngredientSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            IngredientSort::Category => a
                .alcohol_type
                .as_deref()
                .unwrap_or_default()
                .cmp(b.alcohol_type.as_deref().unwrap_or_default()),
            IngredientSort::Size => by_best(a, b, |s| s.quantity),
            IngredientSort::Price => by_best(a, b, |s| s.price),
            IngredientSort::UnitPrice => by_best(a, b, |s| s.unit_price),
        };
        if desc {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn validate_sources(builder: &mut ValidationErrorBuilder, sources: &[SourceInput]) {
    for (i, source) in sources.iter().enumerate() {
        if source.name.trim().is_empty() {
            builder.add(format!("sources[{}].name", i), "Source name is required");
        }
        for (j, size) in source.sizes.iter().enumerate() {
            let field = format!("sources[{}].sizes[{}]", i, j);
            if let Err(e) = validate_amount(&Amount::new(size.unit, size.quantity)) {
                builder.add(field.clone(), e);
            }
            if let Err(e) = validate_package_price(size.price) {
                builder.add(field, e);
            }
        }
    }
}

pub fn validate_create_request(req: &CreateIngredientRequest) -> Result<(), ApiError> {
    let mut builder = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.name, "Ingredient") {
        builder.add("name", e);
    }
    if let Err(e) = validate_proof(req.proof) {
        builder.add("proof", e);
    }
    if let Some(ref sources) = req.sources {
        validate_sources(&mut builder, sources);
    }
    builder.finish()
}

fn validate_update_request(req: &UpdateIngredientRequest) -> Result<(), ApiError> {
    let mut builder = ValidationErrorBuilder::new();
    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name, "Ingredient") {
            builder.add("name", e);
        }
    }
    if let Err(e) = validate_proof(req.proof.flatten()) {
        builder.add("proof", e);
    }
    if let Some(ref sources) = req.sources {
        validate_sources(&mut builder, sources);
    }
    builder.finish()
}

/// Catalog ingredients are visible but read-only
async fn ensure_owned(state: &AppState, id: &str, user: &User) -> Result<(), ApiError> {
    let ingredient = Ingredient::find_visible(&state.db, id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient not found"))?;
    if ingredient.created_by.as_deref() != Some(user.id.as_str()) {
        return Err(ApiError::forbidden("Catalog ingredients cannot be modified"));
    }
    Ok(())
}

/// GET /api/ingredients?q=&sort=&desc=
pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<Vec<IngredientResponse>>, ApiError> {
    let mut ingredients = Ingredient::list_details(&state.db, &user.id, query.q.as_deref()).await?;
    sort_ingredients(&mut ingredients, query.sort, query.desc);
    Ok(Json(ingredients))
}

/// GET /api/ingredients/:id
pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<IngredientResponse>, ApiError> {
    let ingredient = Ingredient::details(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient not found"))?;
    Ok(Json(ingredient))
}

/// POST /api/ingredients
pub async fn create_ingredient(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<IngredientResponse>), ApiError> {
    validate_create_request(&req)?;

    let id = Ingredient::create_custom(&state.db, &user.id, &req).await?;
    let ingredient = Ingredient::details(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::internal("Created ingredient disappeared"))?;

    tracing::info!(ingredient_id = %id, user_id = %user.id, "Created custom ingredient");
    Ok((StatusCode::CREATED, Json(ingredient)))
}

/// PUT /api/ingredients/:id
pub async fn update_ingredient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateIngredientRequest>,
) -> Result<Json<IngredientResponse>, ApiError> {
    validate_update_request(&req)?;
    ensure_owned(&state, &id, &user).await?;

    if !Ingredient::update_owned(&state.db, &id, &user.id, &req).await? {
        return Err(ApiError::not_found("Ingredient not found"));
    }
    let ingredient = Ingredient::details(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient not found"))?;
    Ok(Json(ingredient))
}

/// DELETE /api/ingredients/:id
pub async fn delete_ingredient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ensure_owned(&state, &id, &user).await?;

    if !Ingredient::delete_owned(&state.db, &id, &user.id).await? {
        return Err(ApiError::not_found("Ingredient not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
