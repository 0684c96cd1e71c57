//! Recipe API: CRUD, menu placement on create, and per-recipe cost analysis.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_amount, validate_name, validate_price};
use crate::db::{
    cost_inputs, CreateRecipeRequest, Ingredient, Menu, MenuEntryInput, MenuInput, MenuPlacement,
    Recipe, RecipeInput, RecipeResponse, User,
};
use crate::engine::{calculate, Combinations, Pricing};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateRecipeResponse {
    pub recipe: RecipeResponse,
    /// Menus the new recipe was added to or created for
    pub updated_menus: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CostQuery {
    pub menu_price: Option<f64>,
    pub desired_margin: Option<f64>,
}

/// Check the name, amounts, and that every ingredient is visible to the user
pub async fn validate_recipe_input(
    state: &AppState,
    user: &User,
    input: &RecipeInput,
) -> Result<(), ApiError> {
    let mut builder = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&input.name, "Recipe") {
        builder.add("name", e);
    }

    for (i, line) in input.ingredients.iter().enumerate() {
        if let Err(e) = validate_amount(&line.amount) {
            builder.add(format!("ingredients[{}].amount", i), e);
        }
        if Ingredient::find_visible(&state.db, &line.ingredient_id, &user.id)
            .await?
            .is_none()
        {
            builder.add(format!("ingredients[{}].ingredient_id", i), "Unknown ingredient");
        }
    }
    builder.finish()
}

/// Put a newly created recipe on the requested menus. Placements without a
/// name are skipped; a failing placement is logged and the rest continue.
pub async fn apply_menu_placements(
    state: &AppState,
    user: &User,
    recipe_id: &str,
    placements: &[MenuPlacement],
) -> Vec<String> {
    let mut updated = Vec::new();

    for placement in placements {
        if placement.name.trim().is_empty() {
            continue;
        }
        if let Err(e) = validate_price(placement.price) {
            warn!(menu = %placement.name, "Skipping menu placement: {}", e);
            continue;
        }

        let entry = MenuEntryInput {
            recipe_id: recipe_id.to_string(),
            price: placement.price,
        };

        let result = match placement.menu_id.as_deref().filter(|id| !id.is_empty()) {
            Some(menu_id) => Menu::append_recipe(&state.db, menu_id, &user.id, &entry)
                .await
                .map(|found| found.then(|| menu_id.to_string())),
            None => {
                let input = MenuInput {
                    name: placement.name.clone(),
                    recipes: vec![entry],
                };
                Menu::create(&state.db, &user.id, &input).await.map(Some)
            }
        };

        match result {
            Ok(Some(menu_id)) => updated.push(menu_id),
            Ok(None) => warn!(menu_id = ?placement.menu_id, "Skipping placement on unknown menu"),
            Err(e) => warn!(menu = %placement.name, "Failed to place recipe on menu: {}", e),
        }
    }

    updated
}

/// Run the cost calculator on a stored recipe. Without an explicit menu
/// price, the price from the most recently updated menu listing the recipe
/// is used.
pub async fn cost_recipe(
    state: &AppState,
    user: &User,
    recipe: &RecipeResponse,
    query: &CostQuery,
) -> Result<Combinations, ApiError> {
    let menu_price = match query.menu_price {
        Some(price) => price,
        None => Recipe::latest_menu_price(&state.db, &recipe.id, &user.id)
            .await?
            .ok_or_else(|| {
                ApiError::validation_field(
                    "menu_price",
                    "Menu price is required when the recipe is not on any menu",
                )
            })?,
    };

    let mut pricing = Pricing::new(menu_price);
    if let Some(margin) = query.desired_margin {
        pricing = pricing.with_desired_margin(margin);
    }

    let (slots, catalog) = cost_inputs(&state.db, recipe, &user.id).await?;
    Ok(calculate(&slots, &catalog, pricing)?)
}

async fn load_recipe(state: &AppState, id: &str, user: &User) -> Result<RecipeResponse, ApiError> {
    Recipe::details(&state.db, id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

/// GET /api/recipes
pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<RecipeResponse>>, ApiError> {
    Ok(Json(Recipe::list_details(&state.db, &user.id).await?))
}

/// GET /api/recipes/:id
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<RecipeResponse>, ApiError> {
    Ok(Json(load_recipe(&state, &id, &user).await?))
}

/// POST /api/recipes
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<CreateRecipeResponse>), ApiError> {
    validate_recipe_input(&state, &user, &req.recipe).await?;

    let id = Recipe::create(&state.db, &user.id, &req.recipe).await?;
    info!(recipe_id = %id, user_id = %user.id, "Created recipe");

    let updated_menus = apply_menu_placements(&state, &user, &id, &req.menus).await;
    let recipe = load_recipe(&state, &id, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRecipeResponse {
            recipe,
            updated_menus,
        }),
    ))
}

/// PUT /api/recipes/:id
pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(input): Json<RecipeInput>,
) -> Result<Json<RecipeResponse>, ApiError> {
    validate_recipe_input(&state, &user, &input).await?;

    if !Recipe::update(&state.db, &id, &user.id, &input).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    Ok(Json(load_recipe(&state, &id, &user).await?))
}

/// DELETE /api/recipes/:id
pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !Recipe::delete(&state.db, &id, &user.id).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    info!(recipe_id = %id, "Deleted recipe");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/recipes/:id/costs?menu_price=&desired_margin=
pub async fn recipe_costs(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Query(query): Query<CostQuery>,
) -> Result<Json<Combinations>, ApiError> {
    let recipe = load_recipe(&state, &id, &user).await?;
    Ok(Json(cost_recipe(&state, &user, &recipe, &query).await?))
}
