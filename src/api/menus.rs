use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_name, validate_price};
use crate::db::{Menu, MenuInput, MenuResponse, Recipe, User};
use crate::AppState;

/// Check the name, prices, and that every listed recipe belongs to the user
pub async fn validate_menu_input(
    state: &AppState,
    user: &User,
    input: &MenuInput,
) -> Result<(), ApiError> {
    let mut builder = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&input.name, "Menu") {
        builder.add("name", e);
    }

    for (i, entry) in input.recipes.iter().enumerate() {
        if let Err(e) = validate_price(entry.price) {
            builder.add(format!("recipes[{}].price", i), e);
        }
        if Recipe::find_for_user(&state.db, &entry.recipe_id, &user.id)
            .await?
            .is_none()
        {
            builder.add(format!("recipes[{}].recipe_id", i), "Unknown recipe");
        }
    }
    builder.finish()
}

async fn load_menu(state: &AppState, id: &str, user: &User) -> Result<MenuResponse, ApiError> {
    Menu::details(&state.db, id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Menu not found"))
}

/// GET /api/menus
pub async fn list_menus(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<MenuResponse>>, ApiError> {
    Ok(Json(Menu::list_details(&state.db, &user.id).await?))
}

/// GET /api/menus/:id
pub async fn get_menu(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<MenuResponse>, ApiError> {
    Ok(Json(load_menu(&state, &id, &user).await?))
}

/// POST /api/menus
pub async fn create_menu(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(input): Json<MenuInput>,
) -> Result<(StatusCode, Json<MenuResponse>), ApiError> {
    validate_menu_input(&state, &user, &input).await?;

    let id = Menu::create(&state.db, &user.id, &input).await?;
    tracing::info!(menu_id = %id, recipes = input.recipes.len(), "Created menu");
    Ok((StatusCode::CREATED, Json(load_menu(&state, &id, &user).await?)))
}

/// PUT /api/menus/:id
pub async fn update_menu(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(input): Json<MenuInput>,
) -> Result<Json<MenuResponse>, ApiError> {
    validate_menu_input(&state, &user, &input).await?;

    if !Menu::update(&state.db, &id, &user.id, &input).await? {
        return Err(ApiError::not_found("Menu not found"));
    }
    Ok(Json(load_menu(&state, &id, &user).await?))
}

/// DELETE /api/menus/:id
pub async fn delete_menu(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !Menu::delete(&state.db, &id, &user.id).await? {
        return Err(ApiError::not_found("Menu not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
