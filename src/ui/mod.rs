// Dashboard UI module
// Uses Askama templates for server-side rendering; forms post back to the
// same handlers the JSON API is built on.

mod forms;
mod templates;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::auth::{authenticate, clear_session, current_user, register_user, session_cookie};
use crate::api::error::ApiError;
use crate::api::ingredients::{sort_ingredients, validate_create_request, IngredientQuery, IngredientSort};
use crate::api::menus::validate_menu_input;
use crate::api::recipes::{apply_menu_placements, cost_recipe, validate_recipe_input, CostQuery};
use crate::db::{Ingredient, LoginRequest, Menu, MenuInput, Recipe, RecipeInput, RegisterRequest, User};
use crate::engine::units::Unit;
use crate::engine::{run_scrape, HttpFetcher};
use crate::AppState;

use forms::CustomIngredientForm;
pub use templates::*;

/// Blank ingredient rows offered below a recipe's existing lines
const SPARE_LINES: usize = 3;
/// Blank recipe rows offered below a menu's existing entries
const SPARE_ENTRIES: usize = 3;
/// Menu placement rows on the new recipe form
const PLACEMENT_ROWS: usize = 2;

const SORT_OPTIONS: [(IngredientSort, &str, &str); 5] = [
    (IngredientSort::Name, "name", "Name"),
    (IngredientSort::Category, "category", "Category"),
    (IngredientSort::Size, "size", "Size"),
    (IngredientSort::Price, "price", "Price"),
    (IngredientSort::UnitPrice, "unit_price", "Price per oz"),
];

// Helper to render templates and handle errors
fn render_template<T: Template>(template: T) -> Response {
    render_with_status(StatusCode::OK, template)
}

fn render_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Template error: {}", e)).into_response(),
    }
}

fn error_page(user_name: &str, err: ApiError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        warn!("Dashboard request failed: {}", err);
    }
    render_with_status(
        status,
        ErrorTemplate {
            user_name: user_name.to_string(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            message: err.summary(),
        },
    )
}

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/auth/login", get(login_page).post(login_submit))
        .route("/auth/register", get(register_page).post(register_submit))
        .route("/auth/logout", get(logout))
        // Protected routes
        .route("/", get(dashboard))
        .route("/scrape", post(scrape_submit))
        .route("/ingredients", get(ingredients_list).post(ingredient_create))
        .route("/ingredients/:id", get(ingredient_detail))
        .route("/ingredients/:id/delete", post(ingredient_delete))
        .route("/recipes", get(recipes_list))
        .route("/recipes/new", get(recipe_new_form).post(recipe_create))
        .route("/recipes/:id", get(recipe_detail))
        .route("/recipes/:id/edit", get(recipe_edit_form).post(recipe_update))
        .route("/recipes/:id/delete", post(recipe_delete))
        .route("/menus", get(menus_list))
        .route("/menus/new", get(menu_new_form).post(menu_create))
        .route("/menus/:id", get(menu_detail).post(menu_update))
        .route("/menus/:id/delete", post(menu_delete))
        .route("/profile", get(profile_page))
}

/// Session user, or the response to send instead
async fn session_user(state: &AppState, jar: &CookieJar) -> Result<User, Response> {
    match current_user(state, jar).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Redirect::to("/auth/login").into_response()),
        Err(e) => Err(error_page("", e.into())),
    }
}

macro_rules! require_user {
    ($state:expr, $jar:expr) => {
        match session_user(&$state, &$jar).await {
            Ok(user) => user,
            Err(response) => return response,
        }
    };
}

// Login page
async fn login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Ok(Some(_)) = current_user(&state, &jar).await {
        return Redirect::to("/").into_response();
    }
    render_template(LoginTemplate {
        user_name: String::new(),
        error: None,
        email: String::new(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// Login submit
async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginRequest>,
) -> Response {
    let result = match authenticate(&state, &form).await {
        Ok(user) => session_cookie(&state.config.auth, &user.id),
        Err(e) => Err(e),
    };

    match result {
        Ok(cookie) => (jar.add(cookie), Redirect::to("/")).into_response(),
        Err(e) => render_with_status(
            e.status(),
            LoginTemplate {
                user_name: String::new(),
                error: Some(e.summary()),
                email: form.email,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        ),
    }
}

// Registration page
async fn register_page() -> Response {
    render_template(RegisterTemplate {
        user_name: String::new(),
        error: None,
        name: String::new(),
        email: String::new(),
    })
}

// Registration submit; a new account is signed in straight away
async fn register_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterRequest>,
) -> Response {
    let result = match register_user(&state, &form).await {
        Ok(user) => session_cookie(&state.config.auth, &user.id),
        Err(e) => Err(e),
    };

    match result {
        Ok(cookie) => (jar.add(cookie), Redirect::to("/")).into_response(),
        Err(e) => render_with_status(
            e.status(),
            RegisterTemplate {
                user_name: String::new(),
                error: Some(e.summary()),
                name: form.name,
                email: form.email,
            },
        ),
    }
}

// Logout
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (clear_session(jar), Redirect::to("/auth/login"))
}

async fn dashboard_page(
    state: &AppState,
    user: &User,
    notice: Option<String>,
    error: Option<String>,
) -> Result<DashboardTemplate, ApiError> {
    let ingredients = Ingredient::list_visible(&state.db, &user.id, None).await?;
    let custom_count = ingredients
        .iter()
        .filter(|i| i.created_by.as_deref() == Some(user.id.as_str()))
        .count();
    let recipe_count = Recipe::list_for_user(&state.db, &user.id).await?.len();
    let menu_count = Menu::list_for_user(&state.db, &user.id).await?.len();

    Ok(DashboardTemplate {
        user_name: user.name.clone(),
        ingredient_count: ingredients.len(),
        custom_count,
        recipe_count,
        menu_count,
        notice,
        error,
    })
}

// Dashboard home
async fn dashboard(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);
    match dashboard_page(&state, &user, None, None).await {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

// Refresh catalog prices from the vendor price guides
async fn scrape_submit(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);
    info!(user_id = %user.id, "Price scrape requested from dashboard");

    let fetcher = HttpFetcher::new(state.http.clone(), &state.config.scraper);
    let (notice, error) = match run_scrape(&state.db, &fetcher, &state.config.scraper).await {
        Ok(report) => (
            Some(format!(
                "Read {} prices from {} pages: {} ingredients refreshed, {} added, {} rows skipped",
                report.rows, report.pages, report.matched, report.upserted, report.skipped_rows
            )),
            None,
        ),
        Err(e) => (None, Some(ApiError::from(e).summary())),
    };

    match dashboard_page(&state, &user, notice, error).await {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

async fn ingredients_page(
    state: &AppState,
    user: &User,
    query: &IngredientQuery,
    error: Option<String>,
) -> Result<IngredientsTemplate, ApiError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    let mut ingredients =
        Ingredient::list_details(&state.db, &user.id, Some(q).filter(|q| !q.is_empty())).await?;
    sort_ingredients(&mut ingredients, query.sort, query.desc);

    let sort = SORT_OPTIONS
        .iter()
        .find(|(sort, _, _)| *sort == query.sort)
        .map(|(_, value, _)| value.to_string())
        .unwrap_or_default();

    Ok(IngredientsTemplate {
        user_name: user.name.clone(),
        q: q.to_string(),
        sort,
        desc: query.desc,
        sort_options: SORT_OPTIONS
            .iter()
            .map(|(_, value, label)| SelectOption::new(*value, *label))
            .collect(),
        ingredients: ingredients.iter().map(IngredientRow::from).collect(),
        error,
    })
}

// Ingredient catalog with search and sorting
async fn ingredients_list(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<IngredientQuery>,
) -> Response {
    let user = require_user!(state, jar);
    match ingredients_page(&state, &user, &query, None).await {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

// Create a custom ingredient
async fn ingredient_create(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CustomIngredientForm>,
) -> Response {
    let user = require_user!(state, jar);

    let result = match forms::parse_custom_ingredient(&form) {
        Ok(req) => match validate_create_request(&req) {
            Ok(()) => Ingredient::create_custom(&state.db, &user.id, &req)
                .await
                .map_err(ApiError::from),
            Err(e) => Err(e),
        },
        Err(message) => Err(ApiError::bad_request(message)),
    };

    match result {
        Ok(id) => {
            info!(ingredient_id = %id, "Created custom ingredient");
            Redirect::to(&format!("/ingredients/{}", id)).into_response()
        }
        Err(e) => {
            let status = e.status();
            match ingredients_page(&state, &user, &IngredientQuery::default(), Some(e.summary())).await {
                Ok(template) => render_with_status(status, template),
                Err(e) => error_page(&user.name, e),
            }
        }
    }
}

// Ingredient detail with every source and size
async fn ingredient_detail(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let user = require_user!(state, jar);

    let ingredient = match Ingredient::details(&state.db, &id, &user.id).await {
        Ok(Some(ingredient)) => ingredient,
        Ok(None) => return error_page(&user.name, ApiError::not_found("Ingredient not found")),
        Err(e) => return error_page(&user.name, e.into()),
    };

    let sources = ingredient
        .sources
        .iter()
        .map(|source| SourceView {
            name: source.name.clone(),
            sizes: source.sizes.iter().map(SizeView::from).collect(),
        })
        .collect();

    render_template(IngredientDetailTemplate {
        user_name: user.name.clone(),
        ingredient: IngredientRow::from(&ingredient),
        sources,
    })
}

// Delete a custom ingredient
async fn ingredient_delete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let user = require_user!(state, jar);

    match Ingredient::delete_owned(&state.db, &id, &user.id).await {
        Ok(true) => {
            info!(ingredient_id = %id, "Deleted custom ingredient");
            Redirect::to("/ingredients").into_response()
        }
        Ok(false) => error_page(
            &user.name,
            ApiError::not_found("Ingredient not found or not yours to delete"),
        ),
        Err(e) => error_page(&user.name, e.into()),
    }
}

// Recipe list
async fn recipes_list(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);
    match Recipe::list_details(&state.db, &user.id).await {
        Ok(recipes) => render_template(RecipesTemplate {
            user_name: user.name.clone(),
            recipes: recipes.iter().map(RecipeRow::from).collect(),
        }),
        Err(e) => error_page(&user.name, e.into()),
    }
}

fn pad_lines(mut lines: Vec<LineInput>) -> Vec<LineInput> {
    lines.extend((0..SPARE_LINES).map(|_| LineInput::blank()));
    lines
}

fn lines_from_pairs(pairs: &[(String, String)]) -> Vec<LineInput> {
    forms::rows(pairs, &["ingredient_id", "quantity", "unit"])
        .into_iter()
        .filter(|row| !row[0].is_empty())
        .map(|row| LineInput {
            ingredient_id: row[0].to_string(),
            quantity: row[1].to_string(),
            unit: row[2].to_string(),
        })
        .collect()
}

fn placements_from_pairs(pairs: &[(String, String)]) -> Vec<PlacementInput> {
    let mut placements: Vec<PlacementInput> = forms::rows(pairs, &["menu_id", "menu_name", "menu_price"])
        .into_iter()
        .map(|row| PlacementInput {
            menu_id: row[0].to_string(),
            name: row[1].to_string(),
            price: row[2].to_string(),
        })
        .collect();
    placements.resize_with(placements.len().max(PLACEMENT_ROWS), PlacementInput::blank);
    placements
}

#[allow(clippy::too_many_arguments)]
async fn recipe_form(
    state: &AppState,
    user: &User,
    title: &str,
    action: String,
    name: String,
    lines: Vec<LineInput>,
    placements: Vec<PlacementInput>,
    error: Option<String>,
) -> Result<RecipeFormTemplate, ApiError> {
    let ingredient_options = Ingredient::list_visible(&state.db, &user.id, None)
        .await?
        .into_iter()
        .map(|i| {
            let label = match i.alcohol_type {
                Some(kind) => format!("{} ({})", i.name, kind),
                None => i.name,
            };
            SelectOption::new(i.id, label)
        })
        .collect();

    let menu_options = if placements.is_empty() {
        Vec::new()
    } else {
        std::iter::once(SelectOption::new("", "New menu"))
            .chain(
                Menu::list_for_user(&state.db, &user.id)
                    .await?
                    .into_iter()
                    .map(|m| SelectOption::new(m.id, m.name)),
            )
            .collect()
    };

    Ok(RecipeFormTemplate {
        user_name: user.name.clone(),
        title: title.to_string(),
        action,
        name,
        lines: pad_lines(lines),
        ingredient_options,
        units: Unit::all()
            .iter()
            .map(|u| SelectOption::new(u.as_str(), u.as_str()))
            .collect(),
        placements,
        menu_options,
        error,
    })
}

// New recipe form
async fn recipe_new_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);
    let placements = (0..PLACEMENT_ROWS).map(|_| PlacementInput::blank()).collect();
    match recipe_form(
        &state,
        &user,
        "New recipe",
        "/recipes/new".to_string(),
        String::new(),
        Vec::new(),
        placements,
        None,
    )
    .await
    {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

/// Parse and validate a submitted recipe form
async fn submitted_recipe(
    state: &AppState,
    user: &User,
    pairs: &[(String, String)],
) -> Result<(RecipeInput, Vec<crate::db::MenuPlacement>), ApiError> {
    let (input, placements) = forms::parse_recipe_form(pairs).map_err(ApiError::bad_request)?;
    validate_recipe_input(state, user, &input).await?;
    Ok((input, placements))
}

// Create recipe, then place it on the chosen menus
async fn recipe_create(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let user = require_user!(state, jar);

    let created = match submitted_recipe(&state, &user, &pairs).await {
        Ok((input, placements)) => Recipe::create(&state.db, &user.id, &input)
            .await
            .map(|id| (id, placements))
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };

    match created {
        Ok((id, placements)) => {
            let updated = apply_menu_placements(&state, &user, &id, &placements).await;
            info!(recipe_id = %id, menus = updated.len(), "Created recipe");
            Redirect::to(&format!("/recipes/{}", id)).into_response()
        }
        Err(e) => {
            let status = e.status();
            match recipe_form(
                &state,
                &user,
                "New recipe",
                "/recipes/new".to_string(),
                forms::value(&pairs, "name").to_string(),
                lines_from_pairs(&pairs),
                placements_from_pairs(&pairs),
                Some(e.summary()),
            )
            .await
            {
                Ok(template) => render_with_status(status, template),
                Err(e) => error_page(&user.name, e),
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CostForm {
    #[serde(default)]
    menu_price: String,
    #[serde(default)]
    desired_margin: String,
}

fn optional_number(text: &str, what: &str) -> Result<Option<f64>, ApiError> {
    match text.trim().trim_start_matches('$').trim_end_matches('%') {
        "" => Ok(None),
        value => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("{} must be a number", what))),
    }
}

// Recipe detail with cost analysis
async fn recipe_detail(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Query(form): Query<CostForm>,
) -> Response {
    let user = require_user!(state, jar);

    let recipe = match Recipe::details(&state.db, &id, &user.id).await {
        Ok(Some(recipe)) => recipe,
        Ok(None) => return error_page(&user.name, ApiError::not_found("Recipe not found")),
        Err(e) => return error_page(&user.name, e.into()),
    };

    let mut menu_price_input = form.menu_price.trim().to_string();
    let analysis = async {
        let desired_margin = optional_number(&form.desired_margin, "Desired margin")?;
        let menu_price = match optional_number(&form.menu_price, "Menu price")? {
            Some(price) => Some(price),
            None => Recipe::latest_menu_price(&state.db, &recipe.id, &user.id).await?,
        };
        if let Some(price) = menu_price {
            menu_price_input = format!("{:.2}", price);
        }
        let query = CostQuery {
            menu_price,
            desired_margin,
        };
        let combinations = cost_recipe(&state, &user, &recipe, &query).await?;
        Ok::<_, ApiError>(CostAnalysis::new(&combinations, menu_price.unwrap_or_default()))
    }
    .await;

    let (analysis, cost_error) = match analysis {
        Ok(analysis) => (Some(analysis), None),
        Err(e) if e.status().is_server_error() => return error_page(&user.name, e),
        Err(e) => (None, Some(e.summary())),
    };

    render_template(RecipeDetailTemplate {
        user_name: user.name.clone(),
        id: recipe.id.clone(),
        name: recipe.name.clone(),
        lines: recipe
            .ingredients
            .iter()
            .map(|line| LineView {
                ingredient_id: line.ingredient_id.clone(),
                ingredient_name: line.ingredient_name.clone(),
                amount: line.amount.to_string(),
            })
            .collect(),
        menu_price: menu_price_input,
        desired_margin: form.desired_margin.trim().to_string(),
        analysis,
        cost_error,
    })
}

// Edit recipe form
async fn recipe_edit_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let user = require_user!(state, jar);

    let recipe = match Recipe::details(&state.db, &id, &user.id).await {
        Ok(Some(recipe)) => recipe,
        Ok(None) => return error_page(&user.name, ApiError::not_found("Recipe not found")),
        Err(e) => return error_page(&user.name, e.into()),
    };

    match recipe_form(
        &state,
        &user,
        "Edit recipe",
        format!("/recipes/{}/edit", recipe.id),
        recipe.name.clone(),
        LineInput::from_recipe(&recipe),
        Vec::new(),
        None,
    )
    .await
    {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

// Update recipe
async fn recipe_update(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let user = require_user!(state, jar);

    let updated = match submitted_recipe(&state, &user, &pairs).await {
        Ok((input, _)) => Recipe::update(&state.db, &id, &user.id, &input)
            .await
            .map_err(ApiError::from)
            .and_then(|found| {
                found
                    .then_some(())
                    .ok_or_else(|| ApiError::not_found("Recipe not found"))
            }),
        Err(e) => Err(e),
    };

    match updated {
        Ok(()) => Redirect::to(&format!("/recipes/{}", id)).into_response(),
        Err(e) if e.status() == StatusCode::NOT_FOUND => error_page(&user.name, e),
        Err(e) => {
            let status = e.status();
            match recipe_form(
                &state,
                &user,
                "Edit recipe",
                format!("/recipes/{}/edit", id),
                forms::value(&pairs, "name").to_string(),
                lines_from_pairs(&pairs),
                Vec::new(),
                Some(e.summary()),
            )
            .await
            {
                Ok(template) => render_with_status(status, template),
                Err(e) => error_page(&user.name, e),
            }
        }
    }
}

// Delete recipe
async fn recipe_delete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let user = require_user!(state, jar);
    match Recipe::delete(&state.db, &id, &user.id).await {
        Ok(true) => {
            info!(recipe_id = %id, "Deleted recipe");
            Redirect::to("/recipes").into_response()
        }
        Ok(false) => error_page(&user.name, ApiError::not_found("Recipe not found")),
        Err(e) => error_page(&user.name, e.into()),
    }
}

// Menu list
async fn menus_list(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);
    match Menu::list_details(&state.db, &user.id).await {
        Ok(menus) => render_template(MenusTemplate {
            user_name: user.name.clone(),
            menus: menus.iter().map(MenuRow::from).collect(),
        }),
        Err(e) => error_page(&user.name, e.into()),
    }
}

async fn menu_form(
    state: &AppState,
    user: &User,
    title: &str,
    menu_id: Option<String>,
    name: String,
    mut entries: Vec<EntryInput>,
    error: Option<String>,
) -> Result<MenuFormTemplate, ApiError> {
    let recipe_options: Vec<SelectOption> = Recipe::list_for_user(&state.db, &user.id)
        .await?
        .into_iter()
        .map(|r| SelectOption::new(r.id, r.name))
        .collect();

    // Summary reflects what is shown, including unsaved rows
    let prices: Vec<f64> = entries
        .iter()
        .filter(|e| !e.recipe_id.is_empty())
        .filter_map(|e| e.price.trim_start_matches('$').parse::<f64>().ok())
        .collect();
    let recipe_count = entries.iter().filter(|e| !e.recipe_id.is_empty()).count();

    entries.extend((0..SPARE_ENTRIES).map(|_| EntryInput::blank()));

    Ok(MenuFormTemplate {
        user_name: user.name.clone(),
        title: title.to_string(),
        action: match &menu_id {
            Some(id) => format!("/menus/{}", id),
            None => "/menus/new".to_string(),
        },
        menu_id,
        name,
        entries,
        recipe_options,
        revenue: money(prices.iter().sum()),
        recipe_count,
        error,
    })
}

fn entries_from_pairs(pairs: &[(String, String)]) -> Vec<EntryInput> {
    forms::rows(pairs, &["recipe_id", "price"])
        .into_iter()
        .filter(|row| !row[0].is_empty())
        .map(|row| EntryInput {
            recipe_id: row[0].to_string(),
            price: row[1].to_string(),
        })
        .collect()
}

async fn submitted_menu(
    state: &AppState,
    user: &User,
    pairs: &[(String, String)],
) -> Result<MenuInput, ApiError> {
    let input = forms::parse_menu_form(pairs).map_err(ApiError::bad_request)?;
    validate_menu_input(state, user, &input).await?;
    Ok(input)
}

// New menu form
async fn menu_new_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);
    match menu_form(&state, &user, "New menu", None, String::new(), Vec::new(), None).await {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

// Create menu
async fn menu_create(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let user = require_user!(state, jar);

    let created = match submitted_menu(&state, &user, &pairs).await {
        Ok(input) => Menu::create(&state.db, &user.id, &input)
            .await
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };

    match created {
        Ok(id) => {
            info!(menu_id = %id, "Created menu");
            Redirect::to(&format!("/menus/{}", id)).into_response()
        }
        Err(e) => {
            let status = e.status();
            match menu_form(
                &state,
                &user,
                "New menu",
                None,
                forms::value(&pairs, "name").to_string(),
                entries_from_pairs(&pairs),
                Some(e.summary()),
            )
            .await
            {
                Ok(template) => render_with_status(status, template),
                Err(e) => error_page(&user.name, e),
            }
        }
    }
}

// Menu detail and edit form
async fn menu_detail(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let user = require_user!(state, jar);

    let menu = match Menu::details(&state.db, &id, &user.id).await {
        Ok(Some(menu)) => menu,
        Ok(None) => return error_page(&user.name, ApiError::not_found("Menu not found")),
        Err(e) => return error_page(&user.name, e.into()),
    };

    match menu_form(
        &state,
        &user,
        &menu.name,
        Some(menu.id.clone()),
        menu.name.clone(),
        EntryInput::from_menu(&menu),
        None,
    )
    .await
    {
        Ok(template) => render_template(template),
        Err(e) => error_page(&user.name, e),
    }
}

// Update menu
async fn menu_update(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let user = require_user!(state, jar);

    let updated = match submitted_menu(&state, &user, &pairs).await {
        Ok(input) => Menu::update(&state.db, &id, &user.id, &input)
            .await
            .map_err(ApiError::from)
            .and_then(|found| {
                found
                    .then_some(())
                    .ok_or_else(|| ApiError::not_found("Menu not found"))
            }),
        Err(e) => Err(e),
    };

    match updated {
        Ok(()) => Redirect::to(&format!("/menus/{}", id)).into_response(),
        Err(e) if e.status() == StatusCode::NOT_FOUND => error_page(&user.name, e),
        Err(e) => {
            let status = e.status();
            let name = forms::value(&pairs, "name").to_string();
            match menu_form(
                &state,
                &user,
                "Edit menu",
                Some(id),
                name,
                entries_from_pairs(&pairs),
                Some(e.summary()),
            )
            .await
            {
                Ok(template) => render_with_status(status, template),
                Err(e) => error_page(&user.name, e),
            }
        }
    }
}

// Delete menu
async fn menu_delete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let user = require_user!(state, jar);
    match Menu::delete(&state.db, &id, &user.id).await {
        Ok(true) => {
            info!(menu_id = %id, "Deleted menu");
            Redirect::to("/menus").into_response()
        }
        Ok(false) => error_page(&user.name, ApiError::not_found("Menu not found")),
        Err(e) => error_page(&user.name, e.into()),
    }
}

// Profile page
async fn profile_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let user = require_user!(state, jar);

    let counts = async {
        let recipes = Recipe::list_for_user(&state.db, &user.id).await?.len();
        let menus = Menu::list_for_user(&state.db, &user.id).await?.len();
        let custom = Ingredient::list_visible(&state.db, &user.id, None)
            .await?
            .iter()
            .filter(|i| i.created_by.as_deref() == Some(user.id.as_str()))
            .count();
        Ok::<_, sqlx::Error>((recipes, menus, custom))
    }
    .await;

    match counts {
        Ok((recipes, menus, custom)) => {
            render_template(ProfileTemplate::new(&user, recipes, menus, custom))
        }
        Err(e) => error_page(&user.name, e.into()),
    }
}
