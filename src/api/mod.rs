pub mod auth;
mod calculator;
pub mod error;
pub mod ingredients;
pub mod menus;
pub mod recipes;
mod scrape;
pub mod validation;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    // Protected API routes
    let api_routes = Router::new()
        // Ingredients
        .route(
            "/ingredients",
            get(ingredients::list_ingredients).post(ingredients::create_ingredient),
        )
        .route(
            "/ingredients/:id",
            get(ingredients::get_ingredient)
                .put(ingredients::update_ingredient)
                .delete(ingredients::delete_ingredient),
        )
        // Recipes
        .route("/recipes", get(recipes::list_recipes).post(recipes::create_recipe))
        .route(
            "/recipes/:id",
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/recipes/:id/costs", get(recipes::recipe_costs))
        // Menus
        .route("/menus", get(menus::list_menus).post(menus::create_menu))
        .route(
            "/menus/:id",
            get(menus::get_menu)
                .put(menus::update_menu)
                .delete(menus::delete_menu),
        )
        // Tools
        .route("/calculator", post(calculator::calculate_costs))
        .route("/scrape", post(scrape::scrape_prices))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        app_with_db().await.0
    }

    async fn app_with_db() -> (Router, crate::DbPool) {
        let db = crate::db::init_memory().await.unwrap();
        let router = create_router(Arc::new(AppState::new(Config::default(), db.clone())));
        (router, db)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, set_cookie, json)
    }

    fn approx(value: &Value, expected: f64) -> bool {
        value
            .as_f64()
            .map(|v| (v - expected).abs() < 1e-6)
            .unwrap_or(false)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, cookie, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Sam",
                "email": email,
                "password": "password123",
                "confirm_password": "password123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        cookie.unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_rejected() {
        let app = app().await;
        let (status, _, body) = send(&app, Method::GET, "/api/recipes", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _, _) = send(
            &app,
            Method::GET,
            "/api/menus",
            Some("__session=forged.deadbeef"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = app().await;
        let cookie = register(&app, "Sam@Bar.com").await;
        assert!(cookie.starts_with("__session="));

        let (status, _, body) = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "sam@bar.com");
        assert!(body.get("password_hash").is_none());

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Sam",
                "email": "sam@bar.com",
                "password": "password123",
                "confirm_password": "password123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "User with this email already exists");

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "sam@bar.com", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid credentials");

        let (status, cookie, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "SAM@bar.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.is_some());
    }

    #[tokio::test]
    async fn test_recipe_menu_and_costs_flow() {
        let app = app().await;
        let cookie = register(&app, "owner@bar.com").await;
        let cookie = Some(cookie.as_str());

        let (status, _, vodka) = send(
            &app,
            Method::POST,
            "/api/ingredients",
            cookie,
            Some(json!({
                "name": "Vodka",
                "sources": [
                    {"name": "Shop A", "sizes": [{"unit": "oz", "quantity": 10, "price": 10}]},
                    {"name": "Shop B", "sizes": [{"unit": "oz", "quantity": 10, "price": 20}]}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", vodka);
        let vodka_id = vodka["id"].as_str().unwrap().to_string();

        let (status, _, created) = send(
            &app,
            Method::POST,
            "/api/recipes",
            cookie,
            Some(json!({
                "name": "Vodka Soda",
                "ingredients": [{"ingredient_id": vodka_id, "amount": {"unit": "oz", "quantity": 2}}],
                "menus": [{"name": "Bar", "price": 10}, {"name": "", "price": 5}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        assert_eq!(created["updated_menus"].as_array().unwrap().len(), 1);
        let recipe_id = created["recipe"]["id"].as_str().unwrap().to_string();

        let (status, _, menus) = send(&app, Method::GET, "/api/menus", cookie, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(menus[0]["name"], "Bar");
        assert_eq!(menus[0]["recipe_count"], 1);
        assert!(approx(&menus[0]["revenue"], 10.0));

        // Menu price comes from the menu
        let uri = format!("/api/recipes/{}/costs", recipe_id);
        let (status, _, costs) = send(&app, Method::GET, &uri, cookie, None).await;
        assert_eq!(status, StatusCode::OK, "{}", costs);
        let recipe_costs = costs["recipe_costs"].as_array().unwrap();
        assert_eq!(recipe_costs.len(), 2);
        assert!(approx(&recipe_costs[0]["total_cost"], 2.0));
        assert!(approx(&recipe_costs[0]["menu_price"], 10.0));
        assert!(approx(&recipe_costs[0]["profit_margin"], 80.0));
        assert!(approx(&recipe_costs[1]["total_cost"], 4.0));

        let uri = format!("/api/recipes/{}/costs?menu_price=0", recipe_id);
        let (status, _, _) = send(&app, Method::GET, &uri, cookie, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, Method::DELETE, &format!("/api/ingredients/{}", vodka_id), cookie, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_costs_require_price_when_not_on_menu() {
        let app = app().await;
        let cookie = register(&app, "owner@bar.com").await;
        let cookie = Some(cookie.as_str());

        let (_, _, created) = send(
            &app,
            Method::POST,
            "/api/recipes",
            cookie,
            Some(json!({"name": "Empty Glass", "ingredients": []})),
        )
        .await;
        let recipe_id = created["recipe"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/recipes/{}/costs", recipe_id);
        let (status, _, body) = send(&app, Method::GET, &uri, cookie, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");

        let uri = format!("/api/recipes/{}/costs?menu_price=8", recipe_id);
        let (status, _, body) = send(&app, Method::GET, &uri, cookie, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["recipe_costs"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_users_cannot_see_each_others_recipes() {
        let app = app().await;
        let owner = register(&app, "owner@bar.com").await;
        let other = register(&app, "other@bar.com").await;

        let (_, _, created) = send(
            &app,
            Method::POST,
            "/api/recipes",
            Some(&owner),
            Some(json!({"name": "Secret Sour", "ingredients": []})),
        )
        .await;
        let uri = format!("/api/recipes/{}", created["recipe"]["id"].as_str().unwrap());

        let (status, _, _) = send(&app, Method::GET, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_calculator_endpoint() {
        let app = app().await;
        let cookie = register(&app, "owner@bar.com").await;
        let cookie = Some(cookie.as_str());

        let (_, _, gin) = send(
            &app,
            Method::POST,
            "/api/ingredients",
            cookie,
            Some(json!({
                "name": "Gin",
                "sources": [{"name": "Shop", "sizes": [{"unit": "oz", "quantity": 10, "price": 15}]}]
            })),
        )
        .await;
        let source_id = gin["sources"][0]["id"].as_str().unwrap().to_string();

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/calculator",
            cookie,
            Some(json!({
                "menu_price": 12,
                "desired_margin": 75,
                "slots": [{"label": "Gin", "amount": {"unit": "oz", "quantity": 2}, "brands": [source_id, "unknown"]}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let costs = body["recipe_costs"].as_array().unwrap();
        assert_eq!(costs.len(), 1);
        assert!(approx(&costs[0]["total_cost"], 3.0));
        assert!(approx(&costs[0]["suggested_price"]["price"], 12.0));

        // Written amounts are accepted too
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/calculator",
            cookie,
            Some(json!({
                "menu_price": 12,
                "slots": [{"label": "Gin", "amount": "1.5 oz", "brands": [source_id]}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert!(approx(&body["recipe_costs"][0]["total_cost"], 2.25));

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/calculator",
            cookie,
            Some(json!({
                "menu_price": 12,
                "slots": [{"amount": "a splash", "brands": [source_id]}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_catalog_ingredients_are_read_only() {
        let (app, db) = app_with_db().await;
        let cookie = register(&app, "owner@bar.com").await;
        let cookie = Some(cookie.as_str());

        let mut conn = db.acquire().await.unwrap();
        let global = crate::db::Ingredient::insert(&mut conn, "Catalog Rum", Some("rum"), Some(80.0), None)
            .await
            .unwrap();
        drop(conn);
        let uri = format!("/api/ingredients/{}", global);

        let (status, _, body) = send(&app, Method::GET, &uri, cookie, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_custom"], false);

        let (status, _, body) = send(&app, Method::PUT, &uri, cookie, Some(json!({"name": "Mine Now"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");
        assert_eq!(body["error"]["message"], "Catalog ingredients cannot be modified");

        let (status, _, body) = send(&app, Method::DELETE, &uri, cookie, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "Catalog ingredients cannot be modified");

        let (_, _, body) = send(&app, Method::GET, &uri, cookie, None).await;
        assert_eq!(body["name"], "Catalog Rum");

        let (status, _, _) = send(&app, Method::DELETE, "/api/ingredients/missing", cookie, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_menu_placement_is_skipped() {
        let app = app().await;
        let owner = register(&app, "owner@bar.com").await;
        let other = register(&app, "other@bar.com").await;

        let (status, _, foreign) = send(
            &app,
            Method::POST,
            "/api/menus",
            Some(&other),
            Some(json!({"name": "Their Menu", "recipes": []})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", foreign);
        let foreign_id = foreign["id"].as_str().unwrap().to_string();

        let (status, _, created) = send(
            &app,
            Method::POST,
            "/api/recipes",
            Some(&owner),
            Some(json!({
                "name": "Gimlet",
                "ingredients": [],
                "menus": [
                    {"menu_id": "no-such-menu", "name": "Ghost", "price": 9},
                    {"menu_id": foreign_id, "name": "Their Menu", "price": 9},
                    {"name": "Happy Hour", "price": 8}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        let updated = created["updated_menus"].as_array().unwrap();
        assert_eq!(updated.len(), 1);

        let (_, _, menus) = send(&app, Method::GET, "/api/menus", Some(&owner), None).await;
        assert_eq!(menus.as_array().unwrap().len(), 1);
        assert_eq!(menus[0]["name"], "Happy Hour");
        assert_eq!(menus[0]["id"], updated[0]);

        let uri = format!("/api/menus/{}", foreign_id);
        let (_, _, theirs) = send(&app, Method::GET, &uri, Some(&other), None).await;
        assert_eq!(theirs["recipe_count"], 0);
    }
}
