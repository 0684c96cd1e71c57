use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::User;
use crate::engine::{run_scrape, HttpFetcher, ScrapeReport};
use crate::AppState;

/// POST /api/scrape
///
/// Refreshes the global catalog from the configured vendor price guides.
pub async fn scrape_prices(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ScrapeReport>, ApiError> {
    tracing::info!(user_id = %user.id, "Price scrape requested");
    let fetcher = HttpFetcher::new(state.http.clone(), &state.config.scraper);
    let report = run_scrape(&state.db, &fetcher, &state.config.scraper).await?;
    Ok(Json(report))
}
