//! Vendor price-list scraper.
//!
//! Fetches every configured price guide page, reads the product table rows
//! and upserts them into the global ingredient catalog. Every page must
//! fetch successfully before anything is written.

use async_trait::async_trait;
use futures::future::try_join_all;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::db::{name_key, normalize_name, Ingredient, SizeInput, SourceInput};
use crate::engine::units::{parse_size_ml, Unit};

lazy_static! {
    static ref ROW_SELECTOR: Selector = Selector::parse("tr").unwrap();
    static ref CELL_SELECTOR: Selector = Selector::parse("td").unwrap();
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Source of raw price-guide HTML
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Fetches pages over HTTP
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, config: &ScraperConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(config.request_timeout),
        }
    }
}

#[async_trait]
impl PriceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let fetch_error = |message: String| ScrapeError::Fetch {
            url: url.to_string(),
            message,
        };

        debug!(url = %url, "Fetching price guide");
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

/// One product row of a price guide table
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub code: String,
    pub name: String,
    pub size: String,
    pub regular_price: f64,
    pub sale_price: f64,
    pub savings: f64,
    pub proof: Option<f64>,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeReport {
    pub pages: usize,
    pub rows: usize,
    /// Rows dropped because their size could not be read
    pub skipped_rows: usize,
    /// Existing ingredients that were refreshed
    pub matched: usize,
    /// New ingredients inserted
    pub upserted: usize,
}

/// Catalog entry built from all rows sharing a name
#[derive(Debug, Clone)]
struct ScrapedIngredient {
    name: String,
    key: String,
    alcohol_type: String,
    proof: Option<f64>,
    sizes: Vec<SizeInput>,
}

/// Category of a price guide page: the last path segment of its URL
pub fn category_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read product rows from a price guide page.
///
/// Columns are code, brand, size, regular price, sale price, savings and
/// proof. Rows without a brand, a size or a readable regular price are
/// ignored, which drops header rows.
pub fn parse_price_table(html: &str, category: &str) -> Vec<PriceRow> {
    let document = Html::parse_document(html);

    document
        .select(&ROW_SELECTOR)
        .filter_map(|row| {
            let cells: Vec<String> = row
                .select(&CELL_SELECTOR)
                .map(|cell| normalize_name(&cell.text().collect::<String>()))
                .collect();

            let name = cells.get(1).filter(|s| !s.is_empty())?;
            let size = cells.get(2).filter(|s| !s.is_empty())?;
            let regular_price = parse_number(cells.get(3)?)?;

            Some(PriceRow {
                code: cells[0].clone(),
                name: name.clone(),
                size: size.clone(),
                regular_price,
                sale_price: cells
                    .get(4)
                    .and_then(|s| parse_number(s))
                    .unwrap_or(regular_price),
                savings: cells.get(5).and_then(|s| parse_number(s)).unwrap_or(0.0),
                proof: cells.get(6).and_then(|s| parse_number(s)),
                category: category.to_string(),
            })
        })
        .collect()
}

/// Drop a trailing printed size from a product name ("Gin 750ml" -> "Gin")
pub fn strip_size_suffix(name: &str, size: &str) -> String {
    let name = normalize_name(name);
    let size = normalize_name(size);
    if size.is_empty() || name.len() <= size.len() {
        return name;
    }
    let split = name.len() - size.len();
    match name.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(&size) => name[..split].trim_end().to_string(),
        _ => name,
    }
}

/// Group rows into ingredients keyed by normalized name, keeping first-seen
/// order. Returns the ingredients and the number of rows skipped.
fn group_rows(rows: &[PriceRow]) -> (Vec<ScrapedIngredient>, usize) {
    let mut ingredients: Vec<ScrapedIngredient> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for row in rows {
        let Some(quantity_ml) = parse_size_ml(&row.size) else {
            debug!(name = %row.name, size = %row.size, "Skipping row with unreadable size");
            skipped += 1;
            continue;
        };

        let name = strip_size_suffix(&row.name, &row.size);
        let key = name_key(&name);
        let index = *by_key.entry(key.clone()).or_insert_with(|| {
            ingredients.push(ScrapedIngredient {
                name,
                key,
                alcohol_type: row.category.clone(),
                proof: row.proof,
                sizes: Vec::new(),
            });
            ingredients.len() - 1
        });

        ingredients[index].sizes.push(SizeInput {
            label: Some(row.size.clone()),
            unit: Unit::Ml,
            quantity: quantity_ml,
            price: row.sale_price,
            regular_price: Some(row.regular_price),
            discount: Some(row.savings),
        });
    }

    (ingredients, skipped)
}

/// Write scraped ingredients into the global catalog in one transaction.
/// Returns `(matched, upserted)`.
async fn upsert_catalog(
    db: &SqlitePool,
    vendor: &str,
    ingredients: &[ScrapedIngredient],
) -> Result<(usize, usize), sqlx::Error> {
    let mut tx = db.begin().await?;
    let mut matched = 0;
    let mut upserted = 0;

    for scraped in ingredients {
        let source = SourceInput {
            name: vendor.to_string(),
            sizes: scraped.sizes.clone(),
        };

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM ingredients WHERE name_key = ? AND created_by IS NULL LIMIT 1",
        )
        .bind(&scraped.key)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE ingredients SET proof = ?, alcohol_type = ?, updated_at = ? WHERE id = ?")
                    .bind(scraped.proof)
                    .bind(&scraped.alcohol_type)
                    .bind(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;

                let source_id: Option<String> = sqlx::query_scalar(
                    "SELECT id FROM ingredient_sources WHERE ingredient_id = ? AND name = ? LIMIT 1",
                )
                .bind(&id)
                .bind(vendor)
                .fetch_optional(&mut *tx)
                .await?;

                match source_id {
                    Some(source_id) => Ingredient::replace_sizes(&mut tx, &source_id, &source.sizes).await?,
                    None => {
                        Ingredient::add_source(&mut tx, &id, &source).await?;
                    }
                }
                matched += 1;
            }
            None => {
                let id = Ingredient::insert(
                    &mut tx,
                    &scraped.name,
                    Some(&scraped.alcohol_type),
                    scraped.proof,
                    None,
                )
                .await?;
                Ingredient::add_source(&mut tx, &id, &source).await?;
                upserted += 1;
            }
        }
    }

    tx.commit().await?;
    Ok((matched, upserted))
}

/// Fetch, parse and store every configured price guide page
pub async fn run_scrape(
    db: &SqlitePool,
    fetcher: &dyn PriceFetcher,
    config: &ScraperConfig,
) -> Result<ScrapeReport, ScrapeError> {
    info!(pages = config.urls.len(), vendor = %config.vendor_name, "Starting price scrape");

    let pages = try_join_all(config.urls.iter().map(|url| fetcher.fetch(url))).await?;

    let rows: Vec<PriceRow> = config
        .urls
        .iter()
        .zip(&pages)
        .flat_map(|(url, html)| parse_price_table(html, &category_from_url(url)))
        .collect();

    let (ingredients, skipped_rows) = group_rows(&rows);
    let (matched, upserted) = upsert_catalog(db, &config.vendor_name, &ingredients).await?;

    let report = ScrapeReport {
        pages: pages.len(),
        rows: rows.len(),
        skipped_rows,
        matched,
        upserted,
    };
    info!(
        rows = report.rows,
        skipped = report.skipped_rows,
        matched = report.matched,
        upserted = report.upserted,
        "Price scrape finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    const GIN_PAGE: &str = r#"
        <html><body><table>
          <tr><th>Code</th><th>Brand</th><th>Size</th><th>Regular</th><th>Sale</th><th>Savings</th><th>Proof</th></tr>
          <tr><td>1001</td><td>Tanqueray Gin 750ml</td><td>750ml</td><td>$29.99</td><td>$24.99</td><td>$5.00</td><td>94.6</td></tr>
          <tr><td>1002</td><td>Tanqueray Gin 1.75L</td><td>1.75L</td><td>$49.99</td><td></td><td></td><td>94.6</td></tr>
          <tr><td>1003</td><td>Mystery Gin</td><td>N/A</td><td>$19.99</td><td>$19.99</td><td>0</td><td>80</td></tr>
          <tr><td>1004</td><td>Big Batch Gin</td><td>12/750ml</td><td>$1,199.00</td><td>$1,099.00</td><td>$100.00</td><td>n/a</td></tr>
        </table></body></html>
    "#;

    const RUM_PAGE: &str = r#"
        <table>
          <tr><td>2001</td><td>Plantation   Rum</td><td>1L</td><td>22.00</td><td>20.00</td><td>2.00</td><td>80</td></tr>
          <tr><td>Code</td><td>Brand</td><td>Size</td><td>Regular</td></tr>
        </table>
    "#;

    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PriceFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
            self.pages.get(url).cloned().ok_or_else(|| ScrapeError::Fetch {
                url: url.to_string(),
                message: "HTTP 404 Not Found".to_string(),
            })
        }
    }

    fn config(urls: &[&str]) -> ScraperConfig {
        ScraperConfig {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    fn fetcher() -> StaticFetcher {
        StaticFetcher {
            pages: HashMap::from([
                ("https://shop.test/price_guide/gin".to_string(), GIN_PAGE.to_string()),
                ("https://shop.test/price_guide/rum/".to_string(), RUM_PAGE.to_string()),
            ]),
        }
    }

    #[test]
    fn test_category_from_url() {
        assert_eq!(category_from_url("https://802spirits.com/price_guide/gin"), "gin");
        assert_eq!(category_from_url("https://shop.test/price_guide/rum/"), "rum");
        assert_eq!(category_from_url("https://shop.test/p/vodka?page=2"), "vodka");
    }

    #[test]
    fn test_parse_price_table() {
        let rows = parse_price_table(GIN_PAGE, "gin");
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].code, "1001");
        assert_eq!(rows[0].name, "Tanqueray Gin 750ml");
        assert_eq!(rows[0].regular_price, 29.99);
        assert_eq!(rows[0].sale_price, 24.99);
        assert_eq!(rows[0].savings, 5.0);
        assert_eq!(rows[0].proof, Some(94.6));
        assert_eq!(rows[0].category, "gin");

        // Missing sale price and savings fall back
        assert_eq!(rows[1].sale_price, 49.99);
        assert_eq!(rows[1].savings, 0.0);

        assert_eq!(rows[3].regular_price, 1199.0);
        assert_eq!(rows[3].proof, None);
    }

    #[test]
    fn test_parse_ignores_header_rows_and_collapses_whitespace() {
        let rows = parse_price_table(RUM_PAGE, "rum");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Plantation Rum");
    }

    #[test]
    fn test_strip_size_suffix() {
        assert_eq!(strip_size_suffix("Tanqueray Gin 750ml", "750ml"), "Tanqueray Gin");
        assert_eq!(strip_size_suffix("Tanqueray Gin 1.75l", "1.75L"), "Tanqueray Gin");
        assert_eq!(strip_size_suffix("Plain Gin", "750ml"), "Plain Gin");
        assert_eq!(strip_size_suffix("750ml", "750ml"), "750ml");
    }

    #[test]
    fn test_group_rows_merges_sizes_and_skips_unreadable() {
        let rows = parse_price_table(GIN_PAGE, "gin");
        let (ingredients, skipped) = group_rows(&rows);
        assert_eq!(skipped, 1);
        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[0].name, "Tanqueray Gin");
        assert_eq!(ingredients[0].key, "tanqueray gin");
        assert_eq!(ingredients[0].sizes.len(), 2);
        assert_eq!(ingredients[0].sizes[1].quantity, 1750.0);
        assert_eq!(ingredients[1].sizes[0].quantity, 9000.0);
    }

    #[tokio::test]
    async fn test_run_scrape_inserts_then_matches() {
        let db = init_memory().await.unwrap();
        let config = config(&[
            "https://shop.test/price_guide/gin",
            "https://shop.test/price_guide/rum/",
        ]);

        let first = run_scrape(&db, &fetcher(), &config).await.unwrap();
        assert_eq!(
            first,
            ScrapeReport {
                pages: 2,
                rows: 5,
                skipped_rows: 1,
                matched: 0,
                upserted: 3,
            }
        );

        let second = run_scrape(&db, &fetcher(), &config).await.unwrap();
        assert_eq!(second.matched, 3);
        assert_eq!(second.upserted, 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredients")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 3);
        let sizes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredient_sizes")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(sizes, 4);

        let gin: (String, Option<f64>, Option<String>) = sqlx::query_as(
            "SELECT name, proof, alcohol_type FROM ingredients WHERE name_key = 'tanqueray gin'",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(gin.0, "Tanqueray Gin");
        assert_eq!(gin.1, Some(94.6));
        assert_eq!(gin.2.as_deref(), Some("gin"));
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_writing() {
        let db = init_memory().await.unwrap();
        let config = config(&[
            "https://shop.test/price_guide/gin",
            "https://shop.test/price_guide/missing",
        ]);

        let err = run_scrape(&db, &fetcher(), &config).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch { ref url, .. } if url.ends_with("missing")));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredients")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
