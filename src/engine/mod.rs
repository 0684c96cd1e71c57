//! Domain engines: the cost-combination calculator, unit handling and the
//! price-list scraper.

pub mod cost_calculator;
pub mod scraper;
pub mod units;

pub use cost_calculator::{calculate, CalculatorError, Combinations, Pricing};
pub use scraper::{run_scrape, HttpFetcher, PriceFetcher, ScrapeError, ScrapeReport};
