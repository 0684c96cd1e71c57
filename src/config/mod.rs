use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session cookies
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
    /// Session lifetime in days (default: 7)
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// Mark the session cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: default_session_secret(),
            session_ttl_days: default_session_ttl_days(),
            secure_cookies: false,
        }
    }
}

fn default_session_secret() -> String {
    // Sessions will not survive a restart unless a secret is configured
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn default_session_ttl_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Price guide pages to scrape; the last path segment is the category
    #[serde(default = "default_scrape_urls")]
    pub urls: Vec<String>,
    /// Source name recorded on scraped sizes
    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            urls: default_scrape_urls(),
            vendor_name: default_vendor_name(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_scrape_urls() -> Vec<String> {
    [
        "brandy", "cocktails", "cordials", "gin", "rum", "tequila", "vodka", "whiskey",
    ]
    .iter()
    .map(|category| format!("https://802spirits.com/price_guide/{}", category))
    .collect()
}

fn default_vendor_name() -> String {
    "802 Spirits".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            scraper: ScraperConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
