//! CLI module for the Barometer command-line interface.
//!
//! - no subcommand or `serve` - Start the web server (handled in main.rs)
//! - `scrape` - Refresh the ingredient catalog from the vendor price guides
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::{run_scrape, HttpFetcher};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "barometer")]
#[command(author, version, about = "Liquor catalog, recipe costing and menu margins", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "BAROMETER_CONFIG", default_value = "barometer.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the web server
    Serve,

    /// Scrape the configured price guides into the catalog and exit
    Scrape,

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

impl Cli {
    /// Whether this invocation starts the server
    pub fn serves(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }
}

/// Run a non-server CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Some(Commands::Scrape) => cmd_scrape(config).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(&cli.config),
        // Starting the server is handled in main.rs
        Some(Commands::Serve) | None => Ok(()),
    }
}

/// One-off catalog refresh against the configured database
async fn cmd_scrape(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;
    let db = crate::db::init(&config.server.data_dir).await?;

    let client = crate::AppState::new(config.clone(), db.clone()).http;
    let fetcher = HttpFetcher::new(client, &config.scraper);

    println!("Scraping {} price guide pages...", config.scraper.urls.len());
    let report = run_scrape(&db, &fetcher, &config.scraper)
        .await
        .context("Price scrape failed")?;

    println!();
    println!("[OK] Scrape complete");
    println!("  Pages:        {}", report.pages);
    println!("  Price rows:   {}", report.rows);
    println!("  Skipped rows: {}", report.skipped_rows);
    println!("  Refreshed:    {}", report.matched);
    println!("  Added:        {}", report.upserted);
    Ok(())
}

/// Problems worth flagging in an otherwise valid configuration
fn config_warnings(config: &Config, raw: &toml::Table) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if raw
        .get("auth")
        .and_then(|auth| auth.get("session_secret"))
        .is_none()
    {
        warnings.push("No session secret set - sessions will not survive a restart");
    }
    if !config.auth.secure_cookies {
        warnings.push("Session cookies are not marked Secure - enable secure_cookies behind HTTPS");
    }
    if config.scraper.urls.is_empty() {
        warnings.push("No price guide URLs configured - scraping will do nothing");
    }
    warnings
}

fn cmd_config_check(config_path: &Path) -> Result<()> {
    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    match (Config::load(config_path), toml::from_str::<toml::Table>(&content)) {
        (Ok(config), Ok(raw)) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  Port:         {}", config.server.port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!("  Static Dir:   {}", config.server.static_dir.display());
            println!();
            println!("Auth:");
            println!("  Session TTL:  {} days", config.auth.session_ttl_days);
            println!();
            println!("Scraper:");
            println!("  Vendor:       {}", config.scraper.vendor_name);
            println!("  Pages:        {}", config.scraper.urls.len());
            println!("  Timeout:      {}s", config.scraper.request_timeout);
            println!();

            let warnings = config_warnings(&config, &raw);
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
            }
            Ok(())
        }
        (Err(e), _) => {
            println!("[ERROR] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Invalid configuration")
        }
        (_, Err(e)) => {
            println!("[ERROR] Configuration file is invalid!");
            println!();
            println!("Error: {}", e);
            anyhow::bail!("Invalid configuration")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_invocation_serves() {
        let cli = Cli::try_parse_from(["barometer"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("barometer.toml"));
        assert!(cli.command.is_none());
        assert!(cli.serves());
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["barometer", "-c", "bar.toml", "scrape"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("bar.toml"));
        assert_eq!(cli.command, Some(Commands::Scrape));
        assert!(!cli.serves());

        let cli = Cli::try_parse_from(["barometer", "--log-level", "debug", "config", "check"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.command, Some(Commands::Config(ConfigCommands::Check)));

        assert!(Cli::try_parse_from(["barometer", "deploy"]).is_err());
    }

    #[test]
    fn test_config_warnings() {
        let raw: toml::Table =
            toml::from_str("[auth]\nsession_secret = \"abc\"\nsecure_cookies = true\n").unwrap();
        let mut config = Config::default();
        config.auth.secure_cookies = true;
        assert!(config_warnings(&config, &raw).is_empty());

        let raw: toml::Table = toml::from_str("[server]\nport = 8080\n").unwrap();
        config.auth.secure_cookies = false;
        config.scraper.urls.clear();
        let warnings = config_warnings(&config, &raw);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("session secret"));
    }

    #[test]
    fn test_config_check_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[server\nport = ").unwrap();
        assert!(cmd_config_check(file.path()).is_err());
        assert!(cmd_config_check(Path::new("/nonexistent/barometer.toml")).is_ok());
    }
}
