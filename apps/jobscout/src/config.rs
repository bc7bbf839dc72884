use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which `JobRepository` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,

    pub scrape_base_url: String,
    pub scrape_user_agent: String,
    pub scrape_page_attempts: u32,
    pub scrape_challenge_attempts: u32,
    pub scrape_challenge_wait_secs: u64,
    pub scrape_max_pages: u32,
    pub scrape_page_size: u32,
    pub scrape_session_budget_secs: u64,
    pub scrape_concurrency: usize,
    pub scrape_fetch_descriptions: bool,

    pub freshness_stale_days: i64,
    pub freshness_max_age_days: i64,
    pub purge_max_fraction: f64,
    pub purge_interval_hours: i64,
    pub maintenance_interval_minutes: u64,

    pub match_limit: usize,
    pub match_reputable_tokens: Vec<String>,
    pub search_default_location: String,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend = match env_or("JOB_STORE", "postgres").to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("JOB_STORE must be 'postgres' or 'memory', got '{other}'"),
        };
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => std::env::var("DATABASE_URL").ok(),
        };

        let purge_max_fraction: f64 = parse_env("PURGE_MAX_FRACTION", 0.5)?;
        if !(0.0..=1.0).contains(&purge_max_fraction) {
            bail!("PURGE_MAX_FRACTION must be between 0 and 1");
        }

        Ok(Config {
            store_backend,
            database_url,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),

            scrape_base_url: env_or("SCRAPE_BASE_URL", "https://dk.indeed.com"),
            scrape_user_agent: env_or("SCRAPE_USER_AGENT", DEFAULT_USER_AGENT),
            scrape_page_attempts: parse_env("SCRAPE_PAGE_ATTEMPTS", 3)?,
            scrape_challenge_attempts: parse_env("SCRAPE_CHALLENGE_ATTEMPTS", 3)?,
            scrape_challenge_wait_secs: parse_env("SCRAPE_CHALLENGE_WAIT_SECS", 25)?,
            scrape_max_pages: parse_env("SCRAPE_MAX_PAGES", 3)?,
            scrape_page_size: parse_env("SCRAPE_PAGE_SIZE", 10)?,
            scrape_session_budget_secs: parse_env("SCRAPE_SESSION_BUDGET_SECS", 120)?,
            scrape_concurrency: parse_env("SCRAPE_CONCURRENCY", 2)?,
            scrape_fetch_descriptions: parse_env("SCRAPE_FETCH_DESCRIPTIONS", false)?,

            freshness_stale_days: parse_env("FRESHNESS_STALE_DAYS", 21)?,
            freshness_max_age_days: parse_env("FRESHNESS_MAX_AGE_DAYS", 30)?,
            purge_max_fraction,
            purge_interval_hours: parse_env("PURGE_INTERVAL_HOURS", 168)?,
            maintenance_interval_minutes: parse_env("MAINTENANCE_INTERVAL_MINUTES", 60)?,

            match_limit: parse_env("MATCH_LIMIT", 50)?,
            match_reputable_tokens: env_or(
                "MATCH_REPUTABLE_TOKENS",
                "group,international,holding,a/s,corporation",
            )
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
            search_default_location: env_or("SEARCH_DEFAULT_LOCATION", "copenhagen, denmark"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
