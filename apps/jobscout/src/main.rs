mod config;
mod db;
mod errors;
mod freshness;
mod matching;
mod models;
mod routes;
mod scrape;
mod search;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use crate::config::{Config, StoreBackend};
use crate::db::{create_pool, ensure_schema};
use crate::freshness::{FreshnessConfig, FreshnessManager, FreshnessThresholds};
use crate::matching::{MatcherConfig, RelevanceMatcher, ScoringTable};
use crate::routes::build_router;
use crate::scrape::challenge::MarkerChallengeDetector;
use crate::scrape::extractor::{SelectorConfig, SelectorExtractor};
use crate::scrape::fetcher::HttpPageFetcher;
use crate::scrape::retry::{RetryPolicy, TokioSleeper};
use crate::scrape::{ListingScraper, SessionConfig};
use crate::search::{SearchConfig, SearchOrchestrator};
use crate::state::AppState;
use crate::store::{InMemoryJobStore, JobRepository, PgJobStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobscout v{}", env!("CARGO_PKG_VERSION"));

    // Job store
    let store: Arc<dyn JobRepository> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            info!("Using PostgreSQL job store");
            Arc::new(PgJobStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory job store; postings are lost on restart");
            Arc::new(InMemoryJobStore::new())
        }
    };

    // Scraper
    let base_url = Url::parse(&config.scrape_base_url)
        .with_context(|| format!("SCRAPE_BASE_URL '{}' is not a URL", config.scrape_base_url))?;
    let session_config = SessionConfig {
        page_retry: RetryPolicy::jittered(config.scrape_page_attempts.max(1)),
        challenge_attempts: config.scrape_challenge_attempts.max(1),
        challenge_wait: Duration::from_secs(config.scrape_challenge_wait_secs),
        max_pages: config.scrape_max_pages.max(1),
        page_size: config.scrape_page_size.max(1),
        budget: Duration::from_secs(config.scrape_session_budget_secs),
        fetch_descriptions: config.scrape_fetch_descriptions,
        ..SessionConfig::new(base_url)
    };
    let fetcher = HttpPageFetcher::new(&config.scrape_user_agent, Duration::from_secs(30))
        .context("Failed to build HTTP client")?;
    let extractor = SelectorExtractor::new(&SelectorConfig::default())
        .context("Invalid listing selectors")?;
    let scraper = ListingScraper::new(
        Arc::new(fetcher),
        Arc::new(MarkerChallengeDetector::default()),
        Arc::new(extractor),
        Arc::new(TokioSleeper),
        session_config,
    );
    info!("Listing scraper targets {}", config.scrape_base_url);

    // Matcher and orchestrator
    let table = ScoringTable {
        reputable_tokens: config.match_reputable_tokens.clone(),
        ..ScoringTable::default()
    };
    let matcher = RelevanceMatcher::new(
        store.clone(),
        table,
        MatcherConfig {
            limit: config.match_limit.max(1),
            ..MatcherConfig::default()
        },
    );
    let orchestrator = SearchOrchestrator::new(
        store.clone(),
        Arc::new(scraper),
        matcher,
        SearchConfig {
            concurrency: config.scrape_concurrency.max(1),
            default_location: config.search_default_location.clone(),
        },
    );

    // Freshness maintenance
    let freshness = FreshnessManager::new(
        store.clone(),
        FreshnessConfig {
            stale_after: chrono::Duration::days(config.freshness_stale_days),
            max_age: chrono::Duration::days(config.freshness_max_age_days),
            thresholds: FreshnessThresholds::default(),
            purge_max_fraction: config.purge_max_fraction,
            purge_interval: chrono::Duration::hours(config.purge_interval_hours),
        },
    );
    let every = Duration::from_secs(config.maintenance_interval_minutes.max(1) * 60);
    info!(
        "Freshness maintenance every {:?}; stale after {} days, purge after {} days",
        every,
        freshness.config().stale_after.num_days(),
        freshness.config().max_age.num_days()
    );
    tokio::spawn(freshness.clone().run_forever(every));

    // Build app state
    let state = AppState {
        store,
        orchestrator: Arc::new(orchestrator),
        freshness,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
