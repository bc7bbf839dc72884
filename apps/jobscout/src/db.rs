use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_postings (
    id               UUID PRIMARY KEY,
    canonical_url    TEXT NOT NULL UNIQUE,
    title            TEXT NOT NULL DEFAULT '',
    company          TEXT NOT NULL DEFAULT '',
    location         TEXT NOT NULL DEFAULT '',
    description      TEXT NOT NULL DEFAULT '',
    job_type         TEXT NOT NULL DEFAULT '',
    is_remote        BOOLEAN,
    industry         TEXT,
    source_term      TEXT NOT NULL DEFAULT '',
    source_location  TEXT NOT NULL DEFAULT '',
    posted_at        TIMESTAMPTZ,
    first_seen_at    TIMESTAMPTZ NOT NULL,
    last_seen_at     TIMESTAMPTZ NOT NULL,
    status           TEXT NOT NULL DEFAULT 'active',
    refresh_count    INTEGER NOT NULL DEFAULT 1,
    last_match_score INTEGER,
    CONSTRAINT job_postings_seen_order CHECK (last_seen_at >= first_seen_at),
    CONSTRAINT job_postings_refresh_count CHECK (refresh_count >= 1)
);

CREATE INDEX IF NOT EXISTS job_postings_last_seen_idx ON job_postings (last_seen_at DESC);
CREATE INDEX IF NOT EXISTS job_postings_status_idx ON job_postings (status);

CREATE TABLE IF NOT EXISTS store_metadata (
    key   TEXT PRIMARY KEY,
    value TIMESTAMPTZ NOT NULL
);
"#;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the job store tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    pool.execute(SCHEMA)
        .await
        .context("Failed to apply job store schema")?;
    info!("Job store schema ready");
    Ok(())
}
