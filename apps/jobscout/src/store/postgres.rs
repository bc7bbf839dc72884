use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{
    BatchUpsert, ClassifyCounts, JobQuery, JobRepository, PurgeReport, StoreError, UpsertResult,
};
use crate::freshness::PurgeGuard;
use crate::models::{JobPosting, JobStatus, NormalizedPosting};

const UPSERT_SQL: &str = r#"
    INSERT INTO job_postings
        (id, canonical_url, title, company, location, description, job_type,
         is_remote, industry, source_term, source_location, posted_at,
         first_seen_at, last_seen_at, status, refresh_count)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13, 'active', 1)
    ON CONFLICT (canonical_url) DO UPDATE SET
        last_seen_at  = GREATEST(job_postings.last_seen_at, EXCLUDED.last_seen_at),
        refresh_count = job_postings.refresh_count + 1,
        status        = 'active',
        description   = CASE WHEN job_postings.description = ''
                             THEN EXCLUDED.description
                             ELSE job_postings.description END,
        industry      = COALESCE(job_postings.industry, EXCLUDED.industry),
        posted_at     = COALESCE(job_postings.posted_at, EXCLUDED.posted_at)
    RETURNING *, (xmax = 0) AS inserted
"#;

const LAST_PURGE_KEY: &str = "last_purge_at";

#[derive(Debug, FromRow)]
struct JobPostingRow {
    id: Uuid,
    canonical_url: String,
    title: String,
    company: String,
    location: String,
    description: String,
    job_type: String,
    is_remote: Option<bool>,
    industry: Option<String>,
    source_term: String,
    source_location: String,
    posted_at: Option<DateTime<Utc>>,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    status: String,
    refresh_count: i32,
    last_match_score: Option<i32>,
}

impl From<JobPostingRow> for JobPosting {
    fn from(row: JobPostingRow) -> Self {
        JobPosting {
            id: row.id,
            canonical_url: row.canonical_url,
            title: row.title,
            company: row.company,
            location: row.location,
            description: row.description,
            job_type: row.job_type,
            is_remote: row.is_remote,
            industry: row.industry,
            source_term: row.source_term,
            source_location: row.source_location,
            posted_at: row.posted_at,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            status: JobStatus::from_db(&row.status),
            refresh_count: row.refresh_count,
            last_match_score: row.last_match_score,
        }
    }
}

#[derive(Debug, FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    job: JobPostingRow,
    inserted: bool,
}

impl From<UpsertRow> for UpsertResult {
    fn from(r: UpsertRow) -> Self {
        UpsertResult {
            posting: r.job.into(),
            created: r.inserted,
        }
    }
}

/// PostgreSQL-backed job store. Schema lives in `db::ensure_schema`.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn upsert_one<'e, E>(
    executor: E,
    posting: &NormalizedPosting,
    now: DateTime<Utc>,
) -> Result<UpsertResult, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query_as::<_, UpsertRow>(UPSERT_SQL)
        .bind(Uuid::new_v4())
        .bind(&posting.canonical_url)
        .bind(&posting.title)
        .bind(&posting.company)
        .bind(&posting.location)
        .bind(&posting.description)
        .bind(&posting.job_type)
        .bind(posting.is_remote)
        .bind(&posting.industry)
        .bind(&posting.source_term)
        .bind(&posting.source_location)
        .bind(posting.posted_at)
        .bind(now)
        .fetch_one(executor)
        .await?;
    Ok(row.into())
}

#[async_trait]
impl JobRepository for PgJobStore {
    async fn upsert(
        &self,
        posting: &NormalizedPosting,
        now: DateTime<Utc>,
    ) -> Result<UpsertResult, StoreError> {
        Ok(upsert_one(&self.pool, posting, now).await?)
    }

    async fn upsert_batch(
        &self,
        postings: &[NormalizedPosting],
        now: DateTime<Utc>,
    ) -> Result<BatchUpsert, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut batch = BatchUpsert::default();
        for posting in postings {
            let result = upsert_one(&mut *tx, posting, now).await?;
            if result.created {
                batch.created += 1;
            } else {
                batch.refreshed += 1;
            }
            batch.postings.push(result.posting);
        }
        tx.commit().await?;
        debug!(
            "Upserted batch: {} new, {} refreshed",
            batch.created, batch.refreshed
        );
        Ok(batch)
    }

    async fn query(&self, query: &JobQuery) -> Result<Vec<JobPosting>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM job_postings WHERE TRUE");

        if query.require_title_and_company {
            qb.push(" AND title <> '' AND company <> ''");
        }

        if !query.is_unfiltered() {
            qb.push(" AND (FALSE");
            for field in &query.fields {
                for term in &query.terms {
                    qb.push(" OR strpos(lower(coalesce(")
                        .push(field.column())
                        .push(", '')), ")
                        .push_bind(term.clone())
                        .push(") > 0");
                }
            }
            qb.push(")");
        }

        qb.push(" ORDER BY last_seen_at DESC, canonical_url ASC LIMIT ")
            .push_bind(query.limit.max(0));

        let rows = qb
            .build_query_as::<JobPostingRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(JobPosting::from).collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM job_postings")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_seen_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM job_postings WHERE last_seen_at < $1")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn count_seen_at_or_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM job_postings WHERE last_seen_at <= $1")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn classify(&self, stale_before: DateTime<Utc>) -> Result<ClassifyCounts, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE job_postings
            SET status = CASE WHEN last_seen_at < $1 THEN 'stale' ELSE 'active' END
            "#,
        )
        .bind(stale_before)
        .execute(&mut *tx)
        .await?;

        let (active, stale): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'active'),
                   COUNT(*) FILTER (WHERE status = 'stale')
            FROM job_postings
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(ClassifyCounts { active, stale })
    }

    async fn purge_seen_before(
        &self,
        cutoff: DateTime<Utc>,
        guard: PurgeGuard,
        now: DateTime<Utc>,
    ) -> Result<PurgeReport, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent upserts must not change the counts the guard decides on.
        sqlx::query("LOCK TABLE job_postings IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let (total, eligible): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE last_seen_at < $1) FROM job_postings",
        )
        .bind(cutoff)
        .fetch_one(&mut *tx)
        .await?;

        if !guard.allows(total, eligible) {
            tx.rollback().await?;
            return Ok(PurgeReport {
                total,
                eligible,
                deleted: 0,
                refused: true,
                forced: guard.force,
                purged_at: None,
            });
        }

        let deleted = sqlx::query("DELETE FROM job_postings WHERE last_seen_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected() as i64;

        sqlx::query(
            r#"
            INSERT INTO store_metadata (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(LAST_PURGE_KEY)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PurgeReport {
            total,
            eligible,
            deleted,
            refused: false,
            forced: guard.force,
            purged_at: Some(now),
        })
    }

    async fn last_purge_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT value FROM store_metadata WHERE key = $1")
                .bind(LAST_PURGE_KEY)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn record_scores(&self, scores: &[(String, i32)]) -> Result<(), StoreError> {
        if scores.is_empty() {
            return Ok(());
        }
        let (urls, values): (Vec<String>, Vec<i32>) = scores.iter().cloned().unzip();
        sqlx::query(
            r#"
            UPDATE job_postings AS j
            SET last_match_score = s.score
            FROM UNNEST($1::text[], $2::int4[]) AS s(url, score)
            WHERE j.canonical_url = s.url
            "#,
        )
        .bind(&urls)
        .bind(&values)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> JobPostingRow {
        let seen = Utc::now();
        JobPostingRow {
            id: Uuid::new_v4(),
            canonical_url: "https://dk.indeed.com/viewjob?jk=1".to_string(),
            title: "Data Analyst".to_string(),
            company: String::new(),
            location: "Aarhus".to_string(),
            description: String::new(),
            job_type: "fulltime".to_string(),
            is_remote: None,
            industry: None,
            source_term: "data analyst".to_string(),
            source_location: "aarhus, denmark".to_string(),
            posted_at: None,
            first_seen_at: seen,
            last_seen_at: seen,
            status: status.to_string(),
            refresh_count: 2,
            last_match_score: Some(71),
        }
    }

    #[test]
    fn test_upsert_row_converts_flattened_posting() {
        let result: UpsertResult = UpsertRow {
            job: row("stale"),
            inserted: false,
        }
        .into();
        assert!(!result.created);
        assert_eq!(result.posting.status, JobStatus::Stale);
        assert_eq!(result.posting.refresh_count, 2);
        assert_eq!(result.posting.last_match_score, Some(71));
    }
}
