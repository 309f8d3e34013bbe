use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// One row per `executeJob` attempt, success or failure — the audit trail
/// behind `/stats` and behind debugging a stuck delivery.
pub struct NewLogEntry<'a> {
    pub job_id: i64,
    pub event_id: Uuid,
    pub platform_id: i32,
    pub attempt: i32,
    pub outcome: &'a str,
    pub response_code: Option<i32>,
    pub response_body: Option<&'a str>,
    pub error: Option<&'a str>,
}

pub struct ProcessingLogEntry {
    pub id: i64,
    pub job_id: i64,
    pub event_id: Uuid,
    pub platform_id: i32,
    pub attempt: i32,
    pub outcome: String,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct ProcessingLogStore;

impl ProcessingLogStore {
    #[tracing::instrument(skip_all, fields(job_id = entry.job_id, outcome = entry.outcome))]
    pub async fn record(
        pool: &PgPool,
        entry: NewLogEntry<'_>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"
            INSERT INTO processing_log
                (job_id, event_id, platform_id, attempt, outcome, response_code, response_body, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            "#,
            entry.job_id,
            entry.event_id,
            entry.platform_id,
            entry.attempt,
            entry.outcome,
            entry.response_code,
            entry.response_body,
            entry.error,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn for_job(
        pool: &PgPool,
        job_id: i64,
    ) -> Result<Vec<ProcessingLogEntry>, anyhow::Error> {
        let rows = sqlx::query_as!(
            ProcessingLogEntry,
            r#"SELECT * FROM processing_log WHERE job_id = $1 ORDER BY created_at ASC"#,
            job_id,
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
