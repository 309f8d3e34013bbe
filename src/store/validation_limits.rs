use chrono::NaiveDate;
use sqlx::PgPool;

/// Daily per-platform call counter for rate-limited validation platforms
/// (e.g. ZeroBounce). Persisted rather than process-local, so the limit
/// holds across worker restarts and multiple worker processes.
pub struct ValidationLimitStore;

impl ValidationLimitStore {
    /// Atomically bumps today's counter for `platform_code` and returns the
    /// count *after* the increment, so the caller can compare against its
    /// configured daily limit in one round trip.
    #[tracing::instrument(skip(pool))]
    pub async fn increment_and_get(
        pool: &PgPool,
        platform_code: &str,
        day: NaiveDate,
    ) -> Result<i32, anyhow::Error> {
        let rec = sqlx::query!(
            r#"
            INSERT INTO validation_daily_counters (platform_code, day, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (platform_code, day)
            DO UPDATE SET count = validation_daily_counters.count + 1
            RETURNING count
            "#,
            platform_code,
            day,
        )
        .fetch_one(pool)
        .await?;
        Ok(rec.count)
    }

    #[tracing::instrument(skip(pool))]
    pub async fn current_count(
        pool: &PgPool,
        platform_code: &str,
        day: NaiveDate,
    ) -> Result<i32, anyhow::Error> {
        let rec = sqlx::query!(
            r#"SELECT count FROM validation_daily_counters WHERE platform_code = $1 AND day = $2"#,
            platform_code,
            day,
        )
        .fetch_optional(pool)
        .await?;
        Ok(rec.map(|r| r.count).unwrap_or(0))
    }
}
