//! Durable work queue: lease-based dequeue safe across concurrently running
//! workers, exponential retry with a cap, and the stuck-lease/cleanup
//! maintenance passes a cron-style CLI drives.

use std::str::FromStr;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::JobStatus;
use crate::domain::QueueJob;

const DEFAULT_LEASE_SECONDS: i64 = 300;
const BACKOFF_BASE_MINUTES: i64 = 5;
const BACKOFF_CAP_MINUTES: i64 = 120;

struct JobRow {
    id: i64,
    event_id: Uuid,
    platform_id: i32,
    status: String,
    attempts: i32,
    max_retries: i32,
    process_after: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
    locked_by: Option<String>,
    response_code: Option<i32>,
    response_body: Option<String>,
    revenue_amount: Option<f64>,
    revenue_status: Option<String>,
    skip_reason: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

fn row_to_job(r: JobRow) -> Result<QueueJob, anyhow::Error> {
    Ok(QueueJob {
        id: r.id,
        event_id: r.event_id,
        platform_id: r.platform_id,
        status: JobStatus::from_str(&r.status).map_err(|e| anyhow::anyhow!(e))?,
        attempts: r.attempts,
        max_retries: r.max_retries,
        process_after: r.process_after,
        locked_until: r.locked_until,
        locked_by: r.locked_by,
        response_code: r.response_code,
        response_body: r.response_body,
        revenue_amount: r.revenue_amount,
        revenue_status: r.revenue_status,
        skip_reason: r.skip_reason,
        created_at: r.created_at,
        processed_at: r.processed_at,
    })
}

/// Exponential backoff per §4.4: `5 * 2^attempts` minutes, capped at 120.
fn backoff_delay(attempts: i32) -> Duration {
    let minutes = BACKOFF_BASE_MINUTES.saturating_mul(1_i64.checked_shl(attempts as u32).unwrap_or(i64::MAX));
    Duration::minutes(minutes.min(BACKOFF_CAP_MINUTES))
}

pub struct Queue;

impl Queue {
    #[tracing::instrument(skip(pool))]
    pub async fn enqueue(
        pool: &PgPool,
        event_id: Uuid,
        platform_id: i32,
        delay_seconds: i64,
        max_retries: i32,
    ) -> Result<i64, anyhow::Error> {
        let rec = sqlx::query!(
            r#"
            INSERT INTO processing_queue (event_id, platform_id, status, attempts, max_retries, process_after, created_at)
            VALUES ($1, $2, 'pending', 0, $3, now() + make_interval(secs => $4), now())
            RETURNING id
            "#,
            event_id,
            platform_id,
            max_retries,
            delay_seconds as f64,
        )
        .fetch_one(pool)
        .await?;
        Ok(rec.id)
    }

    /// Atomically claims up to `batch_size` ready jobs for `worker_id`.
    /// `FOR UPDATE SKIP LOCKED` plus a status-gated `UPDATE` in the same
    /// transaction is what makes concurrent workers safe (I1/I2).
    #[tracing::instrument(skip(pool))]
    pub async fn lease_batch(
        pool: &PgPool,
        worker_id: &str,
        batch_size: i64,
        lease_seconds: Option<i64>,
    ) -> Result<Vec<QueueJob>, anyhow::Error> {
        let lease_seconds = lease_seconds.unwrap_or(DEFAULT_LEASE_SECONDS);
        let mut tx = pool.begin().await?;

        let candidate_ids: Vec<i64> = sqlx::query_scalar!(
            r#"
            SELECT id FROM processing_queue
            WHERE status = 'pending'
              AND process_after <= now()
              AND (locked_until IS NULL OR locked_until < now())
            ORDER BY process_after ASC, id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
            batch_size,
        )
        .fetch_all(&mut *tx)
        .await?;

        if candidate_ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as!(
            JobRow,
            r#"
            UPDATE processing_queue
            SET status = 'processing', locked_by = $2, locked_until = now() + make_interval(secs => $3)
            WHERE id = ANY($1)
            RETURNING *
            "#,
            &candidate_ids,
            worker_id,
            lease_seconds as f64,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        rows.into_iter().map(row_to_job).collect()
    }

    #[tracing::instrument(skip(pool))]
    pub async fn release(
        pool: &PgPool,
        job_id: i64,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"UPDATE processing_queue SET status = 'pending', locked_by = NULL, locked_until = NULL WHERE id = $1"#,
            job_id,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Scopes every terminal-transition `UPDATE` by `locked_by`/`locked_until`
    /// as they stood when the caller leased `job`, so a stale in-flight call
    /// from a worker whose lease has since expired and been reaped (and
    /// possibly re-leased to someone else) cannot stomp the new holder's
    /// state: the `WHERE` simply matches zero rows and the call is a no-op.
    fn warn_if_lease_lost(
        job_id: i64,
        rows_affected: u64,
    ) {
        if rows_affected == 0 {
            tracing::warn!(job_id, "lease no longer held, terminal transition dropped");
        }
    }

    #[tracing::instrument(skip(pool, body))]
    pub async fn complete(
        pool: &PgPool,
        job: &QueueJob,
        code: Option<i32>,
        body: Option<&str>,
    ) -> Result<(), anyhow::Error> {
        let result = sqlx::query!(
            r#"
            UPDATE processing_queue
            SET status = 'completed', response_code = $2, response_body = $3,
                locked_by = NULL, locked_until = NULL, processed_at = now()
            WHERE id = $1 AND locked_by IS NOT DISTINCT FROM $4 AND locked_until IS NOT DISTINCT FROM $5
            "#,
            job.id,
            code,
            body,
            job.locked_by,
            job.locked_until,
        )
        .execute(pool)
        .await?;
        Self::warn_if_lease_lost(job.id, result.rows_affected());
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn fail(
        pool: &PgPool,
        job: &QueueJob,
        error: &str,
    ) -> Result<(), anyhow::Error> {
        let result = sqlx::query!(
            r#"
            UPDATE processing_queue
            SET status = 'failed', response_body = $2, locked_by = NULL, locked_until = NULL, processed_at = now()
            WHERE id = $1 AND locked_by IS NOT DISTINCT FROM $3 AND locked_until IS NOT DISTINCT FROM $4
            "#,
            job.id,
            error,
            job.locked_by,
            job.locked_until,
        )
        .execute(pool)
        .await?;
        Self::warn_if_lease_lost(job.id, result.rows_affected());
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn skip(
        pool: &PgPool,
        job: &QueueJob,
        reason: &str,
    ) -> Result<(), anyhow::Error> {
        let result = sqlx::query!(
            r#"
            UPDATE processing_queue
            SET status = 'skipped', skip_reason = $2, locked_by = NULL, locked_until = NULL, processed_at = now()
            WHERE id = $1 AND locked_by IS NOT DISTINCT FROM $3 AND locked_until IS NOT DISTINCT FROM $4
            "#,
            job.id,
            reason,
            job.locked_by,
            job.locked_until,
        )
        .execute(pool)
        .await?;
        Self::warn_if_lease_lost(job.id, result.rows_affected());
        Ok(())
    }

    /// Returns `false` once `attempts >= max_retries` without mutating
    /// anything, per §4.4's precondition.
    #[tracing::instrument(skip(pool))]
    pub async fn retry(
        pool: &PgPool,
        job: &QueueJob,
    ) -> Result<bool, anyhow::Error> {
        if job.attempts >= job.max_retries {
            return Ok(false);
        }
        let delay = backoff_delay(job.attempts);
        let result = sqlx::query!(
            r#"
            UPDATE processing_queue
            SET status = 'pending', attempts = attempts + 1, locked_by = NULL, locked_until = NULL,
                process_after = now() + $2
            WHERE id = $1 AND locked_by IS NOT DISTINCT FROM $3 AND locked_until IS NOT DISTINCT FROM $4
            "#,
            job.id,
            delay,
            job.locked_by,
            job.locked_until,
        )
        .execute(pool)
        .await?;
        Self::warn_if_lease_lost(job.id, result.rows_affected());
        Ok(true)
    }

    /// Transitions every still-pending job for this event to skipped. Used
    /// by the validation path when an email turns out to be undeliverable —
    /// racy by design (§5): already-leased or completed siblings are
    /// untouched.
    #[tracing::instrument(skip(pool))]
    pub async fn cancel_siblings(
        pool: &PgPool,
        event_id: Uuid,
        reason: &str,
    ) -> Result<u64, anyhow::Error> {
        let result = sqlx::query!(
            r#"
            UPDATE processing_queue
            SET status = 'skipped', skip_reason = $2, processed_at = now()
            WHERE event_id = $1 AND status = 'pending'
            "#,
            event_id,
            reason,
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn reap_stuck(
        pool: &PgPool,
        grace: Duration,
    ) -> Result<u64, anyhow::Error> {
        let result = sqlx::query!(
            r#"
            UPDATE processing_queue
            SET status = 'pending', locked_by = NULL, locked_until = NULL
            WHERE status = 'processing' AND locked_until < now() - $1::interval
            "#,
            grace,
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Operator-triggered: re-invokes retry semantics for terminal-failed
    /// jobs within `window` that haven't exhausted `max_retries`. `limit`
    /// caps how many jobs a single invocation touches.
    #[tracing::instrument(skip(pool))]
    pub async fn retry_failed(
        pool: &PgPool,
        window: Duration,
        platform_code: Option<&str>,
        limit: Option<usize>,
    ) -> Result<u64, anyhow::Error> {
        let rows = sqlx::query_as!(
            JobRow,
            r#"
            SELECT q.* FROM processing_queue q
            JOIN platforms p ON p.id = q.platform_id
            WHERE q.status = 'failed'
              AND q.attempts < q.max_retries
              AND q.processed_at > now() - $1::interval
              AND ($2::text IS NULL OR p.platform_code = $2)
            "#,
            window,
            platform_code,
        )
        .fetch_all(pool)
        .await?;

        let candidates: Vec<_> = match limit {
            Some(limit) => rows.into_iter().take(limit).collect(),
            None => rows,
        };

        let mut retried = 0;
        for row in candidates {
            let job = row_to_job(row)?;
            if Self::retry(pool, &job).await? {
                retried += 1;
            }
        }
        Ok(retried)
    }

    #[tracing::instrument(skip(pool))]
    pub async fn cleanup(
        pool: &PgPool,
        older_than: Duration,
    ) -> Result<u64, anyhow::Error> {
        let result = sqlx::query!(
            r#"
            DELETE FROM processing_queue
            WHERE status IN ('completed', 'failed', 'skipped')
              AND processed_at < now() - $1::interval
            "#,
            older_than,
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::minutes(5));
        assert_eq!(backoff_delay(1), Duration::minutes(10));
        assert_eq!(backoff_delay(2), Duration::minutes(20));
        assert_eq!(backoff_delay(10), Duration::minutes(BACKOFF_CAP_MINUTES));
    }
}
