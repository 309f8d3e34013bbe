use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use serde::Deserialize;
use sha2::Digest;
use sha2::Sha256;

use crate::startup::AppState;
use crate::utils::error_500;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_period")]
    period: String,
}

fn default_period() -> String { "24h".to_string() }

fn period_interval(period: &str) -> Option<&'static str> {
    match period {
        "1h" => Some("1 hour"),
        "24h" => Some("24 hours"),
        "7d" => Some("7 days"),
        "30d" => Some("30 days"),
        _ => None,
    }
}

fn hash_api_key(raw: &str) -> String { hex::encode(Sha256::digest(raw.as_bytes())) }

/// Returns the matching key's id, if any — also the row `log_access` records
/// against, so every call (authorized or not) leaves a trace in
/// `api_access_log`.
async fn authorized(
    req: &HttpRequest,
    state: &AppState,
) -> Result<Option<i64>, anyhow::Error> {
    let Some(key) = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let hashed = hash_api_key(key);
    let id = sqlx::query_scalar!(r#"SELECT id FROM api_keys WHERE key_hash = $1 AND is_active"#, hashed).fetch_optional(&state.pool).await?;
    Ok(id)
}

async fn log_access(
    pool: &sqlx::PgPool,
    api_key_id: Option<i64>,
    path: &str,
    status_code: i32,
) {
    if let Err(error) = sqlx::query!(
        r#"INSERT INTO api_access_log (api_key_id, path, status_code) VALUES ($1, $2, $3)"#,
        api_key_id,
        path,
        status_code,
    )
    .execute(pool)
    .await
    {
        tracing::warn!(%error, "failed to record api access log entry");
    }
}

#[tracing::instrument(skip_all)]
pub async fn stats(
    req: HttpRequest,
    query: web::Query<StatsQuery>,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let api_key_id = authorized(&req, &state).await.map_err(error_500)?;
    let Some(api_key_id) = api_key_id else {
        log_access(&state.pool, None, "/stats", 401).await;
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({"error": "missing or invalid API key"})));
    };

    let Some(interval) = period_interval(&query.period) else {
        log_access(&state.pool, Some(api_key_id), "/stats", 400).await;
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({"error": "period must be one of 1h, 24h, 7d, 30d"})));
    };

    let events = sqlx::query_scalar!(
        r#"SELECT count(*) AS "count!" FROM events WHERE created_at > now() - $1::interval"#,
        interval,
    )
    .fetch_one(&state.pool)
    .await
    .map_err(error_500)?;

    let completed_jobs = sqlx::query_scalar!(
        r#"SELECT count(*) AS "count!" FROM processing_queue WHERE status = 'completed' AND processed_at > now() - $1::interval"#,
        interval,
    )
    .fetch_one(&state.pool)
    .await
    .map_err(error_500)?;

    let failed_jobs = sqlx::query_scalar!(
        r#"SELECT count(*) AS "count!" FROM processing_queue WHERE status = 'failed' AND processed_at > now() - $1::interval"#,
        interval,
    )
    .fetch_one(&state.pool)
    .await
    .map_err(error_500)?;

    log_access(&state.pool, Some(api_key_id), "/stats", 200).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "period": query.period,
        "events": events,
        "jobs_completed": completed_jobs,
        "jobs_failed": failed_jobs,
    })))
}
