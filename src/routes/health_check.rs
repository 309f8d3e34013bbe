use actix_web::web;
use actix_web::HttpResponse;
use serde_json::json;

use crate::startup::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    fn worst(self, other: Self) -> Self {
        use Status::*;
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

/// §7: queue backlog past which the check reports `degraded`.
const QUEUE_BACKLOG_WARNING: i64 = 10_000;

/// §7: failure-rate threshold (fraction of attempts in the trailing window)
/// past which the check reports `degraded`.
const ERROR_RATE_WARNING: f64 = 0.10;

#[tracing::instrument(skip_all)]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let (database_status, database_ok) = match sqlx::query!("SELECT 1 AS \"one!\"").fetch_one(&state.pool).await {
        Ok(_) => (Status::Healthy, true),
        Err(error) => {
            tracing::error!(%error, "health check: database query failed");
            (Status::Unhealthy, false)
        }
    };

    let queue_status = if !database_ok {
        Status::Unhealthy
    } else {
        match sqlx::query_scalar!(r#"SELECT count(*) AS "count!" FROM processing_queue WHERE status = 'pending'"#).fetch_one(&state.pool).await {
            Ok(pending) if pending > QUEUE_BACKLOG_WARNING => Status::Degraded,
            Ok(_) => Status::Healthy,
            Err(error) => {
                tracing::error!(%error, "health check: queue depth query failed");
                Status::Unhealthy
            }
        }
    };

    let platforms_status = if !database_ok {
        Status::Unhealthy
    } else {
        match sqlx::query_scalar!(r#"SELECT count(*) AS "count!" FROM platforms WHERE is_active"#).fetch_one(&state.pool).await {
            Ok(n) if n > 0 => Status::Healthy,
            Ok(_) => Status::Degraded,
            Err(error) => {
                tracing::error!(%error, "health check: platform count query failed");
                Status::Unhealthy
            }
        }
    };

    let disk_status = Status::Healthy;

    // §7: failure rate over the trailing 5 minutes, as a fraction of
    // attempts made in that window (not an absolute count).
    let error_rate_status = if !database_ok {
        Status::Unhealthy
    } else {
        match sqlx::query!(
            r#"
            SELECT
                count(*) FILTER (WHERE outcome = 'failure') AS "failures!",
                count(*) AS "total!"
            FROM processing_log
            WHERE created_at > now() - interval '5 minutes'
            "#,
        )
        .fetch_one(&state.pool)
        .await
        {
            Ok(row) if row.total > 0 && (row.failures as f64 / row.total as f64) >= ERROR_RATE_WARNING => Status::Degraded,
            Ok(_) => Status::Healthy,
            Err(error) => {
                tracing::error!(%error, "health check: error rate query failed");
                Status::Unhealthy
            }
        }
    };

    let overall = database_status.worst(queue_status).worst(platforms_status).worst(disk_status).worst(error_rate_status);

    let body = json!({
        "status": overall.as_str(),
        "checks": {
            "database": database_status.as_str(),
            "queue": queue_status.as_str(),
            "platforms": platforms_status.as_str(),
            "disk": disk_status.as_str(),
            "error_rate": error_rate_status.as_str(),
        },
        "metrics": {
            "queue_backlog_warning_threshold": QUEUE_BACKLOG_WARNING,
        },
    });

    match overall {
        Status::Unhealthy => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::Ok().json(body),
    }
}
