use std::str::FromStr;

use sqlx::PgPool;

use crate::domain::PlatformDefinition;
use crate::domain::PlatformType;

struct PlatformRow {
    id: i32,
    platform_code: String,
    display_name: String,
    platform_type: String,
    is_active: bool,
    api_config: serde_json::Value,
    max_retries: i32,
    retry_delay_seconds: i32,
    timeout_seconds: i32,
    requires_valid_email: bool,
    priority: i32,
}

fn row_to_platform(r: PlatformRow) -> Result<PlatformDefinition, anyhow::Error> {
    Ok(PlatformDefinition {
        id: r.id,
        platform_code: r.platform_code,
        display_name: r.display_name,
        platform_type: PlatformType::from_str(&r.platform_type).map_err(|e| anyhow::anyhow!(e))?,
        is_active: r.is_active,
        api_config: r.api_config,
        max_retries: r.max_retries,
        retry_delay_seconds: r.retry_delay_seconds,
        timeout_seconds: r.timeout_seconds,
        requires_valid_email: r.requires_valid_email,
        priority: r.priority,
    })
}

pub struct PlatformStore;

impl PlatformStore {
    #[tracing::instrument(skip(pool))]
    pub async fn list_active(pool: &PgPool) -> Result<Vec<PlatformDefinition>, anyhow::Error> {
        let rows = sqlx::query_as!(
            PlatformRow,
            r#"SELECT * FROM platforms WHERE is_active ORDER BY priority ASC"#,
        )
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(row_to_platform).collect()
    }
}

pub struct RoutingRuleRow {
    pub id: i32,
    pub event_type: String,
    pub platform_id: i32,
    pub conditions: serde_json::Value,
    pub priority: i32,
    pub is_active: bool,
}

pub struct RoutingRuleStore;

impl RoutingRuleStore {
    #[tracing::instrument(skip(pool))]
    pub async fn list_active(pool: &PgPool) -> Result<Vec<RoutingRuleRow>, anyhow::Error> {
        let rows = sqlx::query_as!(
            RoutingRuleRow,
            r#"SELECT * FROM routing_rules WHERE is_active ORDER BY priority ASC"#,
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
