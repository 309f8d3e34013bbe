use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevenueStatus {
    Pending,
    Confirmed,
    Paid,
    Rejected,
    Refunded,
}

impl fmt::Display for RevenueStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RevenueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("unknown revenue status: {other:?}")),
        }
    }
}

pub struct RevenueRecord {
    pub id: i64,
    pub event_id: Uuid,
    pub platform_id: i32,
    pub gross: f64,
    pub net: f64,
    pub currency: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct RevenueStore;

impl RevenueStore {
    #[tracing::instrument(skip(pool))]
    pub async fn record(
        pool: &PgPool,
        event_id: Uuid,
        platform_id: i32,
        gross: f64,
        net: f64,
        status: RevenueStatus,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"
            INSERT INTO revenue_tracking (event_id, platform_id, gross, net, currency, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'USD', $5, now(), now())
            "#,
            event_id,
            platform_id,
            gross,
            net,
            status.to_string(),
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn for_event(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<Vec<RevenueRecord>, anyhow::Error> {
        let rows = sqlx::query_as!(
            RevenueRecord,
            r#"SELECT * FROM revenue_tracking WHERE event_id = $1 ORDER BY created_at ASC"#,
            event_id,
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
