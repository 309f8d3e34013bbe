use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Canonical, and currently only, relationship type the linker produces.
pub const LEAD_TO_PURCHASE: &str = "lead_to_purchase";

pub struct EventRelationship {
    pub id: i64,
    pub parent_event_id: Uuid,
    pub child_event_id: Uuid,
    pub relationship_type: String,
    pub criteria: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub struct RelationshipStore;

impl RelationshipStore {
    /// Only the first matching lead is ever linked — callers are expected to
    /// have already picked that lead before calling this.
    #[tracing::instrument(skip(pool, criteria))]
    pub async fn link(
        pool: &PgPool,
        parent_event_id: Uuid,
        child_event_id: Uuid,
        relationship_type: &str,
        criteria: serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"
            INSERT INTO event_relationships (parent_event_id, child_event_id, relationship_type, criteria, created_at)
            VALUES ($1, $2, $3, $4, now())
            "#,
            parent_event_id,
            child_event_id,
            relationship_type,
            criteria,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn children_of(
        pool: &PgPool,
        parent_event_id: Uuid,
    ) -> Result<Vec<EventRelationship>, anyhow::Error> {
        let rows = sqlx::query_as!(
            EventRelationship,
            r#"SELECT * FROM event_relationships WHERE parent_event_id = $1 ORDER BY created_at ASC"#,
            parent_event_id,
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
