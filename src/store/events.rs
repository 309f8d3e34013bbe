use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::AcquisitionBlock;
use crate::domain::CurrentTouch;
use crate::domain::EmailValidationStatus;
use crate::domain::Event;
use crate::domain::EventStatus;
use crate::domain::EventType;
use crate::domain::PurchaseBlock;

/// Everything the intake path has gathered before the row exists.
pub struct NewEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub email: Option<String>,
    pub email_md5: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub ip: Option<String>,
    pub acquisition: AcquisitionBlock,
    pub current: CurrentTouch,
    pub purchase: Option<PurchaseBlock>,
    pub event_data: serde_json::Value,
}

/// Mirrors the `events` table column-for-column; the one place that has to
/// agree with `migrations/0001_init.sql`.
struct EventRow {
    id: i64,
    event_id: Uuid,
    event_type: String,
    email: Option<String>,
    email_md5: Option<String>,
    phone: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    ip: Option<String>,
    acq_source: Option<String>,
    acq_campaign: Option<String>,
    acq_term: Option<String>,
    acq_date: Option<DateTime<Utc>>,
    acq_form_title: Option<String>,
    cur_source: Option<String>,
    cur_medium: Option<String>,
    cur_campaign: Option<String>,
    cur_content: Option<String>,
    cur_term: Option<String>,
    cur_gclid: Option<String>,
    cur_ga_client_id: Option<String>,
    purchase_offer: Option<String>,
    purchase_publisher: Option<String>,
    purchase_amount: Option<f64>,
    purchase_traffic_source: Option<String>,
    purchase_attributes: serde_json::Value,
    email_validation_status: Option<String>,
    zb_last_active: Option<i32>,
    event_data: serde_json::Value,
    status: String,
    blocked_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_event(r: EventRow) -> Result<Event, anyhow::Error> {
    let event_type = EventType::from_str(&r.event_type).map_err(|e| anyhow::anyhow!(e))?;
    let has_purchase_block = matches!(event_type, EventType::Purchase);
    Ok(Event {
        id: r.id,
        event_id: r.event_id,
        event_type,
        email: r.email,
        email_md5: r.email_md5,
        phone: r.phone,
        first_name: r.first_name,
        last_name: r.last_name,
        ip: r.ip,
        acquisition: AcquisitionBlock {
            source: r.acq_source,
            campaign: r.acq_campaign,
            term: r.acq_term,
            date: r.acq_date,
            form_title: r.acq_form_title,
        },
        current: CurrentTouch {
            source: r.cur_source,
            medium: r.cur_medium,
            campaign: r.cur_campaign,
            content: r.cur_content,
            term: r.cur_term,
            gclid: r.cur_gclid,
            ga_client_id: r.cur_ga_client_id,
        },
        purchase: has_purchase_block.then(|| PurchaseBlock {
            offer: r.purchase_offer,
            publisher: r.purchase_publisher,
            amount: r.purchase_amount,
            traffic_source: r.purchase_traffic_source,
            attributes: r.purchase_attributes,
        }),
        email_validation_status: r.email_validation_status.as_deref().and_then(|s| EmailValidationStatus::from_str(s).ok()),
        zb_last_active: r.zb_last_active,
        event_data: r.event_data,
        status: EventStatus::from_str(&r.status).map_err(|e| anyhow::anyhow!(e))?,
        blocked_reason: r.blocked_reason,
        created_at: r.created_at,
        updated_at: r.updated_at,
    })
}

pub struct EventStore;

impl EventStore {
    #[tracing::instrument(skip_all, fields(event_id = %new_event.event_id))]
    pub async fn insert_pending(
        pool: &PgPool,
        new_event: &NewEvent,
    ) -> Result<Event, anyhow::Error> {
        let purchase_amount = new_event.purchase.as_ref().and_then(|p| p.amount);
        let purchase_offer = new_event.purchase.as_ref().and_then(|p| p.offer.clone());
        let purchase_publisher = new_event.purchase.as_ref().and_then(|p| p.publisher.clone());
        let purchase_traffic_source = new_event.purchase.as_ref().and_then(|p| p.traffic_source.clone());
        let purchase_attributes = new_event.purchase.as_ref().map(|p| p.attributes.clone()).unwrap_or(serde_json::json!({}));

        let row = sqlx::query_as!(
            EventRow,
            r#"
            INSERT INTO events (
                event_id, event_type, email, email_md5, phone, first_name, last_name, ip,
                acq_source, acq_campaign, acq_term, acq_date, acq_form_title,
                cur_source, cur_medium, cur_campaign, cur_content, cur_term, cur_gclid, cur_ga_client_id,
                purchase_offer, purchase_publisher, purchase_amount, purchase_traffic_source, purchase_attributes,
                event_data, status, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25,
                $26, 'pending', now(), now()
            )
            RETURNING *
            "#,
            new_event.event_id,
            new_event.event_type.to_string(),
            new_event.email,
            new_event.email_md5,
            new_event.phone,
            new_event.first_name,
            new_event.last_name,
            new_event.ip,
            new_event.acquisition.source,
            new_event.acquisition.campaign,
            new_event.acquisition.term,
            new_event.acquisition.date,
            new_event.acquisition.form_title,
            new_event.current.source,
            new_event.current.medium,
            new_event.current.campaign,
            new_event.current.content,
            new_event.current.term,
            new_event.current.gclid,
            new_event.current.ga_client_id,
            purchase_offer,
            purchase_publisher,
            purchase_amount,
            purchase_traffic_source,
            purchase_attributes,
            new_event.event_data,
        )
        .fetch_one(pool)
        .await?;

        row_to_event(row)
    }

    #[tracing::instrument(skip(pool))]
    pub async fn find_by_event_id(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<Option<Event>, anyhow::Error> {
        let row = sqlx::query_as!(EventRow, r#"SELECT * FROM events WHERE event_id = $1"#, event_id)
            .fetch_optional(pool)
            .await?;
        row.map(row_to_event).transpose()
    }

    #[tracing::instrument(skip(pool))]
    pub async fn find_by_id(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<Event>, anyhow::Error> {
        let row = sqlx::query_as!(EventRow, r#"SELECT * FROM events WHERE id = $1"#, id)
            .fetch_optional(pool)
            .await?;
        row.map(row_to_event).transpose()
    }

    /// Newest-first, used by the linker to find the most recent prior lead.
    #[tracing::instrument(skip(pool))]
    pub async fn list_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Vec<Event>, anyhow::Error> {
        let rows = sqlx::query_as!(EventRow, r#"SELECT * FROM events WHERE email = $1 ORDER BY created_at DESC"#, email)
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(row_to_event).collect()
    }

    #[tracing::instrument(skip(pool))]
    pub async fn mark_blocked(
        pool: &PgPool,
        event_id: Uuid,
        reason: &str,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"UPDATE events SET status = 'blocked', blocked_reason = $2, updated_at = now() WHERE event_id = $1"#,
            event_id,
            reason,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn set_status(
        pool: &PgPool,
        event_id: Uuid,
        status: EventStatus,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"UPDATE events SET status = $2, updated_at = now() WHERE event_id = $1"#,
            event_id,
            status.to_string(),
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Only called when the purchase's own acq_* fields were empty at
    /// intake — the linker never overwrites fields the submission set.
    #[tracing::instrument(skip(pool))]
    pub async fn copy_acquisition_from_lead(
        pool: &PgPool,
        event_id: Uuid,
        acquisition: &AcquisitionBlock,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"
            UPDATE events SET
                acq_source = $2, acq_campaign = $3, acq_term = $4,
                acq_date = $5, acq_form_title = $6, updated_at = now()
            WHERE event_id = $1
            "#,
            event_id,
            acquisition.source,
            acquisition.campaign,
            acquisition.term,
            acquisition.date,
            acquisition.form_title,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(pool))]
    pub async fn set_email_validation(
        pool: &PgPool,
        event_id: Uuid,
        status: EmailValidationStatus,
        zb_last_active: Option<i32>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"
            UPDATE events SET email_validation_status = $2, zb_last_active = $3, updated_at = now()
            WHERE event_id = $1
            "#,
            event_id,
            status.to_string(),
            zb_last_active,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(pool, patch))]
    pub async fn merge_event_data(
        pool: &PgPool,
        event_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        sqlx::query!(
            r#"UPDATE events SET event_data = event_data || $2, updated_at = now() WHERE event_id = $1"#,
            event_id,
            patch,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}
