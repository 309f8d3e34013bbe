//! Cross-event relationship linking: carries first-touch attribution from a
//! prior lead forward onto a purchase sharing the same email.

use sqlx::PgPool;

use crate::domain::Event;
use crate::domain::EventType;
use crate::store::EventStore;
use crate::store::RelationshipStore;
use crate::store::LEAD_TO_PURCHASE;

pub struct Linker;

impl Linker {
    /// Triggered only for purchase events with a non-empty email. Failures
    /// are logged and swallowed — linking must never block fanout.
    #[tracing::instrument(skip_all, fields(event_id = %purchase.event_id))]
    pub async fn link_purchase_to_lead(
        pool: &PgPool,
        purchase: &Event,
    ) {
        if purchase.event_type != EventType::Purchase {
            return;
        }
        let Some(email) = purchase.email.as_deref() else {
            return;
        };

        if let Err(error) = Self::try_link(pool, purchase, email).await {
            tracing::warn!(%error, "purchase-to-lead linking failed, continuing without it");
        }
    }

    async fn try_link(
        pool: &PgPool,
        purchase: &Event,
        email: &str,
    ) -> Result<(), anyhow::Error> {
        let candidates = EventStore::list_by_email(pool, email).await?;
        let Some(lead) = candidates.into_iter().find(|e| e.event_type == EventType::Lead && e.id != purchase.id) else {
            return Ok(());
        };

        if purchase.acquisition.is_empty() {
            EventStore::copy_acquisition_from_lead(pool, purchase.event_id, &lead.acquisition).await?;
        }

        let criteria = serde_json::json!({
            "email": true,
            "ip": lead.ip.is_some() && lead.ip == purchase.ip,
        });
        RelationshipStore::link(pool, lead.event_id, purchase.event_id, LEAD_TO_PURCHASE, criteria).await?;

        Ok(())
    }
}
