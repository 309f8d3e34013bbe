use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::EmailValidationStatus;

/// Substatuses ZeroBounce (or an equivalent provider) reports that will never
/// change on revalidation — §3: "never revalidated".
const PERMANENT_INVALID_SUBSTATUSES: &[&str] = &["mailbox_not_found", "mailbox_invalid", "no_dns_entries"];

pub struct EmailValidationEntry {
    pub id: i64,
    pub email: String,
    pub status: String,
    pub substatus: Option<String>,
    pub raw_status: Option<String>,
    pub raw_substatus: Option<String>,
    pub active_in_days: Option<i32>,
    pub mx_found: Option<bool>,
    pub validation_count: i32,
    pub first_valid_at: Option<DateTime<Utc>>,
    pub first_invalid_at: Option<DateTime<Utc>>,
    pub last_validated_at: DateTime<Utc>,
    pub status_history: serde_json::Value,
}

impl EmailValidationEntry {
    pub fn parsed_status(&self) -> Option<EmailValidationStatus> { self.status.parse().ok() }

    pub fn is_permanent_invalid(&self) -> bool {
        self.substatus.as_deref().is_some_and(|s| PERMANENT_INVALID_SUBSTATUSES.contains(&s))
    }

    /// §4.1 step 3: stale and not permanently settled.
    pub fn needs_revalidation(
        &self,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        !self.is_permanent_invalid() && now - self.last_validated_at > ttl
    }
}

pub struct EmailValidationRegistry;

impl EmailValidationRegistry {
    #[tracing::instrument(skip(pool))]
    pub async fn lookup(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<EmailValidationEntry>, anyhow::Error> {
        let row = sqlx::query_as!(
            EmailValidationEntry,
            r#"SELECT * FROM email_validation_registry WHERE email = $1"#,
            email,
        )
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// §4.7.b step 4: upsert after a fresh validation-platform call.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(pool))]
    pub async fn upsert(
        pool: &PgPool,
        email: &str,
        status: EmailValidationStatus,
        substatus: Option<&str>,
        raw_status: Option<&str>,
        raw_substatus: Option<&str>,
        active_in_days: Option<i32>,
        mx_found: Option<bool>,
    ) -> Result<(), anyhow::Error> {
        let is_valid = status.is_deliverable();
        let existing = Self::lookup(pool, email).await?;
        let status_changed = existing.as_ref().is_some_and(|e| e.status != status.to_string());
        let history_entry = serde_json::json!({"status": status.to_string(), "at": Utc::now()});
        let status_history = match existing {
            Some(ref e) if status_changed => {
                let mut history = e.status_history.as_array().cloned().unwrap_or_default();
                history.push(history_entry);
                serde_json::Value::Array(history)
            }
            Some(ref e) => e.status_history.clone(),
            None => serde_json::Value::Array(vec![history_entry]),
        };

        sqlx::query!(
            r#"
            INSERT INTO email_validation_registry (
                email, status, substatus, raw_status, raw_substatus, active_in_days, mx_found,
                validation_count, first_valid_at, first_invalid_at, last_validated_at, status_history
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1,
                CASE WHEN $8 THEN now() ELSE NULL END,
                CASE WHEN $8 THEN NULL ELSE now() END,
                now(), $9)
            ON CONFLICT (email) DO UPDATE SET
                status = $2,
                substatus = $3,
                raw_status = $4,
                raw_substatus = $5,
                active_in_days = $6,
                mx_found = $7,
                validation_count = email_validation_registry.validation_count + 1,
                first_valid_at = COALESCE(email_validation_registry.first_valid_at, CASE WHEN $8 THEN now() ELSE NULL END),
                first_invalid_at = COALESCE(email_validation_registry.first_invalid_at, CASE WHEN $8 THEN NULL ELSE now() END),
                last_validated_at = now(),
                status_history = $9
            "#,
            email,
            status.to_string(),
            substatus,
            raw_status,
            raw_substatus,
            active_in_days,
            mx_found,
            is_valid,
            status_history,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}
