use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// §4.1: severity is promoted purely by attempt count.
    fn for_attempt_count(n: i32) -> Self {
        if n >= 10 {
            Self::High
        } else if n >= 5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Email,
    Phone,
    Ip,
}

impl std::fmt::Display for IdentifierType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ip => "ip",
        };
        write!(f, "{s}")
    }
}

pub struct BotEntry {
    pub id: i64,
    pub identifier_type: String,
    pub identifier_value: String,
    pub detection_method: String,
    pub honeypot_fields: serde_json::Value,
    pub attempt_count: i32,
    pub severity: String,
    pub associated_emails: serde_json::Value,
    pub associated_phones: serde_json::Value,
    pub associated_ips: serde_json::Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// What the submission looked like, for the known-bot cross-check and for
/// the associated-identifier set a honeypot hit grows.
pub struct SubmittedIdentifiers<'a> {
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub ip: Option<&'a str>,
}

pub struct BotRegistry;

impl BotRegistry {
    /// §4.1 step 2: true if any identifier is a primary key of a BotEntry or
    /// appears in one of its associated sets. Read-only, no side effects.
    #[tracing::instrument(skip_all)]
    pub async fn is_known_bot(
        pool: &PgPool,
        ids: &SubmittedIdentifiers<'_>,
    ) -> Result<bool, anyhow::Error> {
        let rows = sqlx::query!(
            r#"
            SELECT 1 AS "hit!"
            FROM bot_registry
            WHERE (identifier_type = 'email' AND identifier_value = $1)
               OR (identifier_type = 'phone' AND identifier_value = $2)
               OR (identifier_type = 'ip' AND identifier_value = $3)
               OR ($1 IS NOT NULL AND associated_emails ? $1)
               OR ($2 IS NOT NULL AND associated_phones ? $2)
               OR ($3 IS NOT NULL AND associated_ips ? $3)
            LIMIT 1
            "#,
            ids.email,
            ids.phone,
            ids.ip,
        )
        .fetch_optional(pool)
        .await?;
        Ok(rows.is_some())
    }

    /// §4.1 step 1 side effect: upsert keyed primarily by email, falling back
    /// to IP when no email was submitted. Best-effort — callers log and
    /// swallow failures rather than blocking the request on this.
    #[tracing::instrument(skip_all)]
    pub async fn record_honeypot_hit(
        pool: &PgPool,
        ids: &SubmittedIdentifiers<'_>,
        honeypot_fields: &serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        let (identifier_type, identifier_value) = match (ids.email, ids.ip) {
            (Some(email), _) => (IdentifierType::Email, email),
            (None, Some(ip)) => (IdentifierType::Ip, ip),
            (None, None) => return Ok(()),
        };

        let associated_emails = serde_json::json!(ids.email.map(|e| vec![e]).unwrap_or_default());
        let associated_phones = serde_json::json!(ids.phone.map(|p| vec![p]).unwrap_or_default());
        let associated_ips = serde_json::json!(ids.ip.map(|i| vec![i]).unwrap_or_default());

        let rec = sqlx::query!(
            r#"
            INSERT INTO bot_registry (
                identifier_type, identifier_value, detection_method, honeypot_fields,
                attempt_count, severity, associated_emails, associated_phones, associated_ips,
                first_seen, last_seen
            )
            VALUES ($1, $2, 'honeypot', $3, 1, 'low', $4, $5, $6, now(), now())
            ON CONFLICT (identifier_type, identifier_value) DO UPDATE SET
                honeypot_fields = bot_registry.honeypot_fields || $3,
                attempt_count = bot_registry.attempt_count + 1,
                associated_emails = bot_registry.associated_emails || $4,
                associated_phones = bot_registry.associated_phones || $5,
                associated_ips = bot_registry.associated_ips || $6,
                last_seen = now()
            RETURNING attempt_count
            "#,
            identifier_type.to_string(),
            identifier_value,
            honeypot_fields,
            associated_emails,
            associated_phones,
            associated_ips,
        )
        .fetch_one(pool)
        .await?;

        let severity = Severity::for_attempt_count(rec.attempt_count);
        sqlx::query!(
            r#"UPDATE bot_registry SET severity = $3 WHERE identifier_type = $1 AND identifier_value = $2"#,
            identifier_type.to_string(),
            identifier_value,
            severity.to_string(),
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}
