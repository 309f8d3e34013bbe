//! Pre-persistence gate: honeypot and known-bot detection, cached email
//! deliverability, format and phone checks. Runs before an event is ever
//! written to the `events` table.

use std::collections::HashMap;

use chrono::Duration;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::CanonicalPhone;
use crate::domain::ContactEmail;
use crate::registries::bot_registry::SubmittedIdentifiers;
use crate::registries::BotRegistry;
use crate::registries::EmailValidationRegistry;

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Fields that must stay empty on a legitimate submission.
    pub honeypot_fields: Vec<String>,
    pub email_cache_ttl: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            honeypot_fields: vec!["zipcode".to_string(), "phonenumber".to_string()],
            email_cache_ttl: Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub is_bot: bool,
    pub bot_reason: Option<String>,
    pub email_valid: Option<bool>,
    pub email_validation_source: Option<&'static str>,
    pub needs_revalidation: bool,
    pub canonical_phone: Option<CanonicalPhone>,
    pub errors: Vec<String>,
}

impl ValidationVerdict {
    fn bot(reason: &str) -> Self {
        Self { valid: false, is_bot: true, bot_reason: Some(reason.to_string()), ..Default::default() }
    }
}

pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self { Self { config } }

    #[tracing::instrument(skip_all)]
    pub async fn validate(
        &self,
        pool: &PgPool,
        raw_fields: &HashMap<String, String>,
        email: Option<&str>,
        phone: Option<&str>,
        ip: Option<&str>,
    ) -> ValidationVerdict {
        let ids = SubmittedIdentifiers { email, phone, ip };

        // 1. Honeypot.
        let triggered: HashMap<&str, &str> = self
            .config
            .honeypot_fields
            .iter()
            .filter_map(|f| raw_fields.get(f).filter(|v| !v.is_empty()).map(|v| (f.as_str(), v.as_str())))
            .collect();

        if !triggered.is_empty() {
            if let Err(error) = BotRegistry::record_honeypot_hit(pool, &ids, &serde_json::json!(triggered)).await {
                tracing::warn!(%error, "failed to record honeypot hit, continuing to block the request anyway");
            }
            return ValidationVerdict::bot("honeypot_triggered");
        }

        // 2. Known-bot identifier check.
        match BotRegistry::is_known_bot(pool, &ids).await {
            Ok(true) => return ValidationVerdict::bot("known_bot"),
            Ok(false) => {}
            Err(error) => tracing::warn!(%error, "known-bot lookup failed, treating submission as not-a-bot"),
        }

        let mut verdict = ValidationVerdict { valid: true, ..Default::default() };

        // 3. Cached email validity.
        if let Some(email) = email {
            match EmailValidationRegistry::lookup(pool, email).await {
                Ok(Some(entry)) => {
                    let deliverable = entry.parsed_status().is_some_and(|s| s.is_deliverable());
                    verdict.email_valid = Some(deliverable);
                    verdict.email_validation_source = Some("cache");
                    verdict.needs_revalidation = entry.needs_revalidation(self.config.email_cache_ttl, Utc::now());
                    if !deliverable {
                        verdict.valid = false;
                        verdict.errors.push("Email address is invalid".to_string());
                    }
                }
                Ok(None) => {
                    verdict.needs_revalidation = true;
                }
                Err(error) => {
                    tracing::warn!(%error, "email validation cache lookup failed");
                    verdict.needs_revalidation = true;
                }
            }
        }

        // 4. Format validation.
        if let Some(email) = email {
            if ContactEmail::parse(email).is_err() {
                verdict.valid = false;
                verdict.email_valid = Some(false);
                verdict.errors.push(format!("Invalid email format: {email:?}"));
            }
        }

        // 5. Phone canonicalization — non-blocking.
        if let Some(phone) = phone.filter(|p| !p.is_empty()) {
            match CanonicalPhone::parse(phone) {
                Ok(canonical) => verdict.canonical_phone = Some(canonical),
                Err(error) => verdict.errors.push(error.to_string()),
            }
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> { pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }

    #[test]
    fn honeypot_fields_default_to_zipcode_and_phonenumber() {
        let config = ValidatorConfig::default();
        assert_eq!(config.honeypot_fields, vec!["zipcode", "phonenumber"]);
    }

    #[test]
    fn bot_verdict_is_invalid_with_reason() {
        let verdict = ValidationVerdict::bot("honeypot_triggered");
        assert!(!verdict.valid);
        assert!(verdict.is_bot);
        assert_eq!(verdict.bot_reason.as_deref(), Some("honeypot_triggered"));
    }

    #[test]
    fn empty_map_never_triggers_honeypot() {
        let empty = fields(&[]);
        let config = ValidatorConfig::default();
        let triggered = config.honeypot_fields.iter().any(|f| empty.get(f).filter(|v| !v.is_empty()).is_some());
        assert!(!triggered);
    }
}
