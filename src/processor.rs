//! Orchestrates both halves of the pipeline: intake (validate → persist →
//! link → route → enqueue) and job execution (adapter send → state
//! transition → post-effects).

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::AdapterFactory;
use crate::domain::fingerprint_email;
use crate::domain::AcquisitionBlock;
use crate::domain::CurrentTouch;
use crate::domain::EmailValidationStatus;
use crate::domain::EventStatus;
use crate::domain::EventType;
use crate::domain::PlatformDefinition;
use crate::domain::PurchaseBlock;
use crate::domain::QueueJob;
use crate::linker::Linker;
use crate::queue::Queue;
use crate::registries::EmailValidationRegistry;
use crate::router::Router;
use crate::store::EventStore;
use crate::store::NewEvent;
use crate::store::NewLogEntry;
use crate::store::ProcessingLogStore;
use crate::store::RevenueStatus;
use crate::store::RevenueStore;
use crate::validator::Validator;

/// What the HTTP layer collected before handing off to the Processor: every
/// submitted key, still raw strings, plus which endpoint it came in on.
pub struct RawSubmission {
    pub event_type: EventType,
    pub fields: HashMap<String, String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IntakeOutcome {
    Accepted { event_id: Uuid, queued_platforms: usize },
    Blocked { event_id: Uuid, reason: String },
}

fn first_non_empty<'a>(
    fields: &'a HashMap<String, String>,
    keys: &[&str],
) -> Option<&'a str> {
    keys.iter().find_map(|k| fields.get(*k)).map(String::as_str).filter(|s| !s.is_empty())
}

fn split_name(fields: &HashMap<String, String>) -> (Option<String>, Option<String>) {
    if let (Some(first), last) = (fields.get("first_name"), fields.get("last_name")) {
        return (Some(first.clone()), last.cloned());
    }
    match fields.get("name").map(|n| n.trim()).filter(|n| !n.is_empty()) {
        Some(name) => match name.split_once(' ') {
            Some((first, rest)) => (Some(first.to_string()), Some(rest.trim().to_string()).filter(|s| !s.is_empty())),
            None => (Some(name.to_string()), None),
        },
        None => (None, None),
    }
}

const RECOGNIZED_KEYS: &[&str] = &[
    "email", "phone", "name", "first_name", "last_name",
    "source", "campaign", "term", "date", "form_title",
    "cur_source", "cur_medium", "cur_campaign", "cur_content", "cur_term", "gclid", "ga_client_id",
    "offer", "publisher", "amount", "traffic_source",
    "zipcode", "phonenumber",
];

fn build_new_event(submission: &RawSubmission) -> NewEvent {
    let fields = &submission.fields;
    let email = first_non_empty(fields, &["email"]).map(str::to_string);
    let email_md5 = email.as_deref().map(fingerprint_email);
    let phone = first_non_empty(fields, &["phone"]).map(str::to_string);
    let (first_name, last_name) = split_name(fields);

    let acquisition = AcquisitionBlock {
        source: fields.get("source").cloned(),
        campaign: fields.get("campaign").cloned(),
        term: fields.get("term").cloned(),
        date: fields.get("date").and_then(|d| d.parse().ok()),
        form_title: fields.get("form_title").cloned(),
    };
    let current = CurrentTouch {
        source: fields.get("cur_source").cloned(),
        medium: fields.get("cur_medium").cloned(),
        campaign: fields.get("cur_campaign").cloned(),
        content: fields.get("cur_content").cloned(),
        term: fields.get("cur_term").cloned(),
        gclid: fields.get("gclid").cloned(),
        ga_client_id: fields.get("ga_client_id").cloned(),
    };

    let purchase = (submission.event_type == EventType::Purchase).then(|| {
        let mut attributes = serde_json::Map::new();
        for (k, v) in fields {
            if let Some(suffix) = k.strip_prefix("purchase_") {
                attributes.insert(suffix.to_string(), serde_json::json!(v));
            }
        }
        PurchaseBlock {
            offer: fields.get("offer").cloned(),
            publisher: fields.get("publisher").cloned(),
            amount: fields.get("amount").and_then(|a| a.parse().ok()),
            traffic_source: fields.get("traffic_source").cloned(),
            attributes: serde_json::Value::Object(attributes),
        }
    });

    let mut event_data = serde_json::Map::new();
    for (k, v) in fields {
        if !RECOGNIZED_KEYS.contains(&k.as_str()) && !k.starts_with("purchase_") {
            event_data.insert(k.clone(), serde_json::json!(v));
        }
    }

    NewEvent {
        event_id: Uuid::new_v4(),
        event_type: submission.event_type,
        email,
        email_md5,
        phone,
        first_name,
        last_name,
        ip: submission.ip.clone(),
        acquisition,
        current,
        purchase,
        event_data: serde_json::Value::Object(event_data),
    }
}

pub struct Processor;

impl Processor {
    #[tracing::instrument(skip_all)]
    pub async fn intake(
        pool: &PgPool,
        validator: &Validator,
        router: &Router,
        submission: RawSubmission,
    ) -> Result<IntakeOutcome, anyhow::Error> {
        let mut new_event = build_new_event(&submission);
        let email = new_event.email.clone();
        let phone = new_event.phone.clone();
        let ip = new_event.ip.clone();

        let verdict = validator.validate(pool, &submission.fields, email.as_deref(), phone.as_deref(), ip.as_deref()).await;

        // Store the canonical (digits-only, leading-1) form when the raw
        // phone parsed cleanly; otherwise keep what was submitted.
        if let Some(canonical) = &verdict.canonical_phone {
            new_event.phone = Some(canonical.to_string());
        }

        let event = EventStore::insert_pending(pool, &new_event).await?;

        if !verdict.valid {
            let reason = if verdict.is_bot {
                format!("bot_detected:{}", verdict.bot_reason.unwrap_or_default())
            } else {
                format!("validation_failed:{}", verdict.errors.join(","))
            };
            EventStore::mark_blocked(pool, event.event_id, &reason).await?;
            return Ok(IntakeOutcome::Blocked { event_id: event.event_id, reason });
        }

        if event.event_type == EventType::Purchase {
            Linker::link_purchase_to_lead(pool, &event).await;
        }

        let targets = router.get_routes_for_event(&event);
        let mut queued = 0usize;
        for platform in &targets {
            match Queue::enqueue(pool, event.event_id, platform.id, 0, platform.max_retries).await {
                Ok(_) => queued += 1,
                Err(error) => tracing::warn!(%error, platform_code = %platform.platform_code, "failed to enqueue fanout job, continuing with remaining targets"),
            }
        }

        if verdict.needs_revalidation && email.is_some() {
            if let Some(validation_platform) = router.get_validation_platform() {
                match Queue::enqueue(pool, event.event_id, validation_platform.id, 0, validation_platform.max_retries).await {
                    Ok(_) => queued += 1,
                    Err(error) => tracing::warn!(%error, "failed to enqueue validation job"),
                }
            }
        }

        Ok(IntakeOutcome::Accepted { event_id: event.event_id, queued_platforms: queued })
    }

    /// §4.7.a.
    fn should_skip(
        event: &crate::domain::Event,
        platform: &PlatformDefinition,
    ) -> Option<&'static str> {
        if platform.requires_valid_email && event.email_validation_status == Some(EmailValidationStatus::Invalid) {
            return Some("Platform conditions not met");
        }
        if platform.platform_type == crate::domain::PlatformType::Sms && !event.has_phone() {
            return Some("Platform conditions not met");
        }
        None
    }

    #[tracing::instrument(skip_all, fields(job_id = job.id, event_id = %job.event_id))]
    pub async fn execute_job(
        pool: &PgPool,
        router: &Router,
        job: &QueueJob,
        validation_daily_limit: i32,
    ) -> Result<(), anyhow::Error> {
        let event = EventStore::find_by_event_id(pool, job.event_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {} references missing event {}", job.id, job.event_id))?;
        let platform = router.get_platform_by_id(job.platform_id).ok_or_else(|| anyhow::anyhow!("job {} references unknown platform {}", job.id, job.platform_id))?;

        if platform.platform_type == crate::domain::PlatformType::Validation {
            return Self::execute_validation_job(pool, &event, platform, job, validation_daily_limit).await;
        }

        if let Some(reason) = Self::should_skip(&event, platform) {
            Queue::skip(pool, job, reason).await?;
            return Ok(());
        }

        let adapter = AdapterFactory::build(platform)?;
        let result = adapter.send(&event).await;

        ProcessingLogStore::record(pool, NewLogEntry {
            job_id: job.id,
            event_id: job.event_id,
            platform_id: job.platform_id,
            attempt: job.attempts,
            outcome: if result.success { "success" } else { "failure" },
            response_code: result.response_code,
            response_body: result.platform_response.as_deref(),
            error: result.error.as_deref(),
        }).await?;

        if result.success {
            Queue::complete(pool, job, result.response_code, result.platform_response.as_deref()).await?;
            if let Some(revenue) = result.revenue.filter(|r| *r > 0.0) {
                RevenueStore::record(pool, event.event_id, platform.id, revenue, revenue, RevenueStatus::Pending).await?;
            }
            Self::apply_post_response_updates(pool, &event, platform, &result).await?;
        } else if job.attempts >= job.max_retries {
            Queue::fail(pool, job, result.error.as_deref().unwrap_or("unknown adapter failure")).await?;
        } else {
            Queue::retry(pool, job).await?;
        }

        Ok(())
    }

    /// §4.7.b: the validation platform's outcome gates pending siblings.
    /// Also enforces the daily call budget (§9 open question: the source's
    /// in-process counter resets on restart, so this one lives in the Store
    /// and survives across worker processes).
    async fn execute_validation_job(
        pool: &PgPool,
        event: &crate::domain::Event,
        platform: &PlatformDefinition,
        job: &QueueJob,
        daily_limit: i32,
    ) -> Result<(), anyhow::Error> {
        let today = chrono::Utc::now().date_naive();
        let count = crate::store::ValidationLimitStore::increment_and_get(pool, &platform.platform_code, today).await?;
        if count > daily_limit {
            Queue::skip(pool, job, "validation_daily_limit_exceeded").await?;
            return Ok(());
        }

        let adapter = AdapterFactory::build(platform)?;
        let result = adapter.send(event).await;

        ProcessingLogStore::record(pool, NewLogEntry {
            job_id: job.id,
            event_id: job.event_id,
            platform_id: job.platform_id,
            attempt: job.attempts,
            outcome: if result.success { "success" } else { "failure" },
            response_code: result.response_code,
            response_body: result.platform_response.as_deref(),
            error: result.error.as_deref(),
        }).await?;

        if !result.success {
            if job.attempts >= job.max_retries {
                Queue::fail(pool, job, result.error.as_deref().unwrap_or("validation call failed")).await?;
            } else {
                Queue::retry(pool, job).await?;
            }
            return Ok(());
        }

        let Some(data) = result.validation_data else {
            Queue::fail(pool, job, "validation platform returned success with no verdict").await?;
            return Ok(());
        };

        let is_valid = data.status.is_deliverable();
        EventStore::set_email_validation(pool, event.event_id, data.status, data.active_in_days).await?;

        if let Some(email) = event.email.as_deref() {
            EmailValidationRegistry::upsert(pool, email, data.status, data.raw_substatus.as_deref(), Some(&data.raw_status), data.raw_substatus.as_deref(), data.active_in_days, data.mx_found).await?;
        }

        if !is_valid {
            Queue::cancel_siblings(pool, event.event_id, "email_invalid").await?;
        }

        Queue::complete(pool, job, result.response_code, result.platform_response.as_deref()).await?;
        Ok(())
    }

    /// §4.7.c: audit-only extension of `event_data`, no further behavior
    /// depends on it.
    async fn apply_post_response_updates(
        pool: &PgPool,
        event: &crate::domain::Event,
        platform: &PlatformDefinition,
        result: &crate::adapters::SendResult,
    ) -> Result<(), anyhow::Error> {
        if result.contact_id.is_none() {
            return Ok(());
        }
        let patch = serde_json::json!({
            format!("{}_contact_id", platform.platform_code): result.contact_id,
        });
        EventStore::merge_event_data(pool, event.event_id, patch).await
    }
}
