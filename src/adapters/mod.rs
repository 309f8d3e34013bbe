//! Per-platform delivery contract. Adapters are pure with respect to the
//! `Event` they are given — no mutation — and talk to the outside world only
//! through `reqwest`, behind a shared retry-with-backoff wrapper.

mod analytics;
mod crm;
mod email_list;
mod monetization;
mod sms;
mod validation;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Event;
use crate::domain::PlatformDefinition;

pub use analytics::AnalyticsAdapter;
pub use crm::CrmAdapter;
pub use email_list::EmailListAdapter;
pub use monetization::MonetizationAdapter;
pub use sms::SmsAdapter;
pub use validation::ValidationAdapter;
pub use validation::ValidationData;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("missing required config key: {0}")]
    MissingConfig(&'static str),
    #[error("unknown platform code: {0}")]
    UnknownPlatform(String),
}

#[derive(Debug, Clone, Default)]
pub struct SendResult {
    pub success: bool,
    pub response_code: Option<i32>,
    pub platform_response: Option<String>,
    pub error: Option<String>,
    pub revenue: Option<f64>,
    pub validation_data: Option<ValidationData>,
    pub contact_id: Option<String>,
}

impl SendResult {
    fn transport_failure(error: impl std::fmt::Display) -> Self { Self { success: false, error: Some(error.to_string()), ..Default::default() } }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult;

    /// For logging only — never consumed by the state machine.
    fn map_fields(
        &self,
        event: &Event,
    ) -> HashMap<String, serde_json::Value>;

    fn validate_config(&self) -> Result<(), AdapterError>;

    async fn test_connection(&self) -> bool;
}

/// Shared config every concrete adapter is built from: the platform's flat
/// config with any nested `api_config` already merged in (§9).
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub platform_code: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub extra: serde_json::Value,
}

impl AdapterConfig {
    pub fn from_platform(platform: &PlatformDefinition) -> Self {
        let merged = platform.merged_config();
        Self {
            platform_code: platform.platform_code.clone(),
            base_url: merged.get("base_url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            api_key: merged.get("api_key").and_then(|v| v.as_str()).map(str::to_string),
            timeout: Duration::from_secs(platform.timeout_seconds.max(1) as u64),
            max_retries: platform.max_retries.max(0) as u32,
            retry_delay: Duration::from_secs(platform.retry_delay_seconds.max(1) as u64),
            extra: merged,
        }
    }

    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder().timeout(self.timeout).build().unwrap_or_else(|_| reqwest::Client::new())
    }
}

/// Internal retry-with-exponential-backoff budget for a single adapter's
/// network I/O (distinct from the Queue-level job retry). Transport errors
/// (the request never got a response) are retried; once a response comes
/// back — even an error status — the adapter stops retrying and reports a
/// protocol failure instead.
async fn send_with_retry<F, Fut>(
    config: &AdapterConfig,
    mut attempt: F,
) -> Result<reqwest::Response, SendResult>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut last_error = None;
    for n in 0..=config.max_retries {
        match attempt().await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_timeout() || error.is_connect() => {
                last_error = Some(error);
                let delay = config.retry_delay.mul_f64(2f64.powi(n as i32));
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(SendResult::transport_failure(error)),
        }
    }
    Err(SendResult::transport_failure(last_error.map(|e| e.to_string()).unwrap_or_else(|| "exhausted retries".to_string())))
}

pub struct AdapterFactory;

impl AdapterFactory {
    /// Merges nested `api_config` into the flat config, then constructs the
    /// adapter matching `platform.platform_code`.
    pub fn build(platform: &PlatformDefinition) -> Result<Box<dyn Adapter>, AdapterError> {
        let config = AdapterConfig::from_platform(platform);
        let adapter: Box<dyn Adapter> = match platform.platform_code.as_str() {
            "zerobounce" | "validation" => Box::new(ValidationAdapter::new(config)),
            "sms" | "twilio" => Box::new(SmsAdapter::new(config)),
            "monetization" | "revenue-network" => Box::new(MonetizationAdapter::new(config)),
            "analytics" | "segment" => Box::new(AnalyticsAdapter::new(config)),
            "email-list" | "mailchimp" => Box::new(EmailListAdapter::new(config)),
            _ if platform.platform_type == crate::domain::PlatformType::Crm => Box::new(CrmAdapter::new(config)),
            _ if platform.platform_type == crate::domain::PlatformType::Analytics => Box::new(AnalyticsAdapter::new(config)),
            _ if platform.platform_type == crate::domain::PlatformType::Sms => Box::new(SmsAdapter::new(config)),
            _ if platform.platform_type == crate::domain::PlatformType::Validation => Box::new(ValidationAdapter::new(config)),
            _ if platform.platform_type == crate::domain::PlatformType::Monetization => Box::new(MonetizationAdapter::new(config)),
            _ if platform.platform_type == crate::domain::PlatformType::Email => Box::new(EmailListAdapter::new(config)),
            other => return Err(AdapterError::UnknownPlatform(other.to_string())),
        };
        adapter.validate_config()?;
        Ok(adapter)
    }
}
