use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::send_with_retry;
use super::Adapter;
use super::AdapterConfig;
use super::AdapterError;
use super::SendResult;
use crate::domain::EmailValidationStatus;
use crate::domain::Event;

#[derive(Debug, Clone)]
pub struct ValidationData {
    pub status: EmailValidationStatus,
    pub raw_status: String,
    pub raw_substatus: Option<String>,
    pub active_in_days: Option<i32>,
    pub mx_found: Option<bool>,
}

/// Canonical validation-platform verdict mapping, §6.
fn map_status(raw: &str) -> EmailValidationStatus {
    match raw {
        "valid" => EmailValidationStatus::Valid,
        "invalid" | "spamtrap" | "abuse" | "do_not_mail" | "toxic" => EmailValidationStatus::Invalid,
        "catch-all" => EmailValidationStatus::CatchAll,
        "role" => EmailValidationStatus::Role,
        "disposable" => EmailValidationStatus::Disposable,
        _ => EmailValidationStatus::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct RawValidationResponse {
    status: String,
    #[serde(default)]
    sub_status: Option<String>,
    #[serde(default)]
    active_in_days: Option<i32>,
    #[serde(default)]
    mx_found: Option<bool>,
}

pub struct ValidationAdapter {
    config: AdapterConfig,
}

impl ValidationAdapter {
    pub fn new(config: AdapterConfig) -> Self { Self { config } }
}

#[async_trait]
impl Adapter for ValidationAdapter {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult {
        let Some(email) = event.email.as_deref() else {
            return SendResult { success: false, error: Some("no email to validate".to_string()), ..Default::default() };
        };

        let client = self.config.client();
        let url = format!("{}/validate", self.config.base_url);
        let query = [("email", email), ("api_key", self.config.api_key.as_deref().unwrap_or_default())];

        let response = match send_with_retry(&self.config, || client.get(&url).query(&query).send()).await {
            Ok(response) => response,
            Err(failure) => return failure,
        };

        let status = response.status();
        let parsed: Result<RawValidationResponse, _> = response.json().await;
        let Ok(parsed) = parsed else {
            return SendResult { success: false, response_code: Some(status.as_u16() as i32), error: Some("unparseable validation response".to_string()), ..Default::default() };
        };

        SendResult {
            success: true,
            response_code: Some(status.as_u16() as i32),
            validation_data: Some(ValidationData {
                status: map_status(&parsed.status),
                raw_status: parsed.status,
                raw_substatus: parsed.sub_status,
                active_in_days: parsed.active_in_days,
                mx_found: parsed.mx_found,
            }),
            ..Default::default()
        }
    }

    fn map_fields(
        &self,
        event: &Event,
    ) -> HashMap<String, serde_json::Value> {
        HashMap::from([("email".to_string(), serde_json::json!(event.email))])
    }

    fn validate_config(&self) -> Result<(), AdapterError> {
        if self.config.api_key.is_none() {
            return Err(AdapterError::MissingConfig("api_key"));
        }
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        let client = self.config.client();
        client.get(format!("{}/ping", self.config.base_url)).send().await.is_ok_and(|r| r.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_bad_substatuses_to_invalid() {
        for raw in ["invalid", "spamtrap", "abuse", "do_not_mail", "toxic"] {
            assert_eq!(map_status(raw), EmailValidationStatus::Invalid, "{raw} should map to invalid");
        }
    }

    #[test]
    fn unrecognized_status_is_unknown() {
        assert_eq!(map_status("something_new"), EmailValidationStatus::Unknown);
    }

    #[test]
    fn maps_the_rest_one_to_one() {
        assert_eq!(map_status("valid"), EmailValidationStatus::Valid);
        assert_eq!(map_status("catch-all"), EmailValidationStatus::CatchAll);
        assert_eq!(map_status("role"), EmailValidationStatus::Role);
        assert_eq!(map_status("disposable"), EmailValidationStatus::Disposable);
    }
}
