use std::collections::HashMap;

use async_trait::async_trait;

use super::send_with_retry;
use super::Adapter;
use super::AdapterConfig;
use super::AdapterError;
use super::SendResult;
use crate::domain::CanonicalPhone;
use crate::domain::Event;

pub struct SmsAdapter {
    config: AdapterConfig,
}

impl SmsAdapter {
    pub fn new(config: AdapterConfig) -> Self { Self { config } }
}

#[async_trait]
impl Adapter for SmsAdapter {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult {
        let Some(phone) = event.phone.as_deref() else {
            return SendResult { success: false, error: Some("Invalid or missing phone number".to_string()), ..Default::default() };
        };
        let Ok(canonical) = CanonicalPhone::parse(phone) else {
            return SendResult { success: false, error: Some("Invalid or missing phone number".to_string()), ..Default::default() };
        };
        if !canonical.is_mobile_length() {
            return SendResult { success: false, error: Some("Invalid or missing phone number".to_string()), ..Default::default() };
        }

        let client = self.config.client();
        let url = format!("{}/sms/opt-in", self.config.base_url);
        let body = serde_json::json!({"phone": canonical.to_string(), "source": event.current.source});

        let response = match send_with_retry(&self.config, || client.post(&url).json(&body).send()).await {
            Ok(response) => response,
            Err(failure) => return failure,
        };

        let status = response.status();
        SendResult { success: status.is_success(), response_code: Some(status.as_u16() as i32), ..Default::default() }
    }

    fn map_fields(
        &self,
        event: &Event,
    ) -> HashMap<String, serde_json::Value> {
        HashMap::from([("phone".to_string(), serde_json::json!(event.phone))])
    }

    fn validate_config(&self) -> Result<(), AdapterError> {
        if self.config.base_url.is_empty() {
            return Err(AdapterError::MissingConfig("base_url"));
        }
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        let client = self.config.client();
        client.get(format!("{}/ping", self.config.base_url)).send().await.is_ok_and(|r| r.status().is_success())
    }
}
