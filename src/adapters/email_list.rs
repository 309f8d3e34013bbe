use std::collections::HashMap;

use async_trait::async_trait;

use super::send_with_retry;
use super::Adapter;
use super::AdapterConfig;
use super::AdapterError;
use super::SendResult;
use crate::domain::Event;

/// Plain contact sync, no special behavior (§4.5).
pub struct EmailListAdapter {
    config: AdapterConfig,
}

impl EmailListAdapter {
    pub fn new(config: AdapterConfig) -> Self { Self { config } }
}

#[async_trait]
impl Adapter for EmailListAdapter {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult {
        let client = self.config.client();
        let url = format!("{}/lists/subscribe", self.config.base_url);
        let body = serde_json::json!(self.map_fields(event));

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
        HashMap::from([
            ("email".to_string(), serde_json::json!(event.email)),
            ("first_name".to_string(), serde_json::json!(event.first_name)),
            ("last_name".to_string(), serde_json::json!(event.last_name)),
        ])
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
