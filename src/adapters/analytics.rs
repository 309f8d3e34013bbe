use std::collections::HashMap;

use async_trait::async_trait;

use super::send_with_retry;
use super::Adapter;
use super::AdapterConfig;
use super::AdapterError;
use super::SendResult;
use crate::domain::Event;

pub struct AnalyticsAdapter {
    config: AdapterConfig,
}

impl AnalyticsAdapter {
    pub fn new(config: AdapterConfig) -> Self { Self { config } }

    async fn fire(
        &self,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SendResult> {
        let client = self.config.client();
        let url = format!("{}/track", self.config.base_url);
        let response = send_with_retry(&self.config, || client.post(&url).json(&serde_json::json!({"event": event_name, "properties": payload})).send()).await?;
        if !response.status().is_success() {
            return Err(SendResult { success: false, response_code: Some(response.status().as_u16() as i32), error: Some(format!("analytics event {event_name:?} rejected")), ..Default::default() });
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for AnalyticsAdapter {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult {
        let payload = serde_json::json!(self.map_fields(event));

        // Mandatory: identify + primary event.
        if let Err(failure) = self.fire("identify", &payload).await {
            return failure;
        }
        if let Err(failure) = self.fire("lead_submitted", &payload).await {
            return failure;
        }

        // Best-effort sub-events.
        if event.has_phone() {
            let _ = self.fire("sms_eligible", &payload).await;
        }
        if event.event_data.get("co_brand").is_some() {
            let _ = self.fire("co_branding", &payload).await;
        }

        SendResult { success: true, response_code: Some(200), ..Default::default() }
    }

    fn map_fields(
        &self,
        event: &Event,
    ) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("event_id".to_string(), serde_json::json!(event.event_id)),
            ("email_domain".to_string(), serde_json::json!(event.email_domain())),
            ("source".to_string(), serde_json::json!(event.current.source)),
            ("medium".to_string(), serde_json::json!(event.current.medium)),
            ("campaign".to_string(), serde_json::json!(event.current.campaign)),
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
