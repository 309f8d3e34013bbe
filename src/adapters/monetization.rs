use std::collections::HashMap;

use async_trait::async_trait;

use super::send_with_retry;
use super::Adapter;
use super::AdapterConfig;
use super::AdapterError;
use super::SendResult;
use crate::domain::Event;

const DEFAULT_REVENUE_PER_LEAD: f64 = 2.00;

pub struct MonetizationAdapter {
    config: AdapterConfig,
    revenue_per_lead: f64,
}

impl MonetizationAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        let revenue_per_lead = config.extra.get("revenue_per_lead").and_then(|v| v.as_f64()).unwrap_or(DEFAULT_REVENUE_PER_LEAD);
        Self { config, revenue_per_lead }
    }
}

#[async_trait]
impl Adapter for MonetizationAdapter {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult {
        let client = self.config.client();
        let url = format!("{}/coreg", self.config.base_url);
        let body = serde_json::json!(self.map_fields(event));

        let response = match send_with_retry(&self.config, || client.post(&url).json(&body).send()).await {
            Ok(response) => response,
            Err(failure) => return failure,
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let revenue = if text.trim() == "Success" { self.revenue_per_lead } else { 0.0 };

        SendResult { success: status.is_success(), response_code: Some(status.as_u16() as i32), platform_response: Some(text), revenue: Some(revenue), ..Default::default() }
    }

    fn map_fields(
        &self,
        event: &Event,
    ) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("email".to_string(), serde_json::json!(event.email)),
            ("ip".to_string(), serde_json::json!(event.ip)),
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
