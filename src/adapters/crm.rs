use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::send_with_retry;
use super::Adapter;
use super::AdapterConfig;
use super::AdapterError;
use super::SendResult;
use crate::domain::Event;

#[derive(Debug, Deserialize)]
struct UpsertContactResponse {
    contact_id: String,
    #[serde(default)]
    existing: bool,
}

pub struct CrmAdapter {
    config: AdapterConfig,
}

impl CrmAdapter {
    pub fn new(config: AdapterConfig) -> Self { Self { config } }
}

#[async_trait]
impl Adapter for CrmAdapter {
    async fn send(
        &self,
        event: &Event,
    ) -> SendResult {
        let client = self.config.client();
        let url = format!("{}/contacts", self.config.base_url);
        let body = self.map_fields(event);

        let response = match send_with_retry(&self.config, || client.post(&url).json(&body).send()).await {
            Ok(response) => response,
            Err(failure) => return failure,
        };

        let status = response.status();
        let parsed: Result<UpsertContactResponse, _> = response.json().await;
        let Ok(parsed) = parsed else {
            return SendResult { success: false, response_code: Some(status.as_u16() as i32), error: Some("unparseable CRM response".to_string()), ..Default::default() };
        };

        if !status.is_success() {
            return SendResult { success: false, response_code: Some(status.as_u16() as i32), error: Some(format!("CRM returned {status}")), ..Default::default() };
        }

        // Existing contact: one additional call to bump its last-submission
        // timestamp. Reported as part of the same logical send (§4.5).
        if parsed.existing {
            let touch_url = format!("{}/contacts/{}/touch", self.config.base_url, parsed.contact_id);
            let _ = client.post(&touch_url).json(&serde_json::json!({"last_submission": event.created_at})).send().await;
        }

        SendResult { success: true, response_code: Some(status.as_u16() as i32), contact_id: Some(parsed.contact_id), ..Default::default() }
    }

    fn map_fields(
        &self,
        event: &Event,
    ) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("email".to_string(), serde_json::json!(event.email)),
            ("phone".to_string(), serde_json::json!(event.phone)),
            ("first_name".to_string(), serde_json::json!(event.first_name)),
            ("last_name".to_string(), serde_json::json!(event.last_name)),
            ("source".to_string(), serde_json::json!(event.acquisition.source)),
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

#[cfg(test)]
mod tests {
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;
    use crate::domain::AcquisitionBlock;
    use crate::domain::CurrentTouch;
    use crate::domain::EventStatus;
    use crate::domain::EventType;

    fn sample_event() -> Event {
        Event {
            id: 1,
            event_id: uuid::Uuid::new_v4(),
            event_type: EventType::Lead,
            email: Some("jane@example.com".to_string()),
            email_md5: None,
            phone: None,
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            ip: None,
            acquisition: AcquisitionBlock::default(),
            current: CurrentTouch::default(),
            purchase: None,
            email_validation_status: None,
            zb_last_active: None,
            event_data: serde_json::json!({}),
            status: EventStatus::Pending,
            blocked_reason: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn config_for(base_url: String) -> AdapterConfig {
        AdapterConfig {
            platform_code: "crm".to_string(),
            base_url,
            api_key: None,
            timeout: std::time::Duration::from_secs(5),
            max_retries: 0,
            retry_delay: std::time::Duration::from_millis(1),
            extra: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn new_contact_is_reported_as_a_successful_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"contact_id": "abc123", "existing": false})))
            .mount(&server)
            .await;

        let adapter = CrmAdapter::new(config_for(server.uri()));
        let result = adapter.send(&sample_event()).await;

        assert!(result.success);
        assert_eq!(result.contact_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn existing_contact_triggers_a_touch_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"contact_id": "abc123", "existing": true})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contacts/abc123/touch"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = CrmAdapter::new(config_for(server.uri()));
        let result = adapter.send(&sample_event()).await;

        assert!(result.success);
    }

    #[tokio::test]
    async fn non_2xx_response_is_a_protocol_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/contacts")).respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"contact_id": "x"}))).mount(&server).await;

        let adapter = CrmAdapter::new(config_for(server.uri()));
        let result = adapter.send(&sample_event()).await;

        assert!(!result.success);
        assert_eq!(result.response_code, Some(500));
    }
}
