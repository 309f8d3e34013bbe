use crate::helpers::spawn_app;

#[tokio::test]
async fn stats_without_an_api_key_is_rejected() {
    let app = spawn_app().await;

    let resp = reqwest::Client::new().get(format!("{}/stats", app.addr)).send().await.expect("execute request");

    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn stats_with_a_valid_key_reports_event_counts() {
    let app = spawn_app().await;
    app.insert_api_key("test-key-123").await;
    let platform_id = app.insert_platform("crm", "crm", "http://example.invalid", false).await;
    app.insert_routing_rule("lead", platform_id).await;

    app.post_lead("email=jane%40example.com").await;

    let resp = app.get_stats("test-key-123").await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.expect("parse body");
    assert_eq!(body["period"], "24h");
    assert_eq!(body["events"], 1);
}

#[tokio::test]
async fn stats_rejects_an_unknown_period() {
    let app = spawn_app().await;
    app.insert_api_key("test-key-456").await;

    let resp = reqwest::Client::new()
        .get(format!("{}/stats?period=3d", app.addr))
        .header("X-API-Key", "test-key-456")
        .send()
        .await
        .expect("execute request");

    assert_eq!(resp.status().as_u16(), 400);
}
