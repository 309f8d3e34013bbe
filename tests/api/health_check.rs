use crate::helpers::spawn_app;

#[tokio::test]
async fn health_check_reports_healthy_on_a_fresh_database() {
    let app = spawn_app().await;

    let resp = app.get_health().await;

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse body");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"], "healthy");
}
