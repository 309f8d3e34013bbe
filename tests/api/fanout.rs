//! Job-execution scenarios from spec.md §8: the validation path's sibling
//! cancellation, and adapter failure leading to a queued retry.

use unified_events::processor::Processor;
use unified_events::queue::Queue;
use unified_events::router::Router;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_app;

#[tokio::test]
async fn invalid_validation_result_cancels_pending_siblings() {
    let app = spawn_app().await;

    let validation_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "invalid", "sub_status": "mailbox_not_found"})))
        .mount(&validation_server)
        .await;

    let validation_platform_id = app.insert_platform("zerobounce", "validation", &validation_server.uri(), false).await;
    let crm_platform_id = app.insert_platform("crm", "crm", "http://example.invalid", true).await;
    app.insert_routing_rule("lead", crm_platform_id).await;

    let resp = app.post_lead("email=jane%40example.com&first_name=Jane").await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.expect("parse body");
    // No cached validation entry yet, so both the routed CRM job and the
    // priority validation job get enqueued.
    assert_eq!(body["queued_platforms"], 2);

    let router = Router::load(&app.pool).await.expect("load router");
    let jobs = Queue::lease_batch(&app.pool, "test-worker", 10, Some(60)).await.expect("lease batch");
    assert_eq!(jobs.len(), 2);

    let validation_job = jobs.iter().find(|j| j.platform_id == validation_platform_id).expect("validation job present");
    let crm_job = jobs.iter().find(|j| j.platform_id == crm_platform_id).expect("crm job present");

    Processor::execute_job(&app.pool, &router, validation_job, 10_000).await.expect("execute validation job");

    let crm_status: String = sqlx::query_scalar!(r#"SELECT status FROM processing_queue WHERE id = $1"#, crm_job.id).fetch_one(&app.pool).await.expect("fetch crm job");
    assert_eq!(crm_status, "skipped");
    let crm_skip_reason: Option<String> = sqlx::query_scalar!(r#"SELECT skip_reason FROM processing_queue WHERE id = $1"#, crm_job.id).fetch_one(&app.pool).await.expect("fetch skip reason");
    assert_eq!(crm_skip_reason.as_deref(), Some("email_invalid"));

    let email_status: Option<String> =
        sqlx::query_scalar!(r#"SELECT email_validation_status FROM events WHERE email = 'jane@example.com'"#).fetch_one(&app.pool).await.expect("fetch event");
    assert_eq!(email_status.as_deref(), Some("invalid"));

    let cached_status: String = sqlx::query_scalar!(r#"SELECT status FROM email_validation_registry WHERE email = 'jane@example.com'"#)
        .fetch_one(&app.pool)
        .await
        .expect("fetch registry entry");
    assert_eq!(cached_status, "invalid");
}

#[tokio::test]
async fn crm_failure_schedules_a_retry_instead_of_failing_immediately() {
    let app = spawn_app().await;

    let crm_server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/contacts")).respond_with(ResponseTemplate::new(502)).mount(&crm_server).await;

    let crm_platform_id = app.insert_platform("crm", "crm", &crm_server.uri(), false).await;
    app.insert_routing_rule("lead", crm_platform_id).await;

    // Pre-seed a fresh cache entry so no validation job gets enqueued
    // alongside the CRM one — keeps this test scoped to the retry path.
    unified_events::registries::EmailValidationRegistry::upsert(
        &app.pool,
        "jane@example.com",
        unified_events::domain::EmailValidationStatus::Valid,
        None,
        Some("valid"),
        None,
        None,
        Some(true),
    )
    .await
    .expect("seed validation cache");

    let resp = app.post_lead("email=jane%40example.com").await;
    assert_eq!(resp.status().as_u16(), 200);

    let router = Router::load(&app.pool).await.expect("load router");
    let jobs = Queue::lease_batch(&app.pool, "test-worker", 10, Some(60)).await.expect("lease batch");
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.attempts, 0);

    Processor::execute_job(&app.pool, &router, job, 10_000).await.expect("execute job");

    let (status, attempts): (String, i32) =
        sqlx::query!(r#"SELECT status, attempts FROM processing_queue WHERE id = $1"#, job.id).fetch_one(&app.pool).await.map(|r| (r.status, r.attempts)).expect("fetch job");
    assert_eq!(status, "pending");
    assert_eq!(attempts, 1, "a 502 with attempts below max_retries should be retried, not failed");

    // Force the backoff window open so the next lease can pick it up, the
    // same way a worker naturally would once `process_after` elapses.
    sqlx::query!(r#"UPDATE processing_queue SET process_after = now() WHERE id = $1"#, job.id).execute(&app.pool).await.expect("fast-forward backoff");

    Mock::given(method("POST")).and(path("/contacts")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"contact_id": "abc", "existing": false}))).mount(&crm_server).await;

    let retried = Queue::lease_batch(&app.pool, "test-worker", 10, Some(60)).await.expect("lease batch again");
    assert_eq!(retried.len(), 1);
    Processor::execute_job(&app.pool, &router, &retried[0], 10_000).await.expect("execute retried job");

    let final_status: String = sqlx::query_scalar!(r#"SELECT status FROM processing_queue WHERE id = $1"#, job.id).fetch_one(&app.pool).await.expect("fetch final status");
    assert_eq!(final_status, "completed");
}

#[tokio::test]
async fn stuck_lease_is_recovered_and_reprocessed_exactly_once() {
    let app = spawn_app().await;

    let crm_server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/contacts")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"contact_id": "abc", "existing": false}))).mount(&crm_server).await;

    let crm_platform_id = app.insert_platform("crm", "crm", &crm_server.uri(), false).await;
    app.insert_routing_rule("lead", crm_platform_id).await;

    unified_events::registries::EmailValidationRegistry::upsert(
        &app.pool,
        "jane@example.com",
        unified_events::domain::EmailValidationStatus::Valid,
        None,
        Some("valid"),
        None,
        None,
        Some(true),
    )
    .await
    .expect("seed validation cache");

    app.post_lead("email=jane%40example.com").await;

    // Worker A leases with a lease window already in the past, simulating a
    // crash before it ever calls complete/fail/retry.
    let leased = Queue::lease_batch(&app.pool, "worker-a", 10, Some(1)).await.expect("worker a leases");
    assert_eq!(leased.len(), 1);
    sqlx::query!(r#"UPDATE processing_queue SET locked_until = now() - interval '1 minute' WHERE id = $1"#, leased[0].id).execute(&app.pool).await.expect("simulate expired lease");

    let reaped = Queue::reap_stuck(&app.pool, chrono::Duration::seconds(0)).await.expect("reap stuck leases");
    assert_eq!(reaped, 1);

    let router = Router::load(&app.pool).await.expect("load router");
    let relet = Queue::lease_batch(&app.pool, "worker-b", 10, Some(60)).await.expect("worker b leases");
    assert_eq!(relet.len(), 1);
    Processor::execute_job(&app.pool, &router, &relet[0], 10_000).await.expect("execute recovered job");

    let (status, attempts): (String, i32) =
        sqlx::query!(r#"SELECT status, attempts FROM processing_queue WHERE id = $1"#, leased[0].id).fetch_one(&app.pool).await.map(|r| (r.status, r.attempts)).expect("fetch job");
    assert_eq!(status, "completed");
    assert_eq!(attempts, 0, "a clean completion after recovery never invokes retry");
}
