use crate::helpers::spawn_app;

#[tokio::test]
async fn purchase_links_to_the_most_recent_lead_with_the_same_email() {
    let app = spawn_app().await;
    let platform_id = app.insert_platform("crm", "crm", "http://example.invalid", false).await;
    app.insert_routing_rule("lead", platform_id).await;
    app.insert_routing_rule("purchase", platform_id).await;

    let lead_body = "email=jane%40example.com&source=facebook&campaign=summer";
    let lead_resp = app.post_lead(lead_body).await;
    assert_eq!(lead_resp.status().as_u16(), 200);

    let purchase_body = "email=jane%40example.com&purchase_offer=widget&amount=42.00";
    let purchase_resp = app.post_purchase(purchase_body).await;
    assert_eq!(purchase_resp.status().as_u16(), 200);

    let relationships = sqlx::query_scalar!(r#"SELECT count(*) AS "count!" FROM event_relationships WHERE relationship_type = 'lead_to_purchase'"#)
        .fetch_one(&app.pool)
        .await
        .expect("count relationships");
    assert_eq!(relationships, 1);

    let purchase_acq_source: Option<String> = sqlx::query_scalar!(
        r#"SELECT acq_source FROM events WHERE event_type = 'purchase' ORDER BY created_at DESC LIMIT 1"#,
    )
    .fetch_one(&app.pool)
    .await
    .expect("find purchase event");
    assert_eq!(purchase_acq_source.as_deref(), Some("facebook"));
}

#[tokio::test]
async fn purchase_with_no_prior_lead_is_accepted_without_linking() {
    let app = spawn_app().await;
    let platform_id = app.insert_platform("crm", "crm", "http://example.invalid", false).await;
    app.insert_routing_rule("purchase", platform_id).await;

    let resp = app.post_purchase("email=new.buyer%40example.com&purchase_offer=widget").await;
    assert_eq!(resp.status().as_u16(), 200);

    let relationships = sqlx::query_scalar!(r#"SELECT count(*) AS "count!" FROM event_relationships"#).fetch_one(&app.pool).await.expect("count relationships");
    assert_eq!(relationships, 0);
}
