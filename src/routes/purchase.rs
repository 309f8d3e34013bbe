use std::collections::HashMap;
use std::time::Instant;

use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;

use crate::domain::EventType;
use crate::processor::IntakeOutcome;
use crate::processor::Processor;
use crate::processor::RawSubmission;
use crate::startup::AppState;
use crate::utils::error_500;

#[tracing::instrument(skip_all)]
pub async fn submit_purchase(
    req: HttpRequest,
    form: web::Form<HashMap<String, String>>,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let started = Instant::now();
    let ip = req.connection_info().realip_remote_addr().map(str::to_string);
    let submission = RawSubmission { event_type: EventType::Purchase, fields: form.into_inner(), ip };

    let outcome = Processor::intake(&state.pool, &state.validator, &state.router, submission).await.map_err(error_500)?;
    let processing_time_ms = started.elapsed().as_millis();

    match outcome {
        IntakeOutcome::Accepted { event_id, .. } => Ok(HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "event_id": event_id,
            "status": "accepted",
            "processing_time": processing_time_ms,
        }))),
        IntakeOutcome::Blocked { event_id, reason } => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "event_id": event_id,
            "status": "blocked",
            "reason": reason,
            "processing_time": processing_time_ms,
        }))),
    }
}
