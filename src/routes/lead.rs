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
pub async fn submit_lead(
    req: HttpRequest,
    form: web::Form<HashMap<String, String>>,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let started = Instant::now();
    let ip = req.connection_info().realip_remote_addr().map(str::to_string);
    let redirect_url = form.get("redirect_url").cloned();

    let submission = RawSubmission { event_type: EventType::Lead, fields: form.into_inner(), ip };

    // §7: a browser navigation (identified by the caller having supplied a
    // `redirect_url`) always lands on the confirmation page, even if the
    // event was blocked or intake itself failed — only JSON clients (no
    // `redirect_url`) see structured errors.
    let outcome = Processor::intake(&state.pool, &state.validator, &state.router, submission).await;
    let processing_time_ms = started.elapsed().as_millis();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::error!(%error, "lead intake failed");
            return match redirect_url {
                Some(redirect_url) => Ok(HttpResponse::Found().insert_header((actix_web::http::header::LOCATION, redirect_url)).finish()),
                None => Err(error_500(error)),
            };
        }
    };

    match outcome {
        IntakeOutcome::Accepted { event_id, queued_platforms } => {
            if let Some(url) = redirect_url.clone() {
                return Ok(HttpResponse::Found().insert_header((actix_web::http::header::LOCATION, url)).finish());
            }
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "event_id": event_id,
                "queued_platforms": queued_platforms,
                "redirect_url": redirect_url,
                "processing_time": processing_time_ms,
            })))
        }
        IntakeOutcome::Blocked { event_id, reason } => {
            if let Some(url) = redirect_url.clone() {
                return Ok(HttpResponse::Found().insert_header((actix_web::http::header::LOCATION, url)).finish());
            }
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "event_id": event_id,
                "reason": reason,
                "redirect_url": redirect_url,
                "processing_time": processing_time_ms,
            })))
        }
    }
}
