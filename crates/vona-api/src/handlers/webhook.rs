//! Telephony webhook handler
//!
//! The provider posts call status updates here and retries until it gets a
//! 2xx, so every outcome except a signature failure is acknowledged with
//! 200 and an empty TwiML document. Settlement failures degrade internally;
//! they never surface to the provider.

use crate::dto::webhook::{CallStatusParams, WebhookQuery};
use crate::AppSettlementService;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use vona_auth::WebhookVerifier;
use vona_core::config::AppConfig;
use vona_core::AppError;
use vona_services::CallStatusEvent;

/// Signature header set by the provider on every callback
const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// Minimal TwiML acknowledgment
const ACK_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#;

/// Handle a call status callback
///
/// POST /api/v1/webhooks/call-status?UserId=...
#[instrument(skip_all)]
pub async fn call_status(
    req: HttpRequest,
    query: web::Query<WebhookQuery>,
    form: web::Form<Vec<(String, String)>>,
    verifier: web::Data<Arc<WebhookVerifier>>,
    settlement: web::Data<Arc<AppSettlementService>>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let url = callback_url(&req, config.webhook.public_base_url.as_deref());
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    // The only non-acknowledged outcome.
    verifier.verify(&url, &form, signature)?;

    let params = CallStatusParams::from_form(&form);

    let call_sid = match params.call_sid.clone() {
        Some(sid) => sid,
        None => {
            warn!("Callback without CallSid, acknowledging and skipping");
            return Ok(ack());
        }
    };

    let account_id = match query.user_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            warn!(call_sid = %call_sid, "Callback without UserId, acknowledging and skipping");
            return Ok(ack());
        }
    };

    let event = CallStatusEvent {
        call_sid,
        account_id,
        provider_status: params.provider_status(),
        duration_secs: params.duration_secs,
        to_number: params.to.clone(),
        from_number: params.from.clone(),
    };

    let outcome = settlement.process(&event).await;
    info!(call_sid = %event.call_sid, ?outcome, "Callback settled");

    Ok(ack())
}

fn ack() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/xml; charset=utf-8")
        .body(ACK_BODY)
}

/// The URL the provider signed: the configured public base when deployed
/// behind a proxy, otherwise the request's own connection info
fn callback_url(req: &HttpRequest, public_base: Option<&str>) -> String {
    match public_base {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), req.uri()),
        None => {
            let info = req.connection_info();
            format!("{}://{}{}", info.scheme(), info.host(), req.uri())
        }
    }
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhooks").route("/call-status", web::post().to(call_status)),
    );
}
