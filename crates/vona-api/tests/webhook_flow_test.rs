//! Webhook endpoint tests
//!
//! Exercise the callback route through a real actix app: signature
//! enforcement and the always-acknowledge contract. The database pool is
//! lazy and never reachable, which is exactly the situation settlement must
//! degrade through without failing the webhook response.

use actix_web::{test, web, App};
use sqlx::PgPool;
use std::sync::Arc;
use vona_api::{configure_webhooks, AppPricingService, AppSettlementService};
use vona_auth::WebhookVerifier;
use vona_core::config::{
    AppConfig, AuthConfig, DatabaseConfig, RedisConfig, ServerConfig, WebhookConfig,
};
use vona_db::repositories::PgPricingRepository;
use vona_services::{PricingService, SettlementService};

const SECRET: &str = "test-webhook-secret";
const PUBLIC_BASE: &str = "http://vona.test";
const CALLBACK_PATH: &str = "/api/v1/webhooks/call-status?UserId=uid-1";

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "postgres://localhost/vona_unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout_secs: 1,
            idle_timeout_secs: 1,
        },
        redis: RedisConfig {
            url: "redis://localhost".to_string(),
            default_ttl_secs: 60,
        },
        auth: AuthConfig {
            jwt_secret: "test-jwt-secret".to_string(),
        },
        webhook: WebhookConfig {
            signing_secret: SECRET.to_string(),
            public_base_url: Some(PUBLIC_BASE.to_string()),
        },
    }
}

fn app_state() -> (
    web::Data<Arc<WebhookVerifier>>,
    web::Data<Arc<AppSettlementService>>,
    web::Data<AppConfig>,
) {
    // Lazy pool: never connects. Settlement must degrade, not error.
    let pool = PgPool::connect_lazy("postgres://localhost/vona_unused").unwrap();

    let pricing: Arc<AppPricingService> = Arc::new(PricingService::new(
        Arc::new(PgPricingRepository::new(pool.clone())),
        None,
    ));
    let settlement: Arc<AppSettlementService> =
        Arc::new(SettlementService::new(pool, pricing));

    (
        web::Data::new(Arc::new(WebhookVerifier::new(SECRET))),
        web::Data::new(settlement),
        web::Data::new(test_config()),
    )
}

fn form_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn sign(params: &[(String, String)]) -> String {
    WebhookVerifier::new(SECRET).signature(&format!("{}{}", PUBLIC_BASE, CALLBACK_PATH), params)
}

macro_rules! webhook_app {
    () => {{
        let (verifier, settlement, config) = app_state();
        test::init_service(
            App::new()
                .app_data(verifier)
                .app_data(settlement)
                .app_data(config)
                .service(web::scope("/api/v1").configure(configure_webhooks)),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_missing_signature_is_rejected() {
    let app = webhook_app!();

    let req = test::TestRequest::post()
        .uri(CALLBACK_PATH)
        .set_form(form_pairs(&[("CallSid", "CA1"), ("CallStatus", "completed")]))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn test_bad_signature_is_rejected() {
    let app = webhook_app!();

    let req = test::TestRequest::post()
        .uri(CALLBACK_PATH)
        .insert_header(("X-Twilio-Signature", "bm90LXRoZS1yZWFsLXNpZ25hdHVyZQ=="))
        .set_form(form_pairs(&[("CallSid", "CA1"), ("CallStatus", "completed")]))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn test_missing_call_sid_is_acknowledged() {
    let app = webhook_app!();

    let params = form_pairs(&[("CallStatus", "completed"), ("CallDuration", "60")]);
    let req = test::TestRequest::post()
        .uri(CALLBACK_PATH)
        .insert_header(("X-Twilio-Signature", sign(&params)))
        .set_form(params.clone())
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("<Response/>"));
}

#[actix_web::test]
async fn test_missing_user_id_is_acknowledged() {
    let (verifier, settlement, config) = app_state();
    let app = test::init_service(
        App::new()
            .app_data(verifier)
            .app_data(settlement)
            .app_data(config)
            .service(web::scope("/api/v1").configure(configure_webhooks)),
    )
    .await;

    let path = "/api/v1/webhooks/call-status";
    let params = form_pairs(&[("CallSid", "CA1"), ("CallStatus", "completed")]);
    let signature =
        WebhookVerifier::new(SECRET).signature(&format!("{}{}", PUBLIC_BASE, path), &params);

    let req = test::TestRequest::post()
        .uri(path)
        .insert_header(("X-Twilio-Signature", signature))
        .set_form(params)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_settlement_failure_still_acknowledged() {
    let app = webhook_app!();

    // Database is unreachable; the pipeline must degrade internally.
    let params = form_pairs(&[
        ("CallSid", "CA-unreachable"),
        ("CallStatus", "completed"),
        ("CallDuration", "125"),
        ("To", "+12125551234"),
    ]);
    let req = test::TestRequest::post()
        .uri(CALLBACK_PATH)
        .insert_header(("X-Twilio-Signature", sign(&params)))
        .set_form(params)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("<Response/>"));
}
