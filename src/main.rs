//! Vona Billing Backend Server
//!
//! Prepaid billing backend for the Vona calling app: webhook-driven call
//! settlement, prefix-based pricing with markup, balance management and
//! admin rate imports.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vona_api::{
    configure_accounts, configure_admin, configure_health, configure_pricing, configure_webhooks,
    AppImportService, AppPricingService, AppSettlementService,
};
use vona_auth::{TokenVerifier, WebhookVerifier};
use vona_cache::RedisCache;
use vona_core::config::AppConfig;
use vona_db::repositories::PgPricingRepository;
use vona_db::create_pool;
use vona_services::{BalanceService, ImportService, PricingService, SettlementService};

/// Configure API routes under /api/v1
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Telephony provider callbacks
            .configure(configure_webhooks)
            // Rate lookups
            .configure(configure_pricing)
            // Authenticated account surface
            .configure(configure_accounts)
            // Admin surface
            .configure(configure_admin),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vona_billing={},vona_api={},vona_services={},vona_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!(
        "Starting Vona Billing Backend v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Startup fails here on a missing webhook signing secret: settlement
    // cannot verify callbacks without it.
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    info!("Database migrations applied");

    // Redis is an optimization for the pricing path; a failed connection
    // degrades to database lookups instead of aborting startup.
    let cache: Option<Arc<RedisCache>> = match RedisCache::new(&config.redis.url).await {
        Ok(cache) => {
            info!("Redis cache connected");
            Some(Arc::new(cache))
        }
        Err(e) => {
            warn!("Redis unavailable, pricing will hit the database: {}", e);
            None
        }
    };

    let token_verifier = Arc::new(TokenVerifier::new(&config.auth.jwt_secret));
    let webhook_verifier = Arc::new(WebhookVerifier::new(&config.webhook.signing_secret));

    let pricing: Arc<AppPricingService> = Arc::new(PricingService::new(
        Arc::new(PgPricingRepository::new(pool.clone())),
        cache.clone(),
    ));
    let settlement: Arc<AppSettlementService> =
        Arc::new(SettlementService::new(pool.clone(), pricing.clone()));
    let balance = Arc::new(BalanceService::new(pool.clone()));
    let importer: Arc<AppImportService> = Arc::new(ImportService::new(pricing.clone()));

    // CORS configuration
    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let bind_addr = config.server_addr();
    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        // Clone cors_origins for each worker
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::new(token_verifier.clone()))
            .app_data(web::Data::new(webhook_verifier.clone()))
            .app_data(web::Data::new(pricing.clone()))
            .app_data(web::Data::new(settlement.clone()))
            .app_data(web::Data::new(balance.clone()))
            .app_data(web::Data::new(importer.clone()))
            // Rate sheet uploads can run to a few megabytes
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            // Liveness probe outside the versioned API
            .configure(configure_health)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
