//! Health check handler

use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use vona_cache::RedisCache;

/// Liveness plus dependency status
///
/// GET /health
pub async fn health(
    pool: web::Data<PgPool>,
    cache: web::Data<Option<Arc<RedisCache>>>,
) -> HttpResponse {
    let db_ok = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool.get_ref())
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Health check: database unreachable");
            false
        }
    };

    let redis_status = match cache.get_ref() {
        Some(redis) => match redis.ping().await {
            Ok(()) => "up",
            Err(e) => {
                warn!(error = %e, "Health check: redis unreachable");
                "down"
            }
        },
        None => "disabled",
    };

    let status = if db_ok { "ok" } else { "degraded" };
    let body = json!({
        "status": status,
        "database": if db_ok { "up" } else { "down" },
        "redis": redis_status,
    });

    if db_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Configure the health route (registered at the root, outside /api/v1)
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
