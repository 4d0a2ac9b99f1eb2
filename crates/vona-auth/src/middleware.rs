//! Actix-web request extractors for authenticated users
//!
//! Admin authorization is not decided here: tokens carry no role claim, so
//! handlers that need it check the `is_admin` flag on the account row.

use crate::token::TokenVerifier;
use crate::Claims;
use actix_web::{dev::Payload, error::ErrorUnauthorized, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use std::sync::Arc;
use tracing::{debug, warn};
use vona_core::error::AppError;

/// Extract a bearer token from the request
///
/// Checks for a token in the following order:
/// 1. Authorization header (Bearer token)
/// 2. Cookie named "token"
fn extract_token_from_request(req: &HttpRequest) -> Option<String> {
    // Try Authorization header first
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if auth_str.starts_with("Bearer ") {
                return Some(auth_str[7..].to_string());
            }
        }
    }

    // Try cookie
    if let Some(cookie) = req.cookie("token") {
        return Some(cookie.value().to_string());
    }

    None
}

/// Authenticated user extractor
///
/// Extracts and validates the bearer token from the request. The subject is
/// the identity provider's user id, which is also the account id.
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use vona_auth::middleware::AuthenticatedUser;
///
/// async fn protected_handler(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().json(serde_json::json!({
///         "user_id": user.user_id
///     }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Account id of the authenticated user
    pub user_id: String,

    /// Full claims from the token
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// Email from the token, when the provider included one
    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // Extract verifier from app data
        let verifier = match req.app_data::<web::Data<Arc<TokenVerifier>>>() {
            Some(service) => service.get_ref().clone(),
            None => {
                warn!("TokenVerifier not found in app data");
                return ready(Err(ErrorUnauthorized(AppError::Unauthorized(
                    "Authentication service not configured".to_string(),
                ))));
            }
        };

        // Extract token from request
        let token = match extract_token_from_request(req) {
            Some(t) => t,
            None => {
                debug!("No authentication token found in request");
                return ready(Err(ErrorUnauthorized(AppError::Unauthorized(
                    "No authentication token provided".to_string(),
                ))));
            }
        };

        // Validate token and extract claims
        match verifier.verify(&token) {
            Ok(claims) => {
                debug!(user_id = %claims.sub, "User authenticated");

                ready(Ok(AuthenticatedUser {
                    user_id: claims.sub.clone(),
                    claims,
                }))
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                ready(Err(ErrorUnauthorized(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const TEST_SECRET: &str = "test-secret-key-12345";

    fn create_test_verifier() -> Arc<TokenVerifier> {
        Arc::new(TokenVerifier::new(TEST_SECRET))
    }

    fn issue_token(sub: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            email: None,
            iat: now,
            exp: now + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_extract_token_from_authorization_header() {
        let verifier = create_test_verifier();
        let token = issue_token("uid-1");

        let app = test::init_service(App::new().app_data(web::Data::new(verifier)).route(
            "/test",
            web::get().to(|user: AuthenticatedUser| async move {
                assert_eq!(user.user_id, "uid-1");
                "OK"
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_extract_token_from_cookie() {
        let verifier = create_test_verifier();
        let token = issue_token("uid-2");

        let app = test::init_service(App::new().app_data(web::Data::new(verifier)).route(
            "/test",
            web::get().to(|user: AuthenticatedUser| async move {
                assert_eq!(user.user_id, "uid-2");
                "OK"
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .cookie(actix_web::cookie::Cookie::new("token", token))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_missing_token() {
        let verifier = create_test_verifier();

        let app = test::init_service(App::new().app_data(web::Data::new(verifier)).route(
            "/test",
            web::get().to(|_user: AuthenticatedUser| async { "OK" }),
        ))
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_invalid_token() {
        let verifier = create_test_verifier();

        let app = test::init_service(App::new().app_data(web::Data::new(verifier)).route(
            "/test",
            web::get().to(|_user: AuthenticatedUser| async { "OK" }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", "Bearer invalid.token.here"))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_missing_verifier_in_app_data() {
        let app = test::init_service(App::new().route(
            "/test",
            web::get().to(|_user: AuthenticatedUser| async { "OK" }),
        ))
        .await;

        let token = issue_token("uid-1");
        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }
}
