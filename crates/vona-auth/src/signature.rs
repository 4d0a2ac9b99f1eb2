//! Telephony webhook signature validation
//!
//! The provider signs every callback with HMAC-SHA1 over the full request
//! URL followed by the POST parameters sorted alphabetically by name, each
//! appended as name then value, base64-encoded. Requests that fail this
//! check never reach the settlement pipeline.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::warn;
use vona_core::error::AppError;

type HmacSha1 = Hmac<Sha1>;

/// Validator for provider callback signatures
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    /// Create a verifier from the shared provider secret.
    /// The secret is validated non-empty at config load.
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    /// Compute the expected signature for a callback
    ///
    /// `url` is the full public URL including the query string; `params`
    /// are the decoded POST form fields.
    pub fn signature(&self, url: &str, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut data = String::from(url);
        for (name, value) in sorted {
            data.push_str(name);
            data.push_str(value);
        }

        // new_from_slice only fails on invalid key lengths, which HMAC
        // does not have
        let mut mac = HmacSha1::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(data.as_bytes());

        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Verify a provider signature header against the request
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSignature` when the header is missing or
    /// does not match; such requests must be rejected, not acknowledged.
    pub fn verify(
        &self,
        url: &str,
        params: &[(String, String)],
        provided: Option<&str>,
    ) -> Result<(), AppError> {
        let provided = match provided {
            Some(s) if !s.is_empty() => s,
            _ => {
                warn!(url = %url, "Callback missing signature header");
                return Err(AppError::InvalidSignature);
            }
        };

        let expected = self.signature(url, params);

        if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            warn!(url = %url, "Callback signature mismatch");
            return Err(AppError::InvalidSignature);
        }

        Ok(())
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Length-then-byte comparison that does not short-circuit on the first
/// differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
