//! Telephony webhook DTOs
//!
//! The provider posts status callbacks as form-encoded pairs. The form is
//! kept as raw pairs for signature verification (the signature covers every
//! field, including ones we do not use) and picked apart here.

use serde::Deserialize;
use vona_core::models::ProviderStatus;

/// Query string on the callback URL
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookQuery {
    /// Account the call belongs to, set when the callback URL was
    /// registered with the provider
    #[serde(rename = "UserId")]
    pub user_id: Option<String>,
}

/// Status callback fields picked out of the form body
#[derive(Debug, Clone)]
pub struct CallStatusParams {
    /// Provider call SID; absent in malformed deliveries
    pub call_sid: Option<String>,

    /// Raw status value
    pub call_status: String,

    /// Duration in seconds; unparseable or absent values read as 0
    pub duration_secs: i32,

    /// Dialed number
    pub to: String,

    /// Originating identity
    pub from: Option<String>,
}

impl CallStatusParams {
    /// Pick the known fields out of the decoded form pairs
    pub fn from_form(params: &[(String, String)]) -> Self {
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            call_sid: get("CallSid"),
            call_status: get("CallStatus").unwrap_or_default(),
            duration_secs: get("CallDuration")
                .and_then(|d| d.parse::<i32>().ok())
                .unwrap_or(0)
                .max(0),
            to: get("To").unwrap_or_default(),
            from: get("From"),
        }
    }

    /// Parse the raw status
    pub fn provider_status(&self) -> ProviderStatus {
        ProviderStatus::parse(&self.call_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vona_core::models::CallStatus;

    fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_form_extracts_fields() {
        let params = CallStatusParams::from_form(&form(&[
            ("CallSid", "CA123"),
            ("CallStatus", "completed"),
            ("CallDuration", "125"),
            ("To", "+51999888777"),
            ("From", "client:web"),
            ("AccountSid", "AC999"),
        ]));

        assert_eq!(params.call_sid.as_deref(), Some("CA123"));
        assert_eq!(params.duration_secs, 125);
        assert_eq!(params.to, "+51999888777");
        assert_eq!(params.from.as_deref(), Some("client:web"));
        assert_eq!(
            params.provider_status().to_call_status(),
            CallStatus::Answered
        );
    }

    #[test]
    fn test_from_form_tolerates_missing_and_garbage() {
        let params = CallStatusParams::from_form(&form(&[
            ("CallStatus", "completed"),
            ("CallDuration", "abc"),
        ]));

        assert_eq!(params.call_sid, None);
        assert_eq!(params.duration_secs, 0);
        assert_eq!(params.to, "");
    }

    #[test]
    fn test_negative_duration_clamped() {
        let params = CallStatusParams::from_form(&form(&[
            ("CallSid", "CA1"),
            ("CallStatus", "completed"),
            ("CallDuration", "-10"),
        ]));
        assert_eq!(params.duration_secs, 0);
    }
}
