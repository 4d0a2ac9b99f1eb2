//! Call record model
//!
//! One record per call attempt, keyed by the telephony provider's call SID.
//! The SID is the natural idempotency key: every webhook delivery for a call
//! merges into the same record, which must converge to one final state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw call status as reported by the telephony provider
///
/// Statuses outside the mapped set (queued, initiated, ringing and whatever
/// the provider adds next) fall into `Unknown` with the raw value preserved
/// for storage and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Completed,
    NoAnswer,
    Busy,
    Failed,
    Canceled,
    Unknown(String),
}

impl ProviderStatus {
    /// Parse the provider's status string
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "completed" => ProviderStatus::Completed,
            "no-answer" => ProviderStatus::NoAnswer,
            "busy" => ProviderStatus::Busy,
            "failed" => ProviderStatus::Failed,
            "canceled" => ProviderStatus::Canceled,
            _ => ProviderStatus::Unknown(s.trim().to_string()),
        }
    }

    /// Map to the application-level call status
    pub fn to_call_status(&self) -> CallStatus {
        match self {
            ProviderStatus::Completed => CallStatus::Answered,
            ProviderStatus::NoAnswer => CallStatus::Missed,
            ProviderStatus::Busy => CallStatus::Rejected,
            ProviderStatus::Failed => CallStatus::Failed,
            ProviderStatus::Canceled => CallStatus::Canceled,
            ProviderStatus::Unknown(_) => CallStatus::Unknown,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStatus::Completed => write!(f, "completed"),
            ProviderStatus::NoAnswer => write!(f, "no-answer"),
            ProviderStatus::Busy => write!(f, "busy"),
            ProviderStatus::Failed => write!(f, "failed"),
            ProviderStatus::Canceled => write!(f, "canceled"),
            ProviderStatus::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Application-level call status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Call connected and was billed
    Answered,
    /// Callee never picked up
    Missed,
    /// Callee was busy
    Rejected,
    /// Provider-side failure
    Failed,
    /// Caller hung up before connect
    Canceled,
    /// Intermediate or unrecognized provider status
    #[default]
    Unknown,
}

impl CallStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "answered" => Some(CallStatus::Answered),
            "missed" => Some(CallStatus::Missed),
            "rejected" => Some(CallStatus::Rejected),
            "failed" => Some(CallStatus::Failed),
            "canceled" => Some(CallStatus::Canceled),
            "unknown" => Some(CallStatus::Unknown),
            _ => None,
        }
    }

    /// Terminal statuses end the call lifecycle; a record that reached one
    /// must never be regressed by a late intermediate delivery.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Unknown)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Answered => write!(f, "answered"),
            CallStatus::Missed => write!(f, "missed"),
            CallStatus::Rejected => write!(f, "rejected"),
            CallStatus::Failed => write!(f, "failed"),
            CallStatus::Canceled => write!(f, "canceled"),
            CallStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    #[default]
    Outbound,
    Inbound,
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallDirection::Outbound => write!(f, "outbound"),
            CallDirection::Inbound => write!(f, "inbound"),
        }
    }
}

impl CallDirection {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "outbound" => Some(CallDirection::Outbound),
            "inbound" => Some(CallDirection::Inbound),
            _ => None,
        }
    }
}

/// Call record entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier
    pub id: i64,

    /// Provider call SID (unique, the idempotency key)
    pub call_sid: String,

    /// Owning account id
    pub account_id: String,

    /// Dialed number (E.164)
    pub phone_number: String,

    /// Call direction
    pub direction: CallDirection,

    /// Raw status string as last reported by the provider
    pub provider_status: String,

    /// Mapped application status
    pub status: CallStatus,

    /// Call duration in seconds
    pub duration_secs: i32,

    /// Amount actually charged for the call
    pub cost: Option<Decimal>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Check if the record reached a terminal status
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the call connected and has billable time
    #[inline]
    pub fn was_answered(&self) -> bool {
        self.status == CallStatus::Answered && self.duration_secs > 0
    }
}

impl Default for CallRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            call_sid: String::new(),
            account_id: String::new(),
            phone_number: String::new(),
            direction: CallDirection::Outbound,
            provider_status: String::new(),
            status: CallStatus::Unknown,
            duration_secs: 0,
            cost: None,
            created_at: now,
            updated_at: now,
        }
    }
}
