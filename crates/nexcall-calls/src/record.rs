//! Row types for the `calls` and `call_conversations` tables.

use nexcall_types::{CallDirection, CallStatus, Role};
use serde::{Deserialize, Serialize};

/// A persisted phone call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Internal identifier (UUID).
    pub id: String,
    /// Provider-assigned call identifier.
    pub twilio_sid: String,
    pub to: Option<String>,
    pub from: Option<String>,
    pub status: CallStatus,
    pub direction: CallDirection,
    /// Duration in seconds, once known.
    pub duration: Option<i64>,
    pub recording_url: Option<String>,
    /// Final conversation summary written when the call ends.
    pub transcript: Option<String>,
    pub agent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub call_sid: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// Addressing info carried by provider events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallParties {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Parameters for recording a call created through the provider API.
#[derive(Debug, Clone)]
pub struct NewCall {
    pub twilio_sid: String,
    pub to: String,
    pub from: String,
    pub status: CallStatus,
    pub direction: CallDirection,
}

/// Partial update applied by the administrative API.
#[derive(Debug, Clone, Default)]
pub struct UpdateCallParams {
    pub status: Option<CallStatus>,
    pub transcript: Option<String>,
}

/// Aggregate figures for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStats {
    pub total_calls: i64,
    pub calls_today: i64,
    /// Mean duration in seconds over calls with a known duration.
    pub average_duration_secs: Option<f64>,
    /// Share of terminal calls that completed, in percent.
    pub success_rate: Option<f64>,
}
