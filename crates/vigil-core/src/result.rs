use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// The session deadline passed before a terminal result.
    Timeout,
    /// The caller aborted the session.
    Cancelled,
    /// The match service declined more often than the reject budget allows.
    MaxRetriesExceeded,
    /// The match service could not be reached within the transport retry cap.
    ServiceUnavailable,
    /// The camera refused access.
    PermissionDenied,
    /// The camera could not be opened or stopped delivering frames.
    HardwareUnavailable,
    /// The landmark oracle failed fatally.
    OracleFault,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Timeout => "Timeout",
            ReasonCode::Cancelled => "Cancelled",
            ReasonCode::MaxRetriesExceeded => "MaxRetriesExceeded",
            ReasonCode::ServiceUnavailable => "ServiceUnavailable",
            ReasonCode::PermissionDenied => "PermissionDenied",
            ReasonCode::HardwareUnavailable => "HardwareUnavailable",
            ReasonCode::OracleFault => "OracleFault",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Accepted,
    /// The identity was declined by the match service (reject budget spent).
    Rejected,
    /// The session ended without a match decision.
    Error,
}

/// Terminal artifact handed to the caller, exactly once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub session_id: String,
    pub status: VerificationStatus,
    /// Display confidence 0–100, present on acceptance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    pub completed_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn accepted(session_id: impl Into<String>, match_score: f32) -> Self {
        Self {
            session_id: session_id.into(),
            status: VerificationStatus::Accepted,
            match_score: Some(match_score),
            reason_code: None,
            completed_at: Utc::now(),
        }
    }

    /// A failed session. `MaxRetriesExceeded` reports as `rejected`, every
    /// other reason as `error`.
    pub fn failed(session_id: impl Into<String>, reason: ReasonCode) -> Self {
        let status = match reason {
            ReasonCode::MaxRetriesExceeded => VerificationStatus::Rejected,
            _ => VerificationStatus::Error,
        };
        Self {
            session_id: session_id.into(),
            status,
            match_score: None,
            reason_code: Some(reason),
            completed_at: Utc::now(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == VerificationStatus::Accepted
    }
}
