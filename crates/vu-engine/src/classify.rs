//! Response classification into success / failure outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::HttpResponse;

/// Why a request was counted as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// 401 or 403.
    Unauthorized,
    /// Any other status >= 400.
    UnexpectedStatus,
    /// The request never produced a response.
    Transport,
}

impl FailureReason {
    /// Stable reason code used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Unauthorized => "unauthorized",
            FailureReason::UnexpectedStatus => "unexpected-status",
            FailureReason::Transport => "transport",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The classified result of one HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub operation: String,
    pub success: bool,
    pub reason: Option<FailureReason>,
    /// Status code; 0 when the transport failed.
    pub status: u16,
}

impl RequestOutcome {
    /// Outcome for a request that failed below HTTP.
    pub fn transport_failure(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            success: false,
            reason: Some(FailureReason::Transport),
            status: 0,
        }
    }

    /// Reason code as a string, if the request failed.
    pub fn reason_code(&self) -> Option<&'static str> {
        self.reason.map(|r| r.code())
    }
}

/// Classify a status code for `operation`.
///
/// 401/403 are failures with reason `unauthorized` unless
/// `unauthorized_is_failure` is false, in which case they count as successes.
/// Any other status >= 400 is `unexpected-status`. Never fails.
pub fn classify(operation: &str, status: u16, unauthorized_is_failure: bool) -> RequestOutcome {
    let reason = match status {
        401 | 403 if unauthorized_is_failure => Some(FailureReason::Unauthorized),
        401 | 403 => None,
        s if s >= 400 => Some(FailureReason::UnexpectedStatus),
        _ => None,
    };

    RequestOutcome {
        operation: operation.to_string(),
        success: reason.is_none(),
        reason,
        status,
    }
}

/// Classify a transport response, mapping transport errors to `transport`.
pub fn classify_response(
    operation: &str,
    response: &HttpResponse,
    unauthorized_is_failure: bool,
) -> RequestOutcome {
    if response.is_transport_error() {
        return RequestOutcome::transport_failure(operation);
    }
    classify(operation, response.status, unauthorized_is_failure)
}
