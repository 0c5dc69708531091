use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Condition types ───────────────────────────────────────────────────────────

pub const CONDITION_INPUTS_VALID: &str = "InputsValid";
pub const CONDITION_CLAIMS_READY: &str = "ClaimsReady";
pub const CONDITION_RUNTIME_READY: &str = "RuntimeReady";
pub const CONDITION_READY: &str = "Ready";

/// Canonical condition reasons, plus the claim-aggregation reasons that
/// ride on the `ClaimsReady` condition.
pub mod reason {
    pub const SUCCEEDED: &str = "Succeeded";
    pub const SPEC_INVALID: &str = "SpecInvalid";
    pub const POLICY_VIOLATION: &str = "PolicyViolation";
    pub const BINDING_PENDING: &str = "BindingPending";
    pub const BINDING_FAILED: &str = "BindingFailed";
    pub const PROJECTION_ERROR: &str = "ProjectionError";
    pub const RUNTIME_SELECTING: &str = "RuntimeSelecting";
    pub const RUNTIME_PROVISIONING: &str = "RuntimeProvisioning";
    pub const RUNTIME_DEGRADED: &str = "RuntimeDegraded";
    pub const QUOTA_EXCEEDED: &str = "QuotaExceeded";
    pub const PERMISSION_DENIED: &str = "PermissionDenied";
    pub const NETWORK_UNAVAILABLE: &str = "NetworkUnavailable";

    pub const CLAIM_PENDING: &str = "ClaimPending";
    pub const CLAIM_FAILED: &str = "ClaimFailed";
}

// ── Condition ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One typed status condition. The list a workload carries is a timeline:
/// `last_transition_time` moves only when `(status, reason)` changes, so
/// message-only refreshes never churn it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

pub fn get_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// Set a condition, preserving `last_transition_time` when only the message
/// changed. New condition types append. Returns true when the list changed.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    if let Some(existing) = conditions.iter_mut().find(|c| c.condition_type == condition_type) {
        if existing.status == status && existing.reason == reason {
            if existing.message == message {
                return false;
            }
            existing.message = message.to_string();
            return true;
        }
        existing.status = status;
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        existing.last_transition_time = now;
        return true;
    }
    conditions.push(Condition {
        condition_type: condition_type.to_string(),
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: now,
    });
    true
}

// ── Ready composition ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ReadySummary {
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

/// `Ready = InputsValid ∧ ClaimsReady ∧ RuntimeReady`.
///
/// The earliest prerequisite that is not True decides the summary: a False
/// condition surfaces its own reason and message, an absent or Unknown one
/// surfaces the canonical pending reason for that layer.
pub fn compute_ready(conditions: &[Condition]) -> ReadySummary {
    const LAYERS: [(&str, &str, &str); 3] = [
        (
            CONDITION_INPUTS_VALID,
            reason::SPEC_INVALID,
            "workload spec has not been validated",
        ),
        (
            CONDITION_CLAIMS_READY,
            reason::CLAIM_PENDING,
            "resource claims are not yet bound",
        ),
        (
            CONDITION_RUNTIME_READY,
            reason::RUNTIME_SELECTING,
            "runtime has not reported readiness",
        ),
    ];

    for (layer, pending_reason, pending_message) in LAYERS {
        match get_condition(conditions, layer) {
            Some(c) if c.status == ConditionStatus::True => continue,
            Some(c) if c.status == ConditionStatus::False => {
                return ReadySummary {
                    status: ConditionStatus::False,
                    reason: c.reason.clone(),
                    message: c.message.clone(),
                };
            }
            _ => {
                return ReadySummary {
                    status: ConditionStatus::False,
                    reason: pending_reason.to_string(),
                    message: pending_message.to_string(),
                };
            }
        }
    }

    ReadySummary {
        status: ConditionStatus::True,
        reason: reason::SUCCEEDED.to_string(),
        message: "workload is ready".to_string(),
    }
}

// ── Vendor reason normalization ───────────────────────────────────────────────

/// Map vendor-specific reasons reported by runtimes to the canonical
/// vocabulary. Unrecognized reasons pass through unchanged.
pub fn normalize_reason(vendor: &str) -> &str {
    match vendor {
        "Available" | "Healthy" | "Ready" => reason::SUCCEEDED,
        "Progressing" | "Deploying" | "Pending" | "Provisioning" => reason::RUNTIME_PROVISIONING,
        "Degraded" | "Unhealthy" | "CrashLoopBackOff" => reason::RUNTIME_DEGRADED,
        "Forbidden" | "Unauthorized" => reason::PERMISSION_DENIED,
        "OutOfQuota" => reason::QUOTA_EXCEEDED,
        "DnsFailure" | "Unreachable" => reason::NETWORK_UNAVAILABLE,
        other => other,
    }
}
