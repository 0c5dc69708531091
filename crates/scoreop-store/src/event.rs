use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Event reasons emitted on Workloads ────────────────────────────────────────

pub const REASON_BINDING_PENDING: &str = "BindingPending";
pub const REASON_CLAIM_ERROR: &str = "ClaimError";
pub const REASON_PLAN_CREATED: &str = "PlanCreated";
pub const REASON_PLAN_ERROR: &str = "PlanError";
pub const REASON_PROJECTION_ERROR: &str = "ProjectionError";
pub const REASON_ENDPOINT_MIRRORED: &str = "EndpointMirrored";
pub const REASON_ENDPOINT_CLEARED: &str = "EndpointCleared";
pub const REASON_READY: &str = "Ready";
pub const REASON_DELETED: &str = "Deleted";

// ── Event reasons emitted on ResourceClaims ───────────────────────────────────

pub const REASON_PROVISIONING: &str = "Provisioning";
pub const REASON_PROVISIONED: &str = "Provisioned";
pub const REASON_PROVISION_FAILED: &str = "ProvisionFailed";
pub const REASON_DEPROVISIONING: &str = "Deprovisioning";
pub const REASON_DEPROVISIONED: &str = "Deprovisioned";
pub const REASON_DEPROVISION_FAILED: &str = "DeprovisionFailed";

// ── Event reasons emitted on WorkloadExposures ────────────────────────────────

pub const REASON_EXPOSURE_REGISTERED: &str = "ExposureRegistered";
pub const REASON_EXPOSURE_UPDATED: &str = "ExposureUpdated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// A recorded occurrence on one object, appended through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub at: DateTime<Utc>,
    /// Kind of the object the event is attached to.
    pub object_kind: String,
    pub namespace: String,
    pub name: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

impl Event {
    pub fn normal(kind: &str, namespace: &str, name: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            object_kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            event_type: EventType::Normal,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(kind: &str, namespace: &str, name: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Warning,
            ..Self::normal(kind, namespace, name, reason, message)
        }
    }
}
