use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::meta::{ObjectMeta, WorkloadRef};

// ── WorkloadExposure ──────────────────────────────────────────────────────────

/// Operator-created spec, runtime-written status: the runtime reports the
/// endpoints it actually exposed, ordered by priority, and the operator
/// mirrors the first valid one back onto the workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadExposure {
    pub metadata: ObjectMeta,
    pub spec: WorkloadExposureSpec,
    #[serde(default)]
    pub status: WorkloadExposureStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadExposureSpec {
    /// Carries the workload UID so a re-created workload with the same name
    /// cannot pick up a stale exposure.
    pub workload_ref: WorkloadRef,
    #[serde(default)]
    pub runtime_class: String,
    pub observed_workload_generation: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadExposureStatus {
    /// Ordered by the runtime by priority; the first valid URL is canonical.
    #[serde(default)]
    pub exposures: Vec<ExposureEntry>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureEntry {
    pub url: String,
    #[serde(default)]
    pub ready: bool,
}
