use serde::{Deserialize, Serialize};

use crate::claim::LocalObjectRef;
use crate::meta::{ObjectMeta, WorkloadRef};

// ── WorkloadPlan ──────────────────────────────────────────────────────────────

/// The rendered, backend-specific deployment artifact. At most one exists per
/// workload, named like the workload. The spec is written by the plan
/// manager; the status is written by the runtime controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadPlan {
    pub metadata: ObjectMeta,
    pub spec: WorkloadPlanSpec,
    #[serde(default)]
    pub status: WorkloadPlanStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadPlanSpec {
    pub workload_ref: WorkloadRef,
    /// The workload generation this plan was rendered from.
    pub observed_workload_generation: i64,
    pub runtime_class: String,
    pub template: PlanTemplate,
    /// Composed values: template defaults ⊕ normalized workload ⊕ claim
    /// outputs, right-biased.
    #[serde(default)]
    pub values: serde_json::Value,
    #[serde(default)]
    pub projection: WorkloadProjection,
    /// Names of the claims this plan was rendered against.
    #[serde(default)]
    pub claims: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTemplate {
    /// Template kind, e.g. `helm` or `manifests`.
    pub kind: String,
    /// Backend-specific template reference (chart URL, manifest bundle, …).
    #[serde(rename = "ref")]
    pub template_ref: String,
}

// ── Projections ───────────────────────────────────────────────────────────────

/// The wiring that maps claim outputs into the running workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadProjection {
    #[serde(default)]
    pub env: Vec<EnvMapping>,
    #[serde(default)]
    pub volumes: Vec<VolumeProjection>,
    #[serde(default)]
    pub files: Vec<FileProjection>,
}

impl WorkloadProjection {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.volumes.is_empty() && self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvMapping {
    /// Environment variable name in the container.
    pub name: String,
    pub from: OutputRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRef {
    pub claim_key: String,
    pub output_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProjection {
    /// Mount path inside the container.
    pub target: String,
    pub claim_key: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeSource {
    Secret(LocalObjectRef),
    ConfigMap(LocalObjectRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProjection {
    pub target: String,
    pub claim_key: String,
    /// Certificate data carried inline.
    pub cert: String,
}

// ── Plan status (runtime-written) ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanPhase {
    Pending,
    Provisioning,
    Ready,
    Failed,
}

impl std::fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanPhase::Pending => write!(f, "Pending"),
            PlanPhase::Provisioning => write!(f, "Provisioning"),
            PlanPhase::Ready => write!(f, "Ready"),
            PlanPhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadPlanStatus {
    #[serde(default)]
    pub phase: Option<PlanPhase>,
    #[serde(default)]
    pub message: String,
}
