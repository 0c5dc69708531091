pub mod action;
pub mod claim;
pub mod condition;
pub mod error;
pub mod exposure;
pub mod meta;
pub mod plan;
pub mod workload;

pub use action::ReconcileAction;
pub use claim::{
    claim_name, ClaimOutputs, ClaimPhase, ClaimSummary, DeprovisionPolicy, LocalObjectRef,
    ResourceClaim, ResourceClaimSpec, ResourceClaimStatus,
};
pub use condition::{
    compute_ready, get_condition, normalize_reason, set_condition, Condition, ConditionStatus,
    ReadySummary,
};
pub use error::DomainError;
pub use exposure::{ExposureEntry, WorkloadExposure, WorkloadExposureSpec, WorkloadExposureStatus};
pub use meta::{ObjectMeta, OwnerReference, WorkloadRef, API_GROUP};
pub use plan::{
    EnvMapping, FileProjection, OutputRef, PlanPhase, PlanTemplate, VolumeProjection,
    VolumeSource, WorkloadPlan, WorkloadPlanSpec, WorkloadPlanStatus, WorkloadProjection,
};
pub use workload::{
    validate_workload, ContainerResources, ContainerSpec, FileMount, RawParams, ResourceSpec,
    ServicePort, ServiceSpec, Workload, WorkloadSpec, WorkloadStatus,
};
