use async_trait::async_trait;
use scoreop_domain::{ResourceClaim, Workload, WorkloadExposure, WorkloadPlan};

use crate::error::StoreError;
use crate::event::Event;

/// The wire-level contract against the host object store.
///
/// Spec and status are separate subresources: `update_*` writes spec and
/// metadata and leaves status untouched, `update_*_status` writes status
/// only. Every write checks the caller's `resource_version` and fails with
/// [`StoreError::Conflict`] when it is stale.
///
/// Deletion is finalizer-gated: `delete_*` stamps `deletion_timestamp` while
/// finalizers remain and removes the object once the last one is stripped.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    // ── Workloads ─────────────────────────────────────────────────────────────

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Option<Workload>, StoreError>;
    async fn list_workloads(&self, namespace: Option<&str>) -> Result<Vec<Workload>, StoreError>;
    async fn create_workload(&self, workload: &Workload) -> Result<Workload, StoreError>;
    async fn update_workload(&self, workload: &Workload) -> Result<Workload, StoreError>;
    async fn update_workload_status(&self, workload: &Workload) -> Result<Workload, StoreError>;
    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // ── ResourceClaims ────────────────────────────────────────────────────────

    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<ResourceClaim>, StoreError>;
    /// Indexed lookup by the claim spec's workload back-reference: O(k) in
    /// the workload's claim count, not O(N) in cluster size.
    async fn list_claims_for_workload(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<ResourceClaim>, StoreError>;
    async fn create_claim(&self, claim: &ResourceClaim) -> Result<ResourceClaim, StoreError>;
    async fn update_claim(&self, claim: &ResourceClaim) -> Result<ResourceClaim, StoreError>;
    async fn update_claim_status(&self, claim: &ResourceClaim) -> Result<ResourceClaim, StoreError>;
    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // ── WorkloadPlans ─────────────────────────────────────────────────────────

    async fn get_plan(&self, namespace: &str, name: &str) -> Result<Option<WorkloadPlan>, StoreError>;
    async fn list_plans_for_workload(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<WorkloadPlan>, StoreError>;
    async fn create_plan(&self, plan: &WorkloadPlan) -> Result<WorkloadPlan, StoreError>;
    async fn update_plan(&self, plan: &WorkloadPlan) -> Result<WorkloadPlan, StoreError>;
    async fn update_plan_status(&self, plan: &WorkloadPlan) -> Result<WorkloadPlan, StoreError>;
    async fn delete_plan(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // ── WorkloadExposures ─────────────────────────────────────────────────────

    async fn get_exposure(&self, namespace: &str, name: &str) -> Result<Option<WorkloadExposure>, StoreError>;
    async fn create_exposure(&self, exposure: &WorkloadExposure) -> Result<WorkloadExposure, StoreError>;
    async fn update_exposure(&self, exposure: &WorkloadExposure) -> Result<WorkloadExposure, StoreError>;
    async fn update_exposure_status(&self, exposure: &WorkloadExposure) -> Result<WorkloadExposure, StoreError>;
    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // ── Events ────────────────────────────────────────────────────────────────

    async fn record_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn list_events(
        &self,
        object_kind: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<Event>, StoreError>;
}
