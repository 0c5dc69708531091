use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scoreop_config::OrchestratorConfig;
use scoreop_domain::condition::{
    reason, CONDITION_CLAIMS_READY, CONDITION_INPUTS_VALID, CONDITION_READY,
};
use scoreop_domain::{
    compute_ready, get_condition, set_condition, validate_workload, ConditionStatus,
    DeprovisionPolicy, ReconcileAction, Workload, WorkloadStatus,
};
use scoreop_selector::select_profile;
use scoreop_store::event::{
    REASON_BINDING_PENDING, REASON_CLAIM_ERROR, REASON_DELETED,
};
use scoreop_store::{Event, ObjectStore};
use tracing::{debug, info, warn};

use crate::aggregate::aggregate_claims;
use crate::claims::ClaimManager;
use crate::error::ReconcileError;
use crate::exposure::ExposureRegistrar;
use crate::plan::PlanManager;
use crate::status::StatusManager;

pub const WORKLOAD_FINALIZER: &str = "workload.score.dev/finalizer";

/// The workload reconciler serializes all writers of Workload.status; the
/// host must not run it with more than one worker.
pub const MAX_CONCURRENT_RECONCILES: usize = 1;

const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);
const DELETION_REQUEUE: Duration = Duration::from_secs(30);
const WORKLOAD_KIND: &str = "Workload";

/// The ordered phases of a workload pass: Validation → Claim → Plan →
/// Status, or Deletion. Each pass works from observed state only, so
/// interleaved events cannot corrupt it.
pub struct WorkloadReconciler {
    store: Arc<dyn ObjectStore>,
    config: Arc<OrchestratorConfig>,
    claims: ClaimManager,
    plans: PlanManager,
    status: StatusManager,
    registrar: ExposureRegistrar,
}

impl WorkloadReconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: Arc<OrchestratorConfig>,
        cluster_domain: impl Into<String>,
    ) -> Self {
        Self {
            claims: ClaimManager::new(store.clone()),
            plans: PlanManager::new(store.clone(), config.clone()),
            status: StatusManager::new(store.clone(), cluster_domain),
            registrar: ExposureRegistrar::new(store.clone()),
            store,
            config,
        }
    }

    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileAction, ReconcileError> {
        match self.reconcile_inner(namespace, name).await {
            // Optimistic-concurrency losers reload on the next pass.
            Err(ReconcileError::Store(e)) if e.is_conflict() => {
                debug!(workload = %name, "write conflict, requeueing");
                Ok(ReconcileAction::RequeueAfter(CONFLICT_REQUEUE))
            }
            other => other,
        }
    }

    async fn reconcile_inner(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileAction, ReconcileError> {
        let Some(mut workload) = self.store.get_workload(namespace, name).await? else {
            return Ok(ReconcileAction::Done);
        };

        if workload.metadata.is_deleting() {
            return self.finalize(workload).await;
        }

        if workload.metadata.add_finalizer(WORKLOAD_FINALIZER) {
            workload = self.store.update_workload(&workload).await?;
        }

        let original_status = workload.status.clone();
        let now = Utc::now();

        // ── Validation phase ──────────────────────────────────────────────────
        if let Err(e) = validate_workload(&workload) {
            return self.fail_validation(&original_status, workload, &e.to_string()).await;
        }
        if let Err(e) = select_profile(&self.config, &workload) {
            return self.fail_validation(&original_status, workload, &e.to_string()).await;
        }
        set_condition(
            &mut workload.status.conditions,
            CONDITION_INPUTS_VALID,
            ConditionStatus::True,
            reason::SUCCEEDED,
            "spec validated",
            now,
        );

        // ── Claim phase ───────────────────────────────────────────────────────
        self.claims.ensure(&workload).await?;
        let claims = self.claims.list(&workload).await?;
        let aggregation = aggregate_claims(&claims);
        workload.status.claims = aggregation.summaries.clone();

        let previous = get_condition(&workload.status.conditions, CONDITION_CLAIMS_READY)
            .map(|c| (c.status, c.reason.clone()));
        let claims_status = if aggregation.ready { ConditionStatus::True } else { ConditionStatus::False };
        set_condition(
            &mut workload.status.conditions,
            CONDITION_CLAIMS_READY,
            claims_status,
            &aggregation.reason,
            &aggregation.message,
            now,
        );
        let claims_edge = previous
            .is_none_or(|(status, prev_reason)| status != claims_status || prev_reason != aggregation.reason);
        if claims_edge && !aggregation.ready {
            let (event_reason, event) = if aggregation.reason == reason::CLAIM_FAILED {
                (REASON_CLAIM_ERROR, Event::warning(
                    WORKLOAD_KIND, namespace, name, REASON_CLAIM_ERROR, aggregation.message.clone(),
                ))
            } else {
                (REASON_BINDING_PENDING, Event::normal(
                    WORKLOAD_KIND, namespace, name, REASON_BINDING_PENDING, aggregation.message.clone(),
                ))
            };
            debug!(workload = %name, reason = event_reason, "claims not ready");
            self.store.record_event(&event).await?;
        }

        // ── Plan phase ────────────────────────────────────────────────────────
        let plan = if aggregation.ready {
            self.plans.ensure(&mut workload, &claims).await?
        } else {
            self.store.get_plan(namespace, name).await?
        };

        // ── Exposure registration ─────────────────────────────────────────────
        let runtime_class = plan
            .as_ref()
            .map(|p| p.spec.runtime_class.clone())
            .unwrap_or_default();
        self.registrar.ensure(&workload, &runtime_class).await?;

        // ── Status phase ──────────────────────────────────────────────────────
        self.status.finish(&original_status, &mut workload, plan.as_ref()).await
    }

    /// Early exit: stamp SpecInvalid, recompute Ready, persist, and stop
    /// until the spec changes.
    async fn fail_validation(
        &self,
        original: &WorkloadStatus,
        mut workload: Workload,
        message: &str,
    ) -> Result<ReconcileAction, ReconcileError> {
        warn!(workload = %workload.metadata.name, message, "workload spec invalid");
        let now = Utc::now();
        set_condition(
            &mut workload.status.conditions,
            CONDITION_INPUTS_VALID,
            ConditionStatus::False,
            reason::SPEC_INVALID,
            message,
            now,
        );
        let summary = compute_ready(&workload.status.conditions);
        set_condition(
            &mut workload.status.conditions,
            CONDITION_READY,
            summary.status,
            &summary.reason,
            &summary.message,
            now,
        );
        if workload.status != *original {
            match self.store.update_workload_status(&workload).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => return Ok(ReconcileAction::RequeueAfter(CONFLICT_REQUEUE)),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ReconcileAction::Done)
    }

    /// Deletion phase: drop derived objects, drive owned claims away per
    /// policy, and release the workload finalizer once nothing is left.
    async fn finalize(&self, mut workload: Workload) -> Result<ReconcileAction, ReconcileError> {
        if !workload.metadata.has_finalizer(WORKLOAD_FINALIZER) {
            return Ok(ReconcileAction::Done);
        }
        let namespace = workload.metadata.namespace.clone();
        let name = workload.metadata.name.clone();

        for result in [
            self.store.delete_plan(&namespace, &name).await,
            self.store.delete_exposure(&namespace, &name).await,
        ] {
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let claims = self.store.list_claims_for_workload(&namespace, &name).await?;
        let mut blocking = 0usize;
        for claim in claims {
            if claim.spec.deprovision_policy == DeprovisionPolicy::Orphan {
                self.claims.detach(claim).await?;
                continue;
            }
            blocking += 1;
            if claim.metadata.is_deleting() {
                continue;
            }
            match self.store.delete_claim(&namespace, &claim.metadata.name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        if blocking > 0 {
            debug!(workload = %name, blocking, "waiting for owned claims to release");
            return Ok(ReconcileAction::RequeueAfter(DELETION_REQUEUE));
        }

        workload.metadata.remove_finalizer(WORKLOAD_FINALIZER);
        match self.store.update_workload(&workload).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => return Ok(ReconcileAction::Requeue),
            Err(e) if e.is_not_found() => return Ok(ReconcileAction::Done),
            Err(e) => return Err(e.into()),
        }
        info!(workload = %name, "workload finalized");
        self.store
            .record_event(&Event::normal(WORKLOAD_KIND, &namespace, &name, REASON_DELETED, "workload deleted"))
            .await?;
        Ok(ReconcileAction::Done)
    }
}
