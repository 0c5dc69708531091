use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scoreop_domain::condition::{reason, CONDITION_READY, CONDITION_RUNTIME_READY};
use scoreop_domain::{
    compute_ready, get_condition, set_condition, ConditionStatus, PlanPhase, ReconcileAction,
    Workload, WorkloadPlan, WorkloadStatus,
};
use scoreop_store::event::REASON_READY;
use scoreop_store::{Event, ObjectStore};
use tracing::{debug, info};

use crate::endpoint::derive_endpoint;
use crate::error::ReconcileError;

const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);
const NOT_READY_REQUEUE: Duration = Duration::from_secs(30);

/// Composes the final condition set, derives the endpoint, and performs the
/// single status write at the end of a pipeline pass.
pub struct StatusManager {
    store: Arc<dyn ObjectStore>,
    cluster_domain: String,
}

impl StatusManager {
    pub fn new(store: Arc<dyn ObjectStore>, cluster_domain: impl Into<String>) -> Self {
        Self { store, cluster_domain: cluster_domain.into() }
    }

    /// `original` is the status as fetched at the start of the pass; the
    /// write is skipped when nothing changed so an unchanged workload
    /// reconciles without a single store write.
    pub async fn finish(
        &self,
        original: &WorkloadStatus,
        workload: &mut Workload,
        plan: Option<&WorkloadPlan>,
    ) -> Result<ReconcileAction, ReconcileError> {
        let now = Utc::now();

        match plan {
            Some(plan) => {
                if let Some(endpoint) = derive_endpoint(workload, Some(plan), &self.cluster_domain) {
                    workload.status.endpoint = Some(endpoint);
                }
                let (status, runtime_reason, message) = runtime_readiness(workload, plan);
                set_condition(
                    &mut workload.status.conditions,
                    CONDITION_RUNTIME_READY,
                    status,
                    runtime_reason,
                    &message,
                    now,
                );
            }
            None => {
                // Leave a more specific verdict from the plan phase
                // (RuntimeSelecting with a cause, or ProjectionError) alone.
                let already_explained = get_condition(&workload.status.conditions, CONDITION_RUNTIME_READY)
                    .is_some_and(|c| {
                        c.status == ConditionStatus::False
                            && (c.reason == reason::RUNTIME_SELECTING
                                || c.reason == reason::PROJECTION_ERROR)
                    });
                if !already_explained {
                    set_condition(
                        &mut workload.status.conditions,
                        CONDITION_RUNTIME_READY,
                        ConditionStatus::False,
                        reason::RUNTIME_SELECTING,
                        "no deployment plan",
                        now,
                    );
                }
            }
        }

        let summary = compute_ready(&workload.status.conditions);
        let was_ready = get_condition(&original.conditions, CONDITION_READY)
            .is_some_and(|c| c.status == ConditionStatus::True);
        set_condition(
            &mut workload.status.conditions,
            CONDITION_READY,
            summary.status,
            &summary.reason,
            &summary.message,
            now,
        );
        let is_ready = summary.status == ConditionStatus::True;

        if workload.status != *original {
            match self.store.update_workload_status(workload).await {
                Ok(stored) => *workload = stored,
                Err(e) if e.is_conflict() => {
                    debug!(workload = %workload.metadata.name, "status write conflicted, requeueing");
                    return Ok(ReconcileAction::RequeueAfter(CONFLICT_REQUEUE));
                }
                Err(e) => return Err(e.into()),
            }
            if is_ready && !was_ready {
                info!(workload = %workload.metadata.name, "workload became ready");
                self.store
                    .record_event(&Event::normal(
                        "Workload",
                        &workload.metadata.namespace,
                        &workload.metadata.name,
                        REASON_READY,
                        "workload is ready",
                    ))
                    .await?;
            }
        }

        if is_ready {
            Ok(ReconcileAction::Done)
        } else {
            Ok(ReconcileAction::RequeueAfter(NOT_READY_REQUEUE))
        }
    }
}

/// Map the runtime's reported plan phase onto RuntimeReady. A plan rendered
/// from an older workload generation counts as still-selecting, and an
/// empty phase is Pending; nothing is inferred from cluster-side resources.
fn runtime_readiness(workload: &Workload, plan: &WorkloadPlan) -> (ConditionStatus, &'static str, String) {
    if plan.spec.observed_workload_generation < workload.metadata.generation {
        return (
            ConditionStatus::False,
            reason::RUNTIME_SELECTING,
            "plan is stale, re-rendering".to_string(),
        );
    }
    match plan.status.phase {
        Some(PlanPhase::Ready) => (
            ConditionStatus::True,
            reason::SUCCEEDED,
            "runtime reports ready".to_string(),
        ),
        Some(PlanPhase::Failed) => (
            ConditionStatus::False,
            reason::RUNTIME_DEGRADED,
            plan.status.message.clone(),
        ),
        Some(PlanPhase::Provisioning) => (
            ConditionStatus::False,
            reason::RUNTIME_PROVISIONING,
            "runtime is provisioning".to_string(),
        ),
        Some(PlanPhase::Pending) | None => (
            ConditionStatus::False,
            reason::RUNTIME_SELECTING,
            "runtime has not started provisioning".to_string(),
        ),
    }
}
