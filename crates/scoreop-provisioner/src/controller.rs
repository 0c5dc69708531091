use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scoreop_domain::{ClaimOutputs, ClaimPhase, DeprovisionPolicy, ReconcileAction, ResourceClaim};
use scoreop_store::event::{
    REASON_DEPROVISIONED, REASON_DEPROVISIONING, REASON_DEPROVISION_FAILED, REASON_PROVISIONED,
    REASON_PROVISIONING, REASON_PROVISION_FAILED,
};
use scoreop_store::{Event, ObjectStore};
use tracing::{debug, info, warn};

use crate::error::ProvisionerError;
use crate::registry::StrategyRegistry;
use crate::strategy::ProvisioningResult;

pub const PROVISIONER_FINALIZER: &str = "provisioner.score.dev/finalizer";

/// Poll cadences per phase, advisory to the host scheduler.
pub const PENDING_REQUEUE: Duration = Duration::from_secs(30);
pub const CLAIMING_REQUEUE: Duration = Duration::from_secs(10);
pub const BOUND_REQUEUE: Duration = Duration::from_secs(600);
pub const FAILED_REQUEUE: Duration = Duration::from_secs(300);
const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);
const DELETION_RETRY: Duration = Duration::from_secs(30);

const KIND: &str = "ResourceClaim";

/// False for a Bound claim whose spec is fully observed: there is no spec
/// work to do and only the periodic health poll remains. Deletion always
/// reconciles.
pub fn should_reconcile(claim: &ResourceClaim) -> bool {
    if claim.metadata.is_deleting() {
        return true;
    }
    !(claim.status.phase == Some(ClaimPhase::Bound)
        && claim.status.observed_generation == claim.metadata.generation)
}

fn transition(claim: &mut ResourceClaim, phase: ClaimPhase, reason: &str, message: &str) {
    let changed = claim.status.phase != Some(phase);
    claim.status.phase = Some(phase);
    claim.status.reason = reason.to_string();
    claim.status.message = message.to_string();
    if changed {
        claim.status.last_transition_time = Some(Utc::now());
    }
    claim.status.observed_generation = claim.metadata.generation;
}

fn set_outputs(claim: &mut ResourceClaim, outputs: Option<ClaimOutputs>) {
    claim.status.outputs_available = outputs.as_ref().is_some_and(|o| o.is_populated());
    claim.status.outputs = outputs;
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Drives one ResourceClaim toward Bound via its bound strategy, owning the
/// claim's status subresource and the provisioner finalizer.
pub struct ClaimReconciler {
    store: Arc<dyn ObjectStore>,
    registry: Arc<StrategyRegistry>,
}

impl ClaimReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<StrategyRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileAction, ProvisionerError> {
        let Some(mut claim) = self.store.get_claim(namespace, name).await? else {
            return Ok(ReconcileAction::Done);
        };

        if claim.metadata.is_deleting() {
            return self.finalize(claim).await;
        }

        if claim.metadata.add_finalizer(PROVISIONER_FINALIZER) {
            claim = match self.store.update_claim(&claim).await {
                Ok(stored) => stored,
                Err(e) if e.is_conflict() => return Ok(ReconcileAction::Requeue),
                Err(e) => return Err(e.into()),
            };
        }

        let Some(phase) = claim.status.phase else {
            transition(&mut claim, ClaimPhase::Pending, "Initializing", "Initializing");
            return self.persist(&claim, ReconcileAction::Requeue).await;
        };

        match phase {
            ClaimPhase::Pending => self.provision(claim).await,
            ClaimPhase::Claiming => self.poll_claiming(claim).await,
            ClaimPhase::Bound => {
                if claim.status.observed_generation != claim.metadata.generation {
                    debug!(claim = %claim.metadata.name, "spec drift on bound claim, re-provisioning");
                    self.provision(claim).await
                } else {
                    self.check_health(claim).await
                }
            }
            ClaimPhase::Failed => self.probe_recovery(claim).await,
        }
    }

    async fn provision(&self, mut claim: ResourceClaim) -> Result<ReconcileAction, ProvisionerError> {
        let (strategy, binding) = match self.registry.resolve(&claim.spec.resource_type) {
            Ok(resolved) => resolved,
            Err(e @ (ProvisionerError::UnboundType(_) | ProvisionerError::InvalidStrategy(_))) => {
                warn!(claim = %claim.metadata.name, error = %e, "no usable strategy");
                transition(&mut claim, ClaimPhase::Failed, "InvalidStrategy", &e.to_string());
                self.record_warning(&claim, REASON_PROVISION_FAILED, &e.to_string()).await?;
                return self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await;
            }
            Err(e) => return Err(e),
        };

        self.record_normal(
            &claim,
            REASON_PROVISIONING,
            format!("provisioning '{}' via {}", claim.spec.key, strategy.name()),
        )
        .await?;

        match strategy.provision(&claim, binding).await {
            Ok(result) => self.absorb(claim, result).await,
            Err(e) => {
                warn!(claim = %claim.metadata.name, error = %e, "provision failed");
                transition(&mut claim, ClaimPhase::Failed, "ProvisionFailed", &e.to_string());
                self.record_warning(&claim, REASON_PROVISION_FAILED, &e.to_string()).await?;
                self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await
            }
        }
    }

    async fn poll_claiming(&self, mut claim: ResourceClaim) -> Result<ReconcileAction, ProvisionerError> {
        let (strategy, binding) = match self.registry.resolve(&claim.spec.resource_type) {
            Ok(resolved) => resolved,
            Err(e) => {
                transition(&mut claim, ClaimPhase::Failed, "InvalidStrategy", &e.to_string());
                self.record_warning(&claim, REASON_PROVISION_FAILED, &e.to_string()).await?;
                return self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await;
            }
        };
        match strategy.get_status(&claim, binding).await {
            Ok(result) => self.absorb(claim, result).await,
            Err(e) => {
                transition(&mut claim, ClaimPhase::Failed, "ProvisionFailed", &e.to_string());
                self.record_warning(&claim, REASON_PROVISION_FAILED, &e.to_string()).await?;
                self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await
            }
        }
    }

    /// Fold a strategy report into the claim status and persist.
    async fn absorb(
        &self,
        mut claim: ResourceClaim,
        result: ProvisioningResult,
    ) -> Result<ReconcileAction, ProvisionerError> {
        match result.phase {
            ClaimPhase::Bound => {
                let outputs = result.outputs.unwrap_or_default();
                if !outputs.is_populated() {
                    let message = "strategy reported Bound without any populated output";
                    transition(&mut claim, ClaimPhase::Failed, "InvalidOutputs", message);
                    set_outputs(&mut claim, None);
                    self.record_warning(&claim, REASON_PROVISION_FAILED, message).await?;
                    return self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await;
                }
                let was_bound = claim.status.phase == Some(ClaimPhase::Bound);
                set_outputs(&mut claim, Some(outputs));
                transition(&mut claim, ClaimPhase::Bound, "Succeeded", &result.message);
                if !was_bound {
                    info!(claim = %claim.metadata.name, "claim bound");
                    self.record_normal(&claim, REASON_PROVISIONED, result.message.clone()).await?;
                }
                self.persist(&claim, ReconcileAction::RequeueAfter(BOUND_REQUEUE)).await
            }
            ClaimPhase::Claiming => {
                transition(&mut claim, ClaimPhase::Claiming, &result.reason, &result.message);
                let delay = result.requeue_after.unwrap_or(CLAIMING_REQUEUE);
                self.persist(&claim, ReconcileAction::RequeueAfter(delay)).await
            }
            ClaimPhase::Failed => {
                transition(&mut claim, ClaimPhase::Failed, &result.reason, &result.message);
                self.record_warning(&claim, REASON_PROVISION_FAILED, result.message.clone()).await?;
                self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await
            }
            ClaimPhase::Pending => {
                transition(&mut claim, ClaimPhase::Pending, &result.reason, &result.message);
                self.persist(&claim, ReconcileAction::RequeueAfter(PENDING_REQUEUE)).await
            }
        }
    }

    /// Periodic health poll for a Bound claim with an unchanged spec.
    async fn check_health(&self, mut claim: ResourceClaim) -> Result<ReconcileAction, ProvisionerError> {
        let (strategy, binding) = match self.registry.resolve(&claim.spec.resource_type) {
            Ok(resolved) => resolved,
            Err(e) => {
                transition(&mut claim, ClaimPhase::Failed, "InvalidStrategy", &e.to_string());
                self.record_warning(&claim, REASON_PROVISION_FAILED, &e.to_string()).await?;
                return self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await;
            }
        };
        match strategy.get_status(&claim, binding).await {
            Ok(result) if result.phase == ClaimPhase::Failed => {
                warn!(claim = %claim.metadata.name, reason = %result.reason, "bound claim unhealthy");
                transition(&mut claim, ClaimPhase::Failed, &result.reason, &result.message);
                self.record_warning(&claim, REASON_PROVISION_FAILED, result.message.clone()).await?;
                self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await
            }
            Ok(_) => Ok(ReconcileAction::RequeueAfter(BOUND_REQUEUE)),
            Err(e) => {
                transition(&mut claim, ClaimPhase::Failed, "HealthCheckFailed", &e.to_string());
                self.record_warning(&claim, REASON_PROVISION_FAILED, &e.to_string()).await?;
                self.persist(&claim, ReconcileAction::RequeueAfter(FAILED_REQUEUE)).await
            }
        }
    }

    /// Slow probe on a Failed claim; a recovering strategy sends it back
    /// through Claiming.
    async fn probe_recovery(&self, mut claim: ResourceClaim) -> Result<ReconcileAction, ProvisionerError> {
        let Ok((strategy, binding)) = self.registry.resolve(&claim.spec.resource_type) else {
            return Ok(ReconcileAction::RequeueAfter(FAILED_REQUEUE));
        };
        match strategy.get_status(&claim, binding).await {
            Ok(result) if matches!(result.phase, ClaimPhase::Bound | ClaimPhase::Claiming) => {
                info!(claim = %claim.metadata.name, "strategy reports recovery");
                transition(&mut claim, ClaimPhase::Claiming, "Retrying", "strategy reports recovery");
                self.record_normal(&claim, REASON_PROVISIONING, "retrying after failure").await?;
                self.persist(&claim, ReconcileAction::RequeueAfter(CLAIMING_REQUEUE)).await
            }
            _ => Ok(ReconcileAction::RequeueAfter(FAILED_REQUEUE)),
        }
    }

    /// Deletion: deprovision per policy, then release the finalizer.
    async fn finalize(&self, mut claim: ResourceClaim) -> Result<ReconcileAction, ProvisionerError> {
        if !claim.metadata.has_finalizer(PROVISIONER_FINALIZER) {
            return Ok(ReconcileAction::Done);
        }

        match claim.spec.deprovision_policy {
            DeprovisionPolicy::Delete => match self.registry.resolve(&claim.spec.resource_type) {
                Ok((strategy, binding)) => {
                    self.record_normal(&claim, REASON_DEPROVISIONING, "deprovisioning").await?;
                    if let Err(e) = strategy.deprovision(&claim, binding).await {
                        warn!(claim = %claim.metadata.name, error = %e, "deprovision failed");
                        self.record_warning(&claim, REASON_DEPROVISION_FAILED, &e.to_string()).await?;
                        return Ok(ReconcileAction::RequeueAfter(DELETION_RETRY));
                    }
                    self.record_normal(&claim, REASON_DEPROVISIONED, "deprovisioned").await?;
                }
                Err(e) => {
                    // Strategy gone from config: nothing left to tear down.
                    debug!(claim = %claim.metadata.name, error = %e, "releasing finalizer without strategy");
                }
            },
            policy => {
                debug!(claim = %claim.metadata.name, policy = %policy, "skipping deprovision per policy");
            }
        }

        claim.metadata.remove_finalizer(PROVISIONER_FINALIZER);
        match self.store.update_claim(&claim).await {
            Ok(_) => Ok(ReconcileAction::Done),
            Err(e) if e.is_conflict() => Ok(ReconcileAction::Requeue),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(
        &self,
        claim: &ResourceClaim,
        on_success: ReconcileAction,
    ) -> Result<ReconcileAction, ProvisionerError> {
        match self.store.update_claim_status(claim).await {
            Ok(_) => Ok(on_success),
            Err(e) if e.is_conflict() => Ok(ReconcileAction::RequeueAfter(CONFLICT_REQUEUE)),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_normal(
        &self,
        claim: &ResourceClaim,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<(), ProvisionerError> {
        self.store
            .record_event(&Event::normal(
                KIND,
                &claim.metadata.namespace,
                &claim.metadata.name,
                reason,
                message,
            ))
            .await?;
        Ok(())
    }

    async fn record_warning(
        &self,
        claim: &ResourceClaim,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<(), ProvisionerError> {
        self.store
            .record_event(&Event::warning(
                KIND,
                &claim.metadata.namespace,
                &claim.metadata.name,
                reason,
                message,
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scoreop_config::{parse_config, ProvisionerBinding, StrategyKind};
    use scoreop_domain::meta::ObjectMeta;
    use scoreop_domain::{ResourceClaimSpec, WorkloadRef};
    use scoreop_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::strategy::ProvisionerStrategy;

    fn config() -> scoreop_config::OrchestratorConfig {
        parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: a
        runtimeClass: kubernetes
        template: { kind: helm, ref: x }
provisioners:
  - type: postgres
    strategy: helm
    outputs:
      uri: "postgres://{{ .claimName }}.{{ .namespace }}:5432/app"
      secretRef: "{{ .claimName }}-credentials"
  - type: redis
    strategy: external-api
    outputs:
      uri: "redis://{{ .claimName }}:6379"
  - type: blob
    strategy: manifests
"#,
        )
        .unwrap()
    }

    fn claim(key: &str, resource_type: &str, policy: DeprovisionPolicy) -> ResourceClaim {
        ResourceClaim {
            metadata: ObjectMeta::new("default", format!("web-{key}")),
            spec: ResourceClaimSpec {
                workload_ref: WorkloadRef::new("default", "web"),
                key: key.into(),
                resource_type: resource_type.into(),
                deprovision_policy: policy,
                ..Default::default()
            },
            status: Default::default(),
        }
    }

    fn reconciler(store: &Arc<InMemoryStore>) -> ClaimReconciler {
        let registry = Arc::new(StrategyRegistry::from_config(&config()));
        ClaimReconciler::new(store.clone() as Arc<dyn ObjectStore>, registry)
    }

    async fn drive(rec: &ClaimReconciler, store: &InMemoryStore, name: &str, passes: usize) -> ResourceClaim {
        for _ in 0..passes {
            rec.reconcile("default", name).await.unwrap();
        }
        store.get_claim("default", name).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn helm_claim_goes_pending_then_bound() {
        let store = Arc::new(InMemoryStore::new());
        let rec = reconciler(&store);
        store.create_claim(&claim("db", "postgres", DeprovisionPolicy::Delete)).await.unwrap();

        let after_first = drive(&rec, &store, "web-db", 1).await;
        assert!(after_first.metadata.has_finalizer(PROVISIONER_FINALIZER));
        assert_eq!(after_first.status.phase, Some(ClaimPhase::Pending));
        assert_eq!(after_first.status.reason, "Initializing");

        let bound = drive(&rec, &store, "web-db", 1).await;
        assert_eq!(bound.status.phase, Some(ClaimPhase::Bound));
        assert!(bound.status.outputs_available);
        let outputs = bound.status.outputs.as_ref().unwrap();
        assert_eq!(outputs.uri.as_deref(), Some("postgres://web-db.default:5432/app"));
        assert_eq!(bound.status.observed_generation, bound.metadata.generation);

        let events = store.list_events(Some("ResourceClaim"), Some("web-db")).await.unwrap();
        assert!(events.iter().any(|e| e.reason == REASON_PROVISIONED));
    }

    #[tokio::test]
    async fn external_api_claim_passes_through_claiming() {
        let store = Arc::new(InMemoryStore::new());
        let rec = reconciler(&store);
        store.create_claim(&claim("cache", "redis", DeprovisionPolicy::Delete)).await.unwrap();

        let claiming = drive(&rec, &store, "web-cache", 2).await;
        assert_eq!(claiming.status.phase, Some(ClaimPhase::Claiming));

        let bound = drive(&rec, &store, "web-cache", 1).await;
        assert_eq!(bound.status.phase, Some(ClaimPhase::Bound));
        assert_eq!(
            bound.status.outputs.as_ref().unwrap().uri.as_deref(),
            Some("redis://web-cache:6379")
        );
    }

    #[tokio::test]
    async fn unbound_type_fails_with_invalid_strategy() {
        let store = Arc::new(InMemoryStore::new());
        let rec = reconciler(&store);
        store.create_claim(&claim("q", "rabbitmq", DeprovisionPolicy::Delete)).await.unwrap();

        let failed = drive(&rec, &store, "web-q", 2).await;
        assert_eq!(failed.status.phase, Some(ClaimPhase::Failed));
        assert_eq!(failed.status.reason, "InvalidStrategy");
        assert!(!failed.status.outputs_available);
    }

    #[tokio::test]
    async fn bound_without_outputs_fails_validation() {
        // The `blob` binding has no output templates, so the manifests stub
        // reports Bound with empty outputs.
        let store = Arc::new(InMemoryStore::new());
        let rec = reconciler(&store);
        store.create_claim(&claim("files", "blob", DeprovisionPolicy::Delete)).await.unwrap();

        let failed = drive(&rec, &store, "web-files", 2).await;
        assert_eq!(failed.status.phase, Some(ClaimPhase::Failed));
        assert_eq!(failed.status.reason, "InvalidOutputs");
    }

    #[tokio::test]
    async fn transition_time_moves_only_on_phase_change() {
        let store = Arc::new(InMemoryStore::new());
        let rec = reconciler(&store);
        store.create_claim(&claim("db", "postgres", DeprovisionPolicy::Delete)).await.unwrap();

        let bound = drive(&rec, &store, "web-db", 2).await;
        let t1 = bound.status.last_transition_time.unwrap();

        // Force a spec drift so the Bound branch re-provisions (still Bound).
        let mut drifted = bound.clone();
        drifted.spec.params = Some(scoreop_domain::workload::RawParams(serde_json::json!({"size": "large"})));
        store.update_claim(&drifted).await.unwrap();

        let rebound = drive(&rec, &store, "web-db", 1).await;
        assert_eq!(rebound.status.phase, Some(ClaimPhase::Bound));
        assert_eq!(rebound.status.last_transition_time.unwrap(), t1);
        assert_eq!(rebound.status.observed_generation, rebound.metadata.generation);
    }

    struct CountingStrategy {
        deprovisions: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProvisionerStrategy for CountingStrategy {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn provision(
            &self,
            claim: &ResourceClaim,
            binding: &ProvisionerBinding,
        ) -> Result<ProvisioningResult, ProvisionerError> {
            let outputs = crate::template::render_outputs(binding, &crate::template::TemplateContext::for_claim(claim));
            Ok(ProvisioningResult::bound(outputs, "ok"))
        }

        async fn deprovision(
            &self,
            _claim: &ResourceClaim,
            _binding: &ProvisionerBinding,
        ) -> Result<(), ProvisionerError> {
            self.deprovisions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get_status(
            &self,
            claim: &ResourceClaim,
            binding: &ProvisionerBinding,
        ) -> Result<ProvisioningResult, ProvisionerError> {
            self.provision(claim, binding).await
        }
    }

    async fn deletion_case(policy: DeprovisionPolicy) -> usize {
        let store = Arc::new(InMemoryStore::new());
        let deprovisions = Arc::new(AtomicUsize::new(0));
        let mut registry = StrategyRegistry::from_config(&config());
        registry.register(
            StrategyKind::Helm,
            Arc::new(CountingStrategy { deprovisions: deprovisions.clone() }),
        );
        let rec = ClaimReconciler::new(store.clone() as Arc<dyn ObjectStore>, Arc::new(registry));

        store.create_claim(&claim("db", "postgres", policy)).await.unwrap();
        drive(&rec, &store, "web-db", 2).await;

        store.delete_claim("default", "web-db").await.unwrap();
        rec.reconcile("default", "web-db").await.unwrap();
        assert!(store.get_claim("default", "web-db").await.unwrap().is_none());
        deprovisions.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn delete_policy_runs_deprovision() {
        assert_eq!(deletion_case(DeprovisionPolicy::Delete).await, 1);
    }

    #[tokio::test]
    async fn retain_policy_skips_deprovision() {
        assert_eq!(deletion_case(DeprovisionPolicy::Retain).await, 0);
    }

    #[test]
    fn should_reconcile_skips_settled_bound_claims() {
        let mut c = claim("db", "postgres", DeprovisionPolicy::Delete);
        c.metadata.generation = 3;
        c.status.phase = Some(ClaimPhase::Bound);
        c.status.observed_generation = 3;
        assert!(!should_reconcile(&c));

        c.status.observed_generation = 2;
        assert!(should_reconcile(&c));

        c.status.observed_generation = 3;
        c.metadata.deletion_timestamp = Some(Utc::now());
        assert!(should_reconcile(&c));

        c.metadata.deletion_timestamp = None;
        c.status.phase = Some(ClaimPhase::Failed);
        assert!(should_reconcile(&c));
    }
}
