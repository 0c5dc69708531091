use std::sync::Arc;

use chrono::Utc;
use scoreop_config::OrchestratorConfig;
use scoreop_domain::condition::{reason, CONDITION_RUNTIME_READY};
use scoreop_domain::meta::{ObjectMeta, OwnerReference};
use scoreop_domain::{
    set_condition, ConditionStatus, PlanTemplate, ResourceClaim, Workload, WorkloadPlan,
    WorkloadPlanSpec, WorkloadRef, WorkloadSpec,
};
use scoreop_selector::select_backend;
use scoreop_store::event::{REASON_PLAN_CREATED, REASON_PLAN_ERROR, REASON_PROJECTION_ERROR};
use scoreop_store::{canonical_hash, Event, ObjectStore};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::projection::{build_projection, check_feasibility};

const WORKLOAD_KIND: &str = "Workload";

// ── Values composition ────────────────────────────────────────────────────────

/// `defaults ⊕ normalized(workload) ⊕ outputs`, right wins: maps recurse,
/// scalars and lists replace.
pub fn compose_values(
    defaults: &Value,
    spec: &WorkloadSpec,
    claims: &[ResourceClaim],
) -> Value {
    let workload_view = serde_json::to_value(spec).unwrap_or(Value::Null);
    let merged = deep_merge(defaults.clone(), workload_view);

    let mut outputs_overlay = serde_json::json!({});
    for claim in claims {
        if let Some(outputs) = &claim.status.outputs {
            let rendered = serde_json::to_value(outputs).unwrap_or(Value::Null);
            outputs_overlay["resources"][claim.spec.key.as_str()]["outputs"] = rendered;
        }
    }
    deep_merge(merged, outputs_overlay)
}

fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

// ── Plan manager ──────────────────────────────────────────────────────────────

/// Renders and upserts the single WorkloadPlan for a workload once all
/// claims are bound: backend selection, projection feasibility, values
/// composition, idempotent write.
pub struct PlanManager {
    store: Arc<dyn ObjectStore>,
    config: Arc<OrchestratorConfig>,
}

impl PlanManager {
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<OrchestratorConfig>) -> Self {
        Self { store, config }
    }

    /// Precondition: the claim aggregation reported ready. Failure paths set
    /// the RuntimeReady condition on the in-memory workload and return no
    /// plan; the status phase persists them.
    pub async fn ensure(
        &self,
        workload: &mut Workload,
        claims: &[ResourceClaim],
    ) -> Result<Option<WorkloadPlan>, ReconcileError> {
        let namespace = workload.metadata.namespace.clone();
        let name = workload.metadata.name.clone();

        let backend = match select_backend(&self.config, workload) {
            Ok(backend) => backend,
            Err(e) => {
                warn!(workload = %name, error = %e, "backend selection failed");
                set_condition(
                    &mut workload.status.conditions,
                    CONDITION_RUNTIME_READY,
                    ConditionStatus::False,
                    reason::RUNTIME_SELECTING,
                    &e.to_string(),
                    Utc::now(),
                );
                self.store
                    .record_event(&Event::warning(
                        WORKLOAD_KIND,
                        &namespace,
                        &name,
                        REASON_PLAN_ERROR,
                        e.to_string(),
                    ))
                    .await?;
                return Ok(None);
            }
        };

        if let Err(violation) = check_feasibility(&workload.spec, claims) {
            warn!(workload = %name, violation = %violation, "projection infeasible");
            set_condition(
                &mut workload.status.conditions,
                CONDITION_RUNTIME_READY,
                ConditionStatus::False,
                reason::PROJECTION_ERROR,
                &violation,
                Utc::now(),
            );
            self.store
                .record_event(&Event::warning(
                    WORKLOAD_KIND,
                    &namespace,
                    &name,
                    REASON_PROJECTION_ERROR,
                    violation,
                ))
                .await?;
            return Ok(None);
        }

        let desired_spec = WorkloadPlanSpec {
            workload_ref: WorkloadRef::new(namespace.clone(), name.clone()),
            observed_workload_generation: workload.metadata.generation,
            runtime_class: backend.runtime_class.clone(),
            template: PlanTemplate {
                kind: backend.template.kind.clone(),
                template_ref: backend.template.template_ref.clone(),
            },
            values: compose_values(&backend.template.values, &workload.spec, claims),
            projection: build_projection(&workload.spec, claims),
            claims: claims.iter().map(|c| c.metadata.name.clone()).collect(),
        };

        // A second plan for the same workload would be a bug somewhere;
        // refuse to make it worse.
        let existing_plans = self.store.list_plans_for_workload(&namespace, &name).await?;
        if existing_plans.iter().any(|p| p.metadata.name != name) {
            return Err(ReconcileError::Internal(format!(
                "multiple plans found for workload '{namespace}/{name}'"
            )));
        }

        match self.store.get_plan(&namespace, &name).await? {
            None => {
                let mut metadata = ObjectMeta::new(namespace.clone(), name.clone());
                metadata.owner_references.push(OwnerReference::controller_of(
                    WORKLOAD_KIND,
                    &name,
                    workload.metadata.uid,
                ));
                let plan = WorkloadPlan { metadata, spec: desired_spec, status: Default::default() };
                let stored = self.store.create_plan(&plan).await?;
                info!(workload = %name, backend = %backend.backend_id, "plan created");
                self.store
                    .record_event(&Event::normal(
                        WORKLOAD_KIND,
                        &namespace,
                        &name,
                        REASON_PLAN_CREATED,
                        format!("plan rendered for backend '{}'", backend.backend_id),
                    ))
                    .await?;
                Ok(Some(stored))
            }
            Some(mut existing) => {
                if canonical_hash(&existing.spec) == canonical_hash(&desired_spec) {
                    debug!(workload = %name, "plan unchanged");
                    return Ok(Some(existing));
                }
                existing.spec = desired_spec;
                let stored = self.store.update_plan(&existing).await?;
                info!(workload = %name, "plan re-rendered");
                Ok(Some(stored))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreop_config::parse_config;
    use scoreop_domain::{ClaimOutputs, ContainerSpec, ResourceClaimSpec, ServicePort, ServiceSpec};
    use scoreop_store::InMemoryStore;

    fn config() -> Arc<OrchestratorConfig> {
        Arc::new(
            parse_config(
                r#"
profiles:
  - name: web-service
    backends:
      - backendId: k8s
        runtimeClass: kubernetes
        priority: 100
        version: "1.0.0"
        template:
          kind: helm
          ref: oci://charts/web
          values:
            replicas: 2
"#,
            )
            .unwrap(),
        )
    }

    fn workload() -> Workload {
        let mut spec = WorkloadSpec::default();
        spec.containers.insert(
            "app".into(),
            ContainerSpec { image: "nginx:latest".into(), ..Default::default() },
        );
        spec.service = Some(ServiceSpec { ports: vec![ServicePort::new(8080)] });
        Workload::new("default", "web", spec)
    }

    fn bound_claim(key: &str) -> ResourceClaim {
        let mut claim = ResourceClaim {
            metadata: ObjectMeta::new("default", format!("web-{key}")),
            spec: ResourceClaimSpec {
                workload_ref: WorkloadRef::new("default", "web"),
                key: key.into(),
                resource_type: "postgres".into(),
                ..Default::default()
            },
            status: Default::default(),
        };
        claim.status.outputs = Some(ClaimOutputs {
            uri: Some("postgres://db:5432/app".into()),
            ..Default::default()
        });
        claim.status.outputs_available = true;
        claim
    }

    #[test]
    fn compose_values_is_right_biased() {
        let defaults = serde_json::json!({"replicas": 2, "service": {"type": "ClusterIP"}});
        let mut spec = WorkloadSpec::default();
        spec.containers.insert(
            "app".into(),
            ContainerSpec { image: "nginx:latest".into(), ..Default::default() },
        );
        let values = compose_values(&defaults, &spec, &[]);
        // Disjoint keys survive from both sides.
        assert_eq!(values["replicas"], 2);
        assert_eq!(values["containers"]["app"]["image"], "nginx:latest");
        // `service` from the workload view (null here) replaces the default map.
        assert!(values["service"].is_null());
    }

    #[test]
    fn compose_values_overlays_claim_outputs() {
        let spec = {
            let mut s = WorkloadSpec::default();
            s.containers.insert(
                "app".into(),
                ContainerSpec { image: "nginx:latest".into(), ..Default::default() },
            );
            s.resources.insert(
                "db".into(),
                scoreop_domain::ResourceSpec { resource_type: "postgres".into(), ..Default::default() },
            );
            s
        };
        let values = compose_values(&serde_json::json!({}), &spec, &[bound_claim("db")]);
        assert_eq!(values["resources"]["db"]["type"], "postgres");
        assert_eq!(
            values["resources"]["db"]["outputs"]["uri"],
            "postgres://db:5432/app"
        );
    }

    #[tokio::test]
    async fn first_ensure_creates_the_plan() {
        let store = Arc::new(InMemoryStore::new());
        let mut workload = store.create_workload(&workload()).await.unwrap();
        let manager = PlanManager::new(store.clone() as Arc<dyn ObjectStore>, config());

        let plan = manager
            .ensure(&mut workload, &[bound_claim("db")])
            .await
            .unwrap()
            .expect("plan should be created");
        assert_eq!(plan.metadata.name, "web");
        assert_eq!(plan.spec.runtime_class, "kubernetes");
        assert_eq!(plan.spec.observed_workload_generation, 1);
        assert_eq!(plan.spec.claims, vec!["web-db".to_string()]);
        assert_eq!(plan.spec.values["replicas"], 2);
    }

    #[tokio::test]
    async fn unchanged_ensure_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let mut workload = store.create_workload(&workload()).await.unwrap();
        let manager = PlanManager::new(store.clone() as Arc<dyn ObjectStore>, config());
        let claims = vec![bound_claim("db")];

        let first = manager.ensure(&mut workload, &claims).await.unwrap().unwrap();
        let second = manager.ensure(&mut workload, &claims).await.unwrap().unwrap();
        assert_eq!(first.metadata.resource_version, second.metadata.resource_version);
    }

    #[tokio::test]
    async fn infeasible_projection_blocks_the_plan() {
        let store = Arc::new(InMemoryStore::new());
        let mut w = workload();
        w.spec
            .containers
            .get_mut("app")
            .unwrap()
            .variables
            .insert("DB_HOST".into(), "${resources.db.outputs.host}".into());
        let mut w = store.create_workload(&w).await.unwrap();
        let manager = PlanManager::new(store.clone() as Arc<dyn ObjectStore>, config());

        let plan = manager.ensure(&mut w, &[bound_claim("db")]).await.unwrap();
        assert!(plan.is_none());
        assert!(store.get_plan("default", "web").await.unwrap().is_none());

        let cond = scoreop_domain::get_condition(&w.status.conditions, CONDITION_RUNTIME_READY).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, reason::PROJECTION_ERROR);

        let events = store.list_events(Some("Workload"), Some("web")).await.unwrap();
        assert!(events.iter().any(|e| e.reason == REASON_PROJECTION_ERROR));
    }
}
