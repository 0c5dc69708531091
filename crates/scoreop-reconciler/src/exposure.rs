use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scoreop_domain::meta::{ObjectMeta, OwnerReference};
use scoreop_domain::{
    normalize_reason, set_condition, ReconcileAction, Workload, WorkloadExposure,
    WorkloadExposureSpec, WorkloadRef,
};
use scoreop_store::event::{
    REASON_ENDPOINT_CLEARED, REASON_ENDPOINT_MIRRORED, REASON_EXPOSURE_REGISTERED,
    REASON_EXPOSURE_UPDATED,
};
use scoreop_store::{Event, ObjectStore};
use tracing::{debug, info, warn};

use crate::endpoint::validate_endpoint;
use crate::error::ReconcileError;

const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);
const EXPOSURE_KIND: &str = "WorkloadExposure";
const WORKLOAD_KIND: &str = "Workload";

// ── Registrar ─────────────────────────────────────────────────────────────────

/// Maintains the spec-only WorkloadExposure object that runtimes write
/// their observed endpoints into. Status is never touched here.
pub struct ExposureRegistrar {
    store: Arc<dyn ObjectStore>,
}

impl ExposureRegistrar {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn ensure(&self, workload: &Workload, runtime_class: &str) -> Result<(), ReconcileError> {
        if workload.metadata.is_deleting() {
            return Ok(());
        }
        let namespace = &workload.metadata.namespace;
        let name = &workload.metadata.name;

        let desired = WorkloadExposureSpec {
            workload_ref: WorkloadRef {
                name: name.clone(),
                namespace: namespace.clone(),
                uid: workload.metadata.uid,
            },
            runtime_class: runtime_class.to_string(),
            observed_workload_generation: workload.metadata.generation,
        };

        match self.store.get_exposure(namespace, name).await? {
            None => {
                let mut metadata = ObjectMeta::new(namespace.clone(), name.clone());
                metadata.owner_references.push(OwnerReference::controller_of(
                    WORKLOAD_KIND,
                    name,
                    workload.metadata.uid,
                ));
                let exposure = WorkloadExposure { metadata, spec: desired, status: Default::default() };
                self.store.create_exposure(&exposure).await?;
                info!(workload = %name, "exposure registered");
                self.store
                    .record_event(&Event::normal(
                        EXPOSURE_KIND,
                        namespace,
                        name,
                        REASON_EXPOSURE_REGISTERED,
                        "exposure registered",
                    ))
                    .await?;
            }
            Some(mut existing) => {
                if existing.spec != desired {
                    existing.spec = desired;
                    self.store.update_exposure(&existing).await?;
                    debug!(workload = %name, "exposure spec refreshed");
                    self.store
                        .record_event(&Event::normal(
                            EXPOSURE_KIND,
                            namespace,
                            name,
                            REASON_EXPOSURE_UPDATED,
                            "exposure spec refreshed",
                        ))
                        .await?;
                }
            }
        }
        Ok(())
    }
}

// ── Mirror ────────────────────────────────────────────────────────────────────

/// Mirrors runtime-observed endpoints and conditions from a
/// WorkloadExposure back onto its Workload, guarding against name reuse and
/// stale observations.
pub struct ExposureMirror {
    store: Arc<dyn ObjectStore>,
}

impl ExposureMirror {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileAction, ReconcileError> {
        let Some(exposure) = self.store.get_exposure(namespace, name).await? else {
            return Ok(ReconcileAction::Done);
        };
        let workload_ref = &exposure.spec.workload_ref;
        let Some(mut workload) = self
            .store
            .get_workload(&workload_ref.namespace, &workload_ref.name)
            .await?
        else {
            debug!(exposure = %name, "referenced workload does not exist");
            return Ok(ReconcileAction::Done);
        };

        if let Some(expected_uid) = workload_ref.uid {
            if workload.metadata.uid != Some(expected_uid) {
                warn!(exposure = %name, "workload UID mismatch, ignoring exposure");
                return Ok(ReconcileAction::Done);
            }
        }
        if exposure.spec.observed_workload_generation < workload.metadata.generation {
            debug!(
                exposure = %name,
                observed = exposure.spec.observed_workload_generation,
                current = workload.metadata.generation,
                "stale exposure, skipping"
            );
            return Ok(ReconcileAction::Done);
        }

        let original = workload.status.clone();
        let mut events = Vec::new();

        if exposure.status.exposures.is_empty() {
            if workload.status.endpoint.take().is_some() {
                events.push((REASON_ENDPOINT_CLEARED, "endpoint cleared".to_string()));
            }
        } else {
            let first = &exposure.status.exposures[0];
            if validate_endpoint(&first.url) {
                if workload.status.endpoint.as_deref() != Some(first.url.as_str()) {
                    workload.status.endpoint = Some(first.url.clone());
                    events.push((REASON_ENDPOINT_MIRRORED, format!("endpoint {}", first.url)));
                }
            } else {
                debug!(exposure = %name, url = %first.url, "invalid exposure URL, keeping current endpoint");
            }
        }

        let now = Utc::now();
        for condition in &exposure.status.conditions {
            set_condition(
                &mut workload.status.conditions,
                &condition.condition_type,
                condition.status,
                normalize_reason(&condition.reason),
                &condition.message,
                now,
            );
        }

        if workload.status != original {
            match self.store.update_workload_status(&workload).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => return Ok(ReconcileAction::RequeueAfter(CONFLICT_REQUEUE)),
                Err(e) => return Err(e.into()),
            }
            for (event_reason, message) in events {
                self.store
                    .record_event(&Event::normal(
                        WORKLOAD_KIND,
                        &workload.metadata.namespace,
                        &workload.metadata.name,
                        event_reason,
                        message,
                    ))
                    .await?;
            }
        }

        Ok(ReconcileAction::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreop_domain::{
        Condition, ConditionStatus, ContainerSpec, ExposureEntry, WorkloadSpec,
    };
    use scoreop_store::InMemoryStore;
    use uuid::Uuid;

    fn workload() -> Workload {
        let mut spec = WorkloadSpec::default();
        spec.containers.insert(
            "app".into(),
            ContainerSpec { image: "nginx:latest".into(), ..Default::default() },
        );
        Workload::new("default", "web", spec)
    }

    async fn setup() -> (Arc<InMemoryStore>, Workload) {
        let store = Arc::new(InMemoryStore::new());
        let stored = store.create_workload(&workload()).await.unwrap();
        (store, stored)
    }

    #[tokio::test]
    async fn registrar_creates_and_refreshes() {
        let (store, stored) = setup().await;
        let registrar = ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>);

        registrar.ensure(&stored, "kubernetes").await.unwrap();
        let exposure = store.get_exposure("default", "web").await.unwrap().unwrap();
        assert_eq!(exposure.spec.runtime_class, "kubernetes");
        assert_eq!(exposure.spec.workload_ref.uid, stored.metadata.uid);
        assert_eq!(exposure.spec.observed_workload_generation, 1);

        // Unchanged ensure writes nothing.
        registrar.ensure(&stored, "kubernetes").await.unwrap();
        let unchanged = store.get_exposure("default", "web").await.unwrap().unwrap();
        assert_eq!(unchanged.metadata.resource_version, exposure.metadata.resource_version);

        // Generation bump patches the spec.
        let mut drifted = stored.clone();
        drifted.spec.containers.get_mut("app").unwrap().image = "nginx:1.27".into();
        let drifted = store.update_workload(&drifted).await.unwrap();
        registrar.ensure(&drifted, "kubernetes").await.unwrap();
        let refreshed = store.get_exposure("default", "web").await.unwrap().unwrap();
        assert_eq!(refreshed.spec.observed_workload_generation, 2);
    }

    async fn write_exposure_status(
        store: &InMemoryStore,
        entries: Vec<ExposureEntry>,
        observed_generation: Option<i64>,
    ) {
        let mut exposure = store.get_exposure("default", "web").await.unwrap().unwrap();
        if let Some(generation) = observed_generation {
            exposure.spec.observed_workload_generation = generation;
            exposure = store.update_exposure(&exposure).await.unwrap();
        }
        exposure.status.exposures = entries;
        store.update_exposure_status(&exposure).await.unwrap();
    }

    #[tokio::test]
    async fn mirror_publishes_first_valid_url() {
        let (store, stored) = setup().await;
        ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>)
            .ensure(&stored, "kubernetes")
            .await
            .unwrap();
        write_exposure_status(
            &store,
            vec![ExposureEntry { url: "https://web.example.com".into(), ready: true }],
            None,
        )
        .await;

        let mirror = ExposureMirror::new(store.clone() as Arc<dyn ObjectStore>);
        mirror.reconcile("default", "web").await.unwrap();

        let workload = store.get_workload("default", "web").await.unwrap().unwrap();
        assert_eq!(workload.status.endpoint.as_deref(), Some("https://web.example.com"));
        let events = store.list_events(Some("Workload"), Some("web")).await.unwrap();
        assert!(events.iter().any(|e| e.reason == REASON_ENDPOINT_MIRRORED));
    }

    #[tokio::test]
    async fn mirror_ignores_stale_generation() {
        let (store, stored) = setup().await;
        ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>)
            .ensure(&stored, "kubernetes")
            .await
            .unwrap();

        // Workload moves to generation 2; exposure still observed 1.
        let mut drifted = stored.clone();
        drifted.spec.containers.get_mut("app").unwrap().image = "nginx:1.27".into();
        store.update_workload(&drifted).await.unwrap();
        write_exposure_status(
            &store,
            vec![ExposureEntry { url: "https://stale".into(), ready: true }],
            None,
        )
        .await;

        ExposureMirror::new(store.clone() as Arc<dyn ObjectStore>)
            .reconcile("default", "web")
            .await
            .unwrap();
        let workload = store.get_workload("default", "web").await.unwrap().unwrap();
        assert_eq!(workload.status.endpoint, None);
    }

    #[tokio::test]
    async fn mirror_ignores_uid_mismatch() {
        let (store, stored) = setup().await;
        let registrar = ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>);
        registrar.ensure(&stored, "kubernetes").await.unwrap();

        // Simulate a name-reuse race: the exposure references another UID.
        let mut exposure = store.get_exposure("default", "web").await.unwrap().unwrap();
        exposure.spec.workload_ref.uid = Some(Uuid::new_v4());
        let exposure = store.update_exposure(&exposure).await.unwrap();
        let mut with_status = exposure.clone();
        with_status.status.exposures =
            vec![ExposureEntry { url: "https://imposter".into(), ready: true }];
        store.update_exposure_status(&with_status).await.unwrap();

        ExposureMirror::new(store.clone() as Arc<dyn ObjectStore>)
            .reconcile("default", "web")
            .await
            .unwrap();
        let workload = store.get_workload("default", "web").await.unwrap().unwrap();
        assert_eq!(workload.status.endpoint, None);
    }

    #[tokio::test]
    async fn mirror_rejects_url_without_host() {
        let (store, stored) = setup().await;
        ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>)
            .ensure(&stored, "kubernetes")
            .await
            .unwrap();
        write_exposure_status(
            &store,
            vec![ExposureEntry { url: "https://".into(), ready: true }],
            None,
        )
        .await;

        ExposureMirror::new(store.clone() as Arc<dyn ObjectStore>)
            .reconcile("default", "web")
            .await
            .unwrap();
        let workload = store.get_workload("default", "web").await.unwrap().unwrap();
        assert_eq!(workload.status.endpoint, None);
    }

    #[tokio::test]
    async fn mirror_clears_endpoint_when_list_empties() {
        let (store, stored) = setup().await;
        ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>)
            .ensure(&stored, "kubernetes")
            .await
            .unwrap();
        let mirror = ExposureMirror::new(store.clone() as Arc<dyn ObjectStore>);

        write_exposure_status(
            &store,
            vec![ExposureEntry { url: "https://web.example.com".into(), ready: true }],
            None,
        )
        .await;
        mirror.reconcile("default", "web").await.unwrap();

        write_exposure_status(&store, vec![], None).await;
        mirror.reconcile("default", "web").await.unwrap();

        let workload = store.get_workload("default", "web").await.unwrap().unwrap();
        assert_eq!(workload.status.endpoint, None);
        let events = store.list_events(Some("Workload"), Some("web")).await.unwrap();
        assert!(events.iter().any(|e| e.reason == REASON_ENDPOINT_CLEARED));
    }

    #[tokio::test]
    async fn mirror_normalizes_vendor_reasons() {
        let (store, stored) = setup().await;
        ExposureRegistrar::new(store.clone() as Arc<dyn ObjectStore>)
            .ensure(&stored, "kubernetes")
            .await
            .unwrap();

        let mut exposure = store.get_exposure("default", "web").await.unwrap().unwrap();
        exposure.status.conditions.push(Condition {
            condition_type: "RuntimeReady".into(),
            status: ConditionStatus::True,
            reason: "Available".into(),
            message: "deployment available".into(),
            last_transition_time: Utc::now(),
        });
        store.update_exposure_status(&exposure).await.unwrap();

        ExposureMirror::new(store.clone() as Arc<dyn ObjectStore>)
            .reconcile("default", "web")
            .await
            .unwrap();
        let workload = store.get_workload("default", "web").await.unwrap().unwrap();
        let cond = scoreop_domain::get_condition(&workload.status.conditions, "RuntimeReady").unwrap();
        assert_eq!(cond.reason, "Succeeded");
        assert_eq!(cond.message, "deployment available");
    }
}
