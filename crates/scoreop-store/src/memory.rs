use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use scoreop_domain::meta::ObjectMeta;
use scoreop_domain::{ResourceClaim, Workload, WorkloadExposure, WorkloadPlan};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::Event;
use crate::store::ObjectStore;

/// `(namespace, name)`.
type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

// ── Stored-object plumbing ────────────────────────────────────────────────────

/// Uniform access to the four record kinds so the concurrency, subresource,
/// and deletion rules are written once.
trait StoredObject: Clone + Send {
    const KIND: &'static str;
    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    fn spec_json(&self) -> serde_json::Value;
    fn copy_status_from(&mut self, source: &Self);
    fn reset_status(&mut self);
}

macro_rules! impl_stored_object {
    ($ty:ty, $kind:literal) => {
        impl StoredObject for $ty {
            const KIND: &'static str = $kind;

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }

            fn spec_json(&self) -> serde_json::Value {
                serde_json::to_value(&self.spec).unwrap_or(serde_json::Value::Null)
            }

            fn copy_status_from(&mut self, source: &Self) {
                self.status = source.status.clone();
            }

            fn reset_status(&mut self) {
                self.status = Default::default();
            }
        }
    };
}

impl_stored_object!(Workload, "Workload");
impl_stored_object!(ResourceClaim, "ResourceClaim");
impl_stored_object!(WorkloadPlan, "WorkloadPlan");
impl_stored_object!(WorkloadExposure, "WorkloadExposure");

fn bump_resource_version(meta: &mut ObjectMeta) {
    let next = meta.resource_version.parse::<u64>().unwrap_or(0) + 1;
    meta.resource_version = next.to_string();
}

fn check_resource_version<T: StoredObject>(stored: &T, incoming: &T) -> Result<(), StoreError> {
    if stored.meta().resource_version != incoming.meta().resource_version {
        return Err(StoreError::Conflict {
            kind: T::KIND,
            name: incoming.meta().name.clone(),
        });
    }
    Ok(())
}

fn create_keyed<T: StoredObject>(map: &mut HashMap<Key, T>, incoming: &T) -> Result<T, StoreError> {
    let k = key(&incoming.meta().namespace, &incoming.meta().name);
    if map.contains_key(&k) {
        return Err(StoreError::AlreadyExists { kind: T::KIND, name: incoming.meta().name.clone() });
    }
    let mut stored = incoming.clone();
    {
        let meta = stored.meta_mut();
        meta.uid = Some(Uuid::new_v4());
        meta.generation = 1;
        meta.resource_version = "1".to_string();
        meta.creation_timestamp = Some(Utc::now());
        meta.deletion_timestamp = None;
    }
    stored.reset_status();
    map.insert(k, stored.clone());
    Ok(stored)
}

/// Spec-and-metadata write. Returns the stored copy plus the object itself
/// when the write completed a finalizer-gated deletion.
fn update_keyed<T: StoredObject>(
    map: &mut HashMap<Key, T>,
    incoming: &T,
) -> Result<(T, Option<T>), StoreError> {
    let k = key(&incoming.meta().namespace, &incoming.meta().name);
    let old = map.get(&k).ok_or(StoreError::NotFound {
        kind: T::KIND,
        name: incoming.meta().name.clone(),
    })?;
    check_resource_version(old, incoming)?;

    let mut stored = incoming.clone();
    stored.copy_status_from(old);
    {
        let old_meta = old.meta();
        let spec_changed = incoming.spec_json() != old.spec_json();
        let meta = stored.meta_mut();
        meta.uid = old_meta.uid;
        meta.creation_timestamp = old_meta.creation_timestamp;
        meta.deletion_timestamp = old_meta.deletion_timestamp;
        meta.generation = old_meta.generation + if spec_changed { 1 } else { 0 };
        bump_resource_version(meta);
    }

    if stored.meta().is_deleting() && stored.meta().finalizers.is_empty() {
        map.remove(&k);
        return Ok((stored.clone(), Some(stored)));
    }
    map.insert(k, stored.clone());
    Ok((stored, None))
}

/// Status-subresource write: everything but `status` is taken from the
/// stored object.
fn update_status_keyed<T: StoredObject>(
    map: &mut HashMap<Key, T>,
    incoming: &T,
) -> Result<T, StoreError> {
    let k = key(&incoming.meta().namespace, &incoming.meta().name);
    let old = map.get(&k).ok_or(StoreError::NotFound {
        kind: T::KIND,
        name: incoming.meta().name.clone(),
    })?;
    check_resource_version(old, incoming)?;

    let mut stored = old.clone();
    stored.copy_status_from(incoming);
    bump_resource_version(stored.meta_mut());
    map.insert(k, stored.clone());
    Ok(stored)
}

/// Returns the object when it was actually removed, `None` when finalizers
/// only let it be marked for deletion.
fn delete_keyed<T: StoredObject>(
    map: &mut HashMap<Key, T>,
    namespace: &str,
    name: &str,
) -> Result<Option<T>, StoreError> {
    let k = key(namespace, name);
    let obj = map.get_mut(&k).ok_or(StoreError::NotFound {
        kind: T::KIND,
        name: name.to_string(),
    })?;
    if obj.meta().finalizers.is_empty() {
        return Ok(map.remove(&k));
    }
    if obj.meta().deletion_timestamp.is_none() {
        obj.meta_mut().deletion_timestamp = Some(Utc::now());
        bump_resource_version(obj.meta_mut());
    }
    Ok(None)
}

// ── The store ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    workloads: HashMap<Key, Workload>,
    claims: HashMap<Key, ResourceClaim>,
    plans: HashMap<Key, WorkloadPlan>,
    exposures: HashMap<Key, WorkloadExposure>,
    /// `(namespace, workload name)` → claim names, kept in lockstep with
    /// `claims` so workload-scoped listing is O(k).
    claim_index: HashMap<Key, BTreeSet<String>>,
    events: Vec<Event>,
}

impl Inner {
    fn index_claim(&mut self, claim: &ResourceClaim) {
        let k = key(&claim.spec.workload_ref.namespace, &claim.spec.workload_ref.name);
        self.claim_index.entry(k).or_default().insert(claim.metadata.name.clone());
    }

    fn unindex_claim(&mut self, claim: &ResourceClaim) {
        let k = key(&claim.spec.workload_ref.namespace, &claim.spec.workload_ref.name);
        if let Some(names) = self.claim_index.get_mut(&k) {
            names.remove(&claim.metadata.name);
            if names.is_empty() {
                self.claim_index.remove(&k);
            }
        }
    }

    /// Emulates the host garbage collector: once an owner is gone, delete
    /// everything holding an owner reference to its UID. Objects with
    /// finalizers are only marked; their controllers finish the job.
    fn cascade(&mut self, removed_uid: Option<Uuid>) {
        let mut queue: Vec<Uuid> = removed_uid.into_iter().collect();
        while let Some(owner) = queue.pop() {
            let owned_by = |meta: &ObjectMeta| {
                meta.owner_references.iter().any(|r| r.uid == Some(owner))
            };

            let claim_keys: Vec<Key> = self
                .claims
                .iter()
                .filter(|(_, c)| owned_by(&c.metadata))
                .map(|(k, _)| k.clone())
                .collect();
            for k in claim_keys {
                if let Ok(Some(removed)) = delete_keyed(&mut self.claims, &k.0, &k.1) {
                    self.unindex_claim(&removed);
                    queue.extend(removed.metadata.uid);
                }
            }

            let plan_keys: Vec<Key> = self
                .plans
                .iter()
                .filter(|(_, p)| owned_by(&p.metadata))
                .map(|(k, _)| k.clone())
                .collect();
            for k in plan_keys {
                if let Ok(Some(removed)) = delete_keyed(&mut self.plans, &k.0, &k.1) {
                    queue.extend(removed.metadata.uid);
                }
            }

            let exposure_keys: Vec<Key> = self
                .exposures
                .iter()
                .filter(|(_, e)| owned_by(&e.metadata))
                .map(|(k, _)| k.clone())
                .collect();
            for k in exposure_keys {
                if let Ok(Some(removed)) = delete_keyed(&mut self.exposures, &k.0, &k.1) {
                    queue.extend(removed.metadata.uid);
                }
            }
        }
    }
}

/// In-memory implementation of [`ObjectStore`].
///
/// All data is lost on process exit. Suitable for tests and local runs; the
/// production store is the host cluster's.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    // ── Workloads ─────────────────────────────────────────────────────────────

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Option<Workload>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.workloads.get(&key(namespace, name)).cloned())
    }

    async fn list_workloads(&self, namespace: Option<&str>) -> Result<Vec<Workload>, StoreError> {
        let guard = self.inner.read().await;
        let mut out: Vec<Workload> = guard
            .workloads
            .values()
            .filter(|w| namespace.is_none_or(|ns| w.metadata.namespace == ns))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name))
        });
        Ok(out)
    }

    async fn create_workload(&self, workload: &Workload) -> Result<Workload, StoreError> {
        let mut guard = self.inner.write().await;
        create_keyed(&mut guard.workloads, workload)
    }

    async fn update_workload(&self, workload: &Workload) -> Result<Workload, StoreError> {
        let mut guard = self.inner.write().await;
        let (stored, removed) = update_keyed(&mut guard.workloads, workload)?;
        if let Some(removed) = removed {
            guard.cascade(removed.metadata.uid);
        }
        Ok(stored)
    }

    async fn update_workload_status(&self, workload: &Workload) -> Result<Workload, StoreError> {
        let mut guard = self.inner.write().await;
        update_status_keyed(&mut guard.workloads, workload)
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(removed) = delete_keyed(&mut guard.workloads, namespace, name)? {
            guard.cascade(removed.metadata.uid);
        }
        Ok(())
    }

    // ── ResourceClaims ────────────────────────────────────────────────────────

    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<ResourceClaim>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.claims.get(&key(namespace, name)).cloned())
    }

    async fn list_claims_for_workload(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<ResourceClaim>, StoreError> {
        let guard = self.inner.read().await;
        let names = match guard.claim_index.get(&key(namespace, workload)) {
            Some(names) => names,
            None => return Ok(Vec::new()),
        };
        Ok(names
            .iter()
            .filter_map(|n| guard.claims.get(&key(namespace, n)).cloned())
            .collect())
    }

    async fn create_claim(&self, claim: &ResourceClaim) -> Result<ResourceClaim, StoreError> {
        let mut guard = self.inner.write().await;
        let stored = create_keyed(&mut guard.claims, claim)?;
        guard.index_claim(&stored);
        Ok(stored)
    }

    async fn update_claim(&self, claim: &ResourceClaim) -> Result<ResourceClaim, StoreError> {
        let mut guard = self.inner.write().await;
        let (stored, removed) = update_keyed(&mut guard.claims, claim)?;
        match removed {
            Some(removed) => {
                guard.unindex_claim(&removed);
                guard.cascade(removed.metadata.uid);
            }
            None => guard.index_claim(&stored),
        }
        Ok(stored)
    }

    async fn update_claim_status(&self, claim: &ResourceClaim) -> Result<ResourceClaim, StoreError> {
        let mut guard = self.inner.write().await;
        update_status_keyed(&mut guard.claims, claim)
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(removed) = delete_keyed(&mut guard.claims, namespace, name)? {
            guard.unindex_claim(&removed);
            guard.cascade(removed.metadata.uid);
        }
        Ok(())
    }

    // ── WorkloadPlans ─────────────────────────────────────────────────────────

    async fn get_plan(&self, namespace: &str, name: &str) -> Result<Option<WorkloadPlan>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.plans.get(&key(namespace, name)).cloned())
    }

    async fn list_plans_for_workload(
        &self,
        namespace: &str,
        workload: &str,
    ) -> Result<Vec<WorkloadPlan>, StoreError> {
        let guard = self.inner.read().await;
        let mut out: Vec<WorkloadPlan> = guard
            .plans
            .values()
            .filter(|p| {
                p.spec.workload_ref.namespace == namespace && p.spec.workload_ref.name == workload
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(out)
    }

    async fn create_plan(&self, plan: &WorkloadPlan) -> Result<WorkloadPlan, StoreError> {
        let mut guard = self.inner.write().await;
        create_keyed(&mut guard.plans, plan)
    }

    async fn update_plan(&self, plan: &WorkloadPlan) -> Result<WorkloadPlan, StoreError> {
        let mut guard = self.inner.write().await;
        let (stored, removed) = update_keyed(&mut guard.plans, plan)?;
        if let Some(removed) = removed {
            guard.cascade(removed.metadata.uid);
        }
        Ok(stored)
    }

    async fn update_plan_status(&self, plan: &WorkloadPlan) -> Result<WorkloadPlan, StoreError> {
        let mut guard = self.inner.write().await;
        update_status_keyed(&mut guard.plans, plan)
    }

    async fn delete_plan(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(removed) = delete_keyed(&mut guard.plans, namespace, name)? {
            guard.cascade(removed.metadata.uid);
        }
        Ok(())
    }

    // ── WorkloadExposures ─────────────────────────────────────────────────────

    async fn get_exposure(&self, namespace: &str, name: &str) -> Result<Option<WorkloadExposure>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.exposures.get(&key(namespace, name)).cloned())
    }

    async fn create_exposure(&self, exposure: &WorkloadExposure) -> Result<WorkloadExposure, StoreError> {
        let mut guard = self.inner.write().await;
        create_keyed(&mut guard.exposures, exposure)
    }

    async fn update_exposure(&self, exposure: &WorkloadExposure) -> Result<WorkloadExposure, StoreError> {
        let mut guard = self.inner.write().await;
        let (stored, removed) = update_keyed(&mut guard.exposures, exposure)?;
        if let Some(removed) = removed {
            guard.cascade(removed.metadata.uid);
        }
        Ok(stored)
    }

    async fn update_exposure_status(&self, exposure: &WorkloadExposure) -> Result<WorkloadExposure, StoreError> {
        let mut guard = self.inner.write().await;
        update_status_keyed(&mut guard.exposures, exposure)
    }

    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if let Some(removed) = delete_keyed(&mut guard.exposures, namespace, name)? {
            guard.cascade(removed.metadata.uid);
        }
        Ok(())
    }

    // ── Events ────────────────────────────────────────────────────────────────

    async fn record_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.events.push(event.clone());
        Ok(())
    }

    async fn list_events(
        &self,
        object_kind: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<Event>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .events
            .iter()
            .filter(|ev| object_kind.is_none_or(|k| ev.object_kind == k))
            .filter(|ev| name.is_none_or(|n| ev.name == n))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreop_domain::{
        claim_name, ContainerSpec, OwnerReference, ResourceClaimSpec, WorkloadRef, WorkloadSpec,
    };

    fn dummy_workload(name: &str) -> Workload {
        let mut spec = WorkloadSpec::default();
        spec.containers.insert(
            "app".into(),
            ContainerSpec { image: "nginx:latest".into(), ..Default::default() },
        );
        Workload::new("default", name, spec)
    }

    fn dummy_claim(workload: &Workload, key: &str) -> ResourceClaim {
        let mut metadata = ObjectMeta::new("default", claim_name(&workload.metadata.name, key));
        metadata.owner_references.push(OwnerReference::controller_of(
            "Workload",
            &workload.metadata.name,
            workload.metadata.uid,
        ));
        ResourceClaim {
            metadata,
            spec: ResourceClaimSpec {
                workload_ref: WorkloadRef::new("default", workload.metadata.name.clone()),
                key: key.into(),
                resource_type: "postgres".into(),
                ..Default::default()
            },
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_assigns_metadata() {
        let store = InMemoryStore::new();
        let stored = store.create_workload(&dummy_workload("web")).await.unwrap();
        assert!(stored.metadata.uid.is_some());
        assert_eq!(stored.metadata.generation, 1);
        assert_eq!(stored.metadata.resource_version, "1");
        assert!(stored.metadata.creation_timestamp.is_some());
    }

    #[tokio::test]
    async fn stale_resource_version_conflicts() {
        let store = InMemoryStore::new();
        let stored = store.create_workload(&dummy_workload("web")).await.unwrap();

        let mut first = stored.clone();
        first.metadata.labels.insert("a".into(), "1".into());
        store.update_workload(&first).await.unwrap();

        let mut second = stored; // still carries resourceVersion "1"
        second.metadata.labels.insert("b".into(), "2".into());
        let err = store.update_workload(&second).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn generation_bumps_only_on_spec_change() {
        let store = InMemoryStore::new();
        let stored = store.create_workload(&dummy_workload("web")).await.unwrap();

        let mut label_only = stored.clone();
        label_only.metadata.labels.insert("a".into(), "1".into());
        let after_label = store.update_workload(&label_only).await.unwrap();
        assert_eq!(after_label.metadata.generation, 1);

        let mut spec_change = after_label.clone();
        spec_change.spec.containers.get_mut("app").unwrap().image = "nginx:1.27".into();
        let after_spec = store.update_workload(&spec_change).await.unwrap();
        assert_eq!(after_spec.metadata.generation, 2);
    }

    #[tokio::test]
    async fn status_subresource_is_isolated() {
        let store = InMemoryStore::new();
        let stored = store.create_workload(&dummy_workload("web")).await.unwrap();

        // A status write must not take spec changes with it.
        let mut sneaky = stored.clone();
        sneaky.spec.containers.get_mut("app").unwrap().image = "evil:latest".into();
        sneaky.status.endpoint = Some("http://web.default.svc.cluster.local".into());
        let after = store.update_workload_status(&sneaky).await.unwrap();
        assert_eq!(after.spec.containers["app"].image, "nginx:latest");
        assert_eq!(after.status.endpoint.as_deref(), Some("http://web.default.svc.cluster.local"));

        // And a spec write must not clobber status.
        let mut spec_write = after.clone();
        spec_write.status.endpoint = None;
        spec_write.metadata.labels.insert("x".into(), "y".into());
        let after2 = store.update_workload(&spec_write).await.unwrap();
        assert_eq!(after2.status.endpoint.as_deref(), Some("http://web.default.svc.cluster.local"));
    }

    #[tokio::test]
    async fn delete_waits_for_finalizers() {
        let store = InMemoryStore::new();
        let mut workload = dummy_workload("web");
        workload.metadata.finalizers.push("workload.score.dev/finalizer".into());
        let stored = store.create_workload(&workload).await.unwrap();

        store.delete_workload("default", "web").await.unwrap();
        let marked = store.get_workload("default", "web").await.unwrap().unwrap();
        assert!(marked.metadata.is_deleting());

        let mut release = marked.clone();
        release.metadata.finalizers.clear();
        // The finalizer-stripping update completes the deletion.
        let _ = store.update_workload(&release).await.unwrap();
        assert!(store.get_workload("default", "web").await.unwrap().is_none());
        // Stale rv of `stored` no longer matters; object is gone.
        assert!(store.update_workload(&stored).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn claim_index_serves_workload_scoped_lists() {
        let store = InMemoryStore::new();
        let web = store.create_workload(&dummy_workload("web")).await.unwrap();
        let other = store.create_workload(&dummy_workload("other")).await.unwrap();

        store.create_claim(&dummy_claim(&web, "db")).await.unwrap();
        store.create_claim(&dummy_claim(&web, "cache")).await.unwrap();
        store.create_claim(&dummy_claim(&other, "db")).await.unwrap();

        let claims = store.list_claims_for_workload("default", "web").await.unwrap();
        let keys: Vec<&str> = claims.iter().map(|c| c.spec.key.as_str()).collect();
        // BTreeSet ordering on claim names: web-cache before web-db.
        assert_eq!(keys, vec!["cache", "db"]);
    }

    #[tokio::test]
    async fn workload_removal_cascades_to_owned_objects() {
        let store = InMemoryStore::new();
        let web = store.create_workload(&dummy_workload("web")).await.unwrap();
        store.create_claim(&dummy_claim(&web, "db")).await.unwrap();

        store.delete_workload("default", "web").await.unwrap();
        assert!(store.get_claim("default", "web-db").await.unwrap().is_none());
        assert!(store
            .list_claims_for_workload("default", "web")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn cascade_respects_claim_finalizers() {
        let store = InMemoryStore::new();
        let web = store.create_workload(&dummy_workload("web")).await.unwrap();
        let mut claim = dummy_claim(&web, "db");
        claim.metadata.finalizers.push("provisioner.score.dev/finalizer".into());
        store.create_claim(&claim).await.unwrap();

        store.delete_workload("default", "web").await.unwrap();
        let held = store.get_claim("default", "web-db").await.unwrap().unwrap();
        assert!(held.metadata.is_deleting(), "claim should be marked, not removed");
    }
}
