use std::sync::Arc;

use scoreop_domain::meta::{ObjectMeta, OwnerReference};
use scoreop_domain::{
    claim_name, DeprovisionPolicy, ResourceClaim, ResourceClaimSpec, Workload, WorkloadRef,
};
use scoreop_store::ObjectStore;
use tracing::{debug, info};

use crate::error::ReconcileError;

/// Keeps the ResourceClaim set in lockstep with `workload.spec.resources`:
/// one claim per key, owned by the workload, deleted (or detached) when the
/// key disappears.
pub struct ClaimManager {
    store: Arc<dyn ObjectStore>,
}

impl ClaimManager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn ensure(&self, workload: &Workload) -> Result<(), ReconcileError> {
        let namespace = &workload.metadata.namespace;

        for (key, resource) in &workload.spec.resources {
            let name = claim_name(&workload.metadata.name, key);
            let desired = ResourceClaimSpec {
                workload_ref: WorkloadRef::new(namespace.clone(), workload.metadata.name.clone()),
                key: key.clone(),
                resource_type: resource.resource_type.clone(),
                class: resource.class.clone(),
                id: resource.id.clone(),
                params: resource.params.clone(),
                deprovision_policy: resource.deprovision_policy.unwrap_or_default(),
            };

            match self.store.get_claim(namespace, &name).await? {
                None => {
                    let mut metadata = ObjectMeta::new(namespace.clone(), name.clone());
                    metadata.owner_references.push(OwnerReference::controller_of(
                        "Workload",
                        &workload.metadata.name,
                        workload.metadata.uid,
                    ));
                    let claim = ResourceClaim { metadata, spec: desired, status: Default::default() };
                    self.store.create_claim(&claim).await?;
                    info!(workload = %workload.metadata.name, claim = %name, "created claim");
                }
                Some(mut existing) => {
                    if existing.metadata.is_deleting() {
                        continue;
                    }
                    // Canonical-JSON params equality via RawParams, so
                    // formatting-only differences don't count as drift.
                    if existing.spec != desired {
                        existing.spec = desired;
                        self.store.update_claim(&existing).await?;
                        debug!(claim = %name, "claim spec drifted, updated");
                    }
                }
            }
        }

        // Claims for removed keys follow their deprovision policy.
        let owned = self
            .store
            .list_claims_for_workload(namespace, &workload.metadata.name)
            .await?;
        for claim in owned {
            if workload.spec.resources.contains_key(&claim.spec.key) || claim.metadata.is_deleting()
            {
                continue;
            }
            match claim.spec.deprovision_policy {
                DeprovisionPolicy::Orphan => self.detach(claim).await?,
                _ => {
                    info!(claim = %claim.metadata.name, "resource key removed, deleting claim");
                    match self.store.delete_claim(namespace, &claim.metadata.name).await {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        Ok(())
    }

    /// Drop the controller owner reference so the claim survives the
    /// workload independently.
    pub(crate) async fn detach(&self, mut claim: ResourceClaim) -> Result<(), ReconcileError> {
        let before = claim.metadata.owner_references.len();
        claim
            .metadata
            .owner_references
            .retain(|r| !(r.kind == "Workload" && r.name == claim.spec.workload_ref.name));
        if claim.metadata.owner_references.len() != before {
            info!(claim = %claim.metadata.name, "orphan policy, detaching owner reference");
            self.store.update_claim(&claim).await?;
        }
        Ok(())
    }

    pub async fn list(&self, workload: &Workload) -> Result<Vec<ResourceClaim>, ReconcileError> {
        Ok(self
            .store
            .list_claims_for_workload(&workload.metadata.namespace, &workload.metadata.name)
            .await?)
    }
}
