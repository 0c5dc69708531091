use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claim::{ClaimSummary, DeprovisionPolicy};
use crate::condition::Condition;
use crate::error::DomainError;
use crate::meta::ObjectMeta;

// ── Annotations understood by the operator ────────────────────────────────────

/// Profile hint: must name an existing profile in the orchestrator config.
pub const PROFILE_ANNOTATION: &str = "score.dev/profile";
/// Comma-separated list of explicitly required backend features.
pub const REQUIREMENTS_ANNOTATION: &str = "score.dev/requirements";
/// `"true"` requests the scale-to-zero feature.
pub const SCALE_TO_ZERO_ANNOTATION: &str = "score.dev/scale-to-zero";

// ── Workload ──────────────────────────────────────────────────────────────────

/// The user-authored declarative input: containers, service ports, and
/// abstract resource dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub metadata: ObjectMeta,
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

impl Workload {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: WorkloadSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: WorkloadStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Containers keyed by name.
    pub containers: BTreeMap<String, ContainerSpec>,
    #[serde(default)]
    pub service: Option<ServiceSpec>,
    /// Abstract resource dependencies keyed by a workload-local name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub image: String,
    /// Environment variables. Values may reference claim outputs via
    /// `${resources.<key>.outputs.<field>}`.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<FileMount>,
    #[serde(default)]
    pub resources: Option<ContainerResources>,
}

/// Requested / limited compute quantities, in the `m`/`Mi`/`Gi` syntax the
/// selector's constraint ranges understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResources {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

/// A file placed into the container at `target`.
///
/// Exactly one of `content` (inline, static) or `source` should be set.
/// `source` is either a host path or a `${resources.<key>.outputs.<field>}`
/// reference resolved at projection time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMount {
    pub target: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub target_port: Option<u16>,
}

impl ServicePort {
    pub fn new(port: u16) -> Self {
        Self { name: None, port, target_port: None }
    }
}

// ── Abstract resource dependencies ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Provisioner-facing resource type, e.g. `postgres`, `redis`.
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<RawParams>,
    /// What happens to the claim when the key is removed or the workload is
    /// deleted. Defaults to `Delete`.
    #[serde(default)]
    pub deprovision_policy: Option<DeprovisionPolicy>,
}

/// Opaque provisioner parameters, carried as JSON.
///
/// Equality is canonical-JSON equality: `serde_json::Value` comparison is
/// insensitive to object key order, so byte-level formatting differences do
/// not register as spec drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawParams(pub serde_json::Value);

impl RawParams {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

// ── Workload status ───────────────────────────────────────────────────────────

/// Observed reality, written only by this operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Per-claim readiness, in claim-list order.
    #[serde(default)]
    pub claims: Vec<ClaimSummary>,
    /// Canonical endpoint, once derivable or mirrored.
    #[serde(default)]
    pub endpoint: Option<String>,
}

// ── Structural validation ─────────────────────────────────────────────────────

/// Validate the parts of a workload spec that do not need the orchestrator
/// config: container shape, service ports, resource keys.
///
/// Profile-hint validity is checked by the selector, which knows the
/// configured profiles.
pub fn validate_workload(workload: &Workload) -> Result<(), DomainError> {
    if workload.spec.containers.is_empty() {
        return Err(DomainError::InvalidWorkload {
            workload: workload.metadata.name.clone(),
            message: "at least one container is required".into(),
        });
    }
    for (name, container) in &workload.spec.containers {
        if container.image.trim().is_empty() {
            return Err(DomainError::InvalidWorkload {
                workload: workload.metadata.name.clone(),
                message: format!("container '{name}' has no image"),
            });
        }
        for mount in &container.files {
            if mount.target.trim().is_empty() {
                return Err(DomainError::InvalidWorkload {
                    workload: workload.metadata.name.clone(),
                    message: format!("container '{name}' has a file mount without a target"),
                });
            }
            if mount.content.is_some() && mount.source.is_some() {
                return Err(DomainError::InvalidWorkload {
                    workload: workload.metadata.name.clone(),
                    message: format!(
                        "file mount '{}' in container '{name}' sets both content and source",
                        mount.target
                    ),
                });
            }
        }
    }
    if let Some(service) = &workload.spec.service {
        let mut seen = std::collections::BTreeSet::new();
        for port in &service.ports {
            if port.port == 0 {
                return Err(DomainError::InvalidWorkload {
                    workload: workload.metadata.name.clone(),
                    message: "service port 0 is not valid".into(),
                });
            }
            if !seen.insert(port.port) {
                return Err(DomainError::InvalidWorkload {
                    workload: workload.metadata.name.clone(),
                    message: format!("duplicate service port {}", port.port),
                });
            }
        }
    }
    for (key, resource) in &workload.spec.resources {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(DomainError::InvalidResourceKey { key: key.clone() });
        }
        if resource.resource_type.trim().is_empty() {
            return Err(DomainError::InvalidWorkload {
                workload: workload.metadata.name.clone(),
                message: format!("resource '{key}' has no type"),
            });
        }
    }
    Ok(())
}
