use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::{ObjectMeta, WorkloadRef};
use crate::workload::RawParams;

/// Claim objects are named `{workload}-{key}` in the workload's namespace.
pub fn claim_name(workload: &str, key: &str) -> String {
    format!("{workload}-{key}")
}

// ── ResourceClaim ─────────────────────────────────────────────────────────────

/// Operator-owned provisioning record, one per abstract resource dependency.
/// The spec is written by the claim manager; the status belongs to the
/// provisioner controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClaim {
    pub metadata: ObjectMeta,
    pub spec: ResourceClaimSpec,
    #[serde(default)]
    pub status: ResourceClaimStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClaimSpec {
    pub workload_ref: WorkloadRef,
    /// The key under `workload.spec.resources` this claim realizes.
    pub key: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<RawParams>,
    #[serde(default)]
    pub deprovision_policy: DeprovisionPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeprovisionPolicy {
    /// Delete the claim and deprovision the external resource.
    #[default]
    Delete,
    /// Delete the claim but keep the external resource.
    Retain,
    /// Keep the claim object, detached from the workload's ownership.
    Orphan,
}

impl std::fmt::Display for DeprovisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeprovisionPolicy::Delete => write!(f, "Delete"),
            DeprovisionPolicy::Retain => write!(f, "Retain"),
            DeprovisionPolicy::Orphan => write!(f, "Orphan"),
        }
    }
}

// ── Claim status ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPhase {
    Pending,
    Claiming,
    Bound,
    Failed,
}

impl std::fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimPhase::Pending => write!(f, "Pending"),
            ClaimPhase::Claiming => write!(f, "Claiming"),
            ClaimPhase::Bound => write!(f, "Bound"),
            ClaimPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Written only by the provisioner controller.
///
/// `phase = None` means the claim has not been picked up yet; readers
/// normalize it to `Pending` in summaries but the stored value stays unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClaimStatus {
    #[serde(default)]
    pub phase: Option<ClaimPhase>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub outputs_available: bool,
    #[serde(default)]
    pub outputs: Option<ClaimOutputs>,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Provisioning outputs. `outputs_available` may only be true when at least
/// one field is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutputs {
    #[serde(default)]
    pub secret_ref: Option<LocalObjectRef>,
    #[serde(default)]
    pub config_map_ref: Option<LocalObjectRef>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub cert: Option<String>,
}

impl ClaimOutputs {
    /// True when at least one output field carries a value.
    pub fn is_populated(&self) -> bool {
        self.secret_ref.as_ref().is_some_and(|r| !r.name.is_empty())
            || self.config_map_ref.as_ref().is_some_and(|r| !r.name.is_empty())
            || self.uri.as_ref().is_some_and(|u| !u.is_empty())
            || self.image.as_ref().is_some_and(|i| !i.is_empty())
            || self.cert.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Look up an output by its wire-level field name, as referenced from
    /// `${resources.<key>.outputs.<field>}` placeholders.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "secretRef" => self.secret_ref.as_ref().map(|r| r.name.clone()),
            "configMapRef" => self.config_map_ref.as_ref().map(|r| r.name.clone()),
            "uri" => self.uri.clone(),
            "image" => self.image.clone(),
            "cert" => self.cert.clone(),
            _ => None,
        }
        .filter(|v| !v.is_empty())
    }
}

/// Reference to a named object in the claim's namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectRef {
    pub name: String,
}

impl LocalObjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ── Per-claim summary mirrored onto the workload ──────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSummary {
    pub key: String,
    pub phase: ClaimPhase,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub outputs_available: bool,
}
