use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API group shared by all record kinds managed by this operator.
pub const API_GROUP: &str = "score.dev";

// ── Object metadata ───────────────────────────────────────────────────────────

/// Standard metadata carried by every record kind.
///
/// `generation` is bumped by the store on every spec change;
/// `resource_version` is the opaque optimistic-concurrency token managed by
/// the store and must be passed back unchanged on writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: Option<Uuid>,
    #[serde(default)]
    pub generation: i64,
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// True once the user has requested deletion; finalizers may still hold
    /// the object in the store.
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add `finalizer` if absent. Returns true when the list changed.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Remove `finalizer` if present. Returns true when the list changed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }

    /// The owner reference with `controller = true`, if any.
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|o| o.controller)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

// ── Owner references ──────────────────────────────────────────────────────────

/// Back-pointer from an owned object to its owner, used by the host garbage
/// collector for cascade deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_group: String,
    pub kind: String,
    pub name: String,
    pub uid: Option<Uuid>,
    /// True for the single managing controller of the object.
    #[serde(default)]
    pub controller: bool,
}

impl OwnerReference {
    /// Controller reference pointing at `owner` of the given kind.
    pub fn controller_of(kind: &str, name: &str, uid: Option<Uuid>) -> Self {
        Self {
            api_group: API_GROUP.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid,
            controller: true,
        }
    }
}

// ── Workload back-reference ───────────────────────────────────────────────────

/// By-name back-reference from a derived object to its Workload.
///
/// Kept independent of owner references so both directions remain
/// materializable from storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: Option<Uuid>,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: None,
        }
    }
}

impl std::fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
