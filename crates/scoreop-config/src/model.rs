use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── OrchestratorConfig ────────────────────────────────────────────────────────

/// External, read-only orchestrator configuration: profiles of candidate
/// backends, default selection rules, and provisioner bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub profiles: Vec<Profile>,
    pub defaults: DefaultSelection,
    pub provisioners: Vec<ProvisionerBinding>,
}

impl OrchestratorConfig {
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The binding whose `type` matches the claim's resource type.
    pub fn provisioner_for(&self, resource_type: &str) -> Option<&ProvisionerBinding> {
        self.provisioners.iter().find(|p| p.resource_type == resource_type)
    }
}

/// A named grouping of candidate backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub backends: Vec<Backend>,
}

/// One deployable target: a runtime class plus the template that renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    pub backend_id: String,
    pub runtime_class: String,
    #[serde(default)]
    pub priority: i32,
    /// SemVer string; invalid versions lose tie-breaks against valid ones.
    #[serde(default)]
    pub version: String,
    pub template: BackendTemplate,
    #[serde(default)]
    pub constraints: BackendConstraints,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendTemplate {
    /// Template kind, e.g. `helm` or `manifests`.
    pub kind: String,
    #[serde(rename = "ref")]
    pub template_ref: String,
    /// Default values; the plan manager deep-merges the workload view and
    /// claim outputs over these.
    #[serde(default)]
    pub values: serde_json::Value,
}

// ── Backend constraints ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConstraints {
    /// At least one listed selector must match the workload's labels.
    /// An empty list accepts every workload.
    #[serde(default)]
    pub selectors: Vec<LabelSelector>,
    /// Features the backend requires of the workload.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub resources: Option<ResourceConstraints>,
}

/// Quantity ranges in `"min-max"` form; either bound may be empty, and a
/// value without `-` requires exact equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConstraints {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
}

// ── Label selectors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// True when every matchLabels pair and every matchExpression holds.
    /// The empty selector matches everything.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        for (k, v) in &self.match_labels {
            if labels.get(k) != Some(v) {
                return false;
            }
        }
        self.match_expressions.iter().all(|req| req.matches(labels))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.iter().any(|x| x == v)),
            SelectorOperator::NotIn => !value.is_some_and(|v| self.values.iter().any(|x| x == v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

// ── Default selection rules ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSelection {
    /// Fallback profile when no other stage picks one.
    pub profile: String,
    /// Evaluated in document order against the workload's labels.
    #[serde(default)]
    pub selectors: Vec<ProfileRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRule {
    #[serde(flatten)]
    pub selector: LabelSelector,
    pub profile: String,
}

// ── Provisioner bindings ──────────────────────────────────────────────────────

/// Maps an abstract resource type to the strategy that provisions it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionerBinding {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub strategy: StrategyKind,
    /// Strategy-specific configuration, passed through opaquely.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Output templates keyed by claim output field (`uri`, `secretRef`, …),
    /// rendered with the provisioning context.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "helm")]
    Helm,
    #[serde(rename = "manifests")]
    Manifests,
    #[serde(rename = "external-api")]
    ExternalApi,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Helm => write!(f, "helm"),
            StrategyKind::Manifests => write!(f, "manifests"),
            StrategyKind::ExternalApi => write!(f, "external-api"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helm" => Ok(StrategyKind::Helm),
            "manifests" => Ok(StrategyKind::Manifests),
            "external-api" => Ok(StrategyKind::ExternalApi),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}
