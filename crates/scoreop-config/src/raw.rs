use serde::Deserialize;
use std::collections::BTreeMap;

use crate::model::{Backend, ProfileRule};

/// Raw YAML representation of the orchestrator config file.
///
/// Kept lenient: strategy names stay strings and `defaults` may be absent;
/// the loader converts and validates into [`crate::model::OrchestratorConfig`].
#[derive(Debug, Deserialize)]
pub struct RawOrchestratorConfig {
    #[serde(default)]
    pub profiles: Vec<RawProfile>,
    #[serde(default)]
    pub defaults: Option<RawDefaults>,
    #[serde(default)]
    pub provisioners: Vec<RawProvisioner>,
}

#[derive(Debug, Deserialize)]
pub struct RawProfile {
    pub name: String,
    #[serde(default)]
    pub backends: Vec<Backend>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDefaults {
    /// Absent means "first profile in document order".
    pub profile: Option<String>,
    #[serde(default)]
    pub selectors: Vec<ProfileRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProvisioner {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub strategy: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}
