use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::model::{DefaultSelection, OrchestratorConfig, Profile, ProvisionerBinding};
use crate::raw::RawOrchestratorConfig;

/// Load and validate the orchestrator config from a YAML file.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawOrchestratorConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
            path: path.display().to_string(),
            source: e,
        })?;
    debug!(path = %path.display(), "loaded orchestrator config");
    convert(raw)
}

/// Parse and validate the orchestrator config from a YAML string.
pub fn parse_config(content: &str) -> Result<OrchestratorConfig, ConfigError> {
    let raw: RawOrchestratorConfig =
        serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParse {
            path: "<inline>".to_string(),
            source: e,
        })?;
    convert(raw)
}

fn convert(raw: RawOrchestratorConfig) -> Result<OrchestratorConfig, ConfigError> {
    if raw.profiles.is_empty() {
        return Err(ConfigError::Invalid("at least one profile is required".into()));
    }

    let mut profiles = Vec::with_capacity(raw.profiles.len());
    let mut names = BTreeSet::new();
    for p in raw.profiles {
        if !names.insert(p.name.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate profile '{}'", p.name)));
        }
        if p.backends.is_empty() {
            return Err(ConfigError::Invalid(format!("profile '{}' has no backends", p.name)));
        }
        let mut backend_ids = BTreeSet::new();
        for b in &p.backends {
            if b.backend_id.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "profile '{}' contains a backend without an id",
                    p.name
                )));
            }
            if !backend_ids.insert(b.backend_id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate backend id '{}' in profile '{}'",
                    b.backend_id, p.name
                )));
            }
            if b.runtime_class.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend '{}' has no runtime class",
                    b.backend_id
                )));
            }
        }
        profiles.push(Profile { name: p.name, backends: p.backends });
    }

    let defaults = match raw.defaults {
        Some(d) => {
            let profile = d
                .profile
                .unwrap_or_else(|| profiles[0].name.clone());
            DefaultSelection { profile, selectors: d.selectors }
        }
        None => DefaultSelection {
            profile: profiles[0].name.clone(),
            selectors: Vec::new(),
        },
    };

    if !names.contains(&defaults.profile) {
        return Err(ConfigError::UnknownProfile {
            profile: defaults.profile.clone(),
            referrer: "defaults.profile".into(),
        });
    }
    for rule in &defaults.selectors {
        if !names.contains(&rule.profile) {
            return Err(ConfigError::UnknownProfile {
                profile: rule.profile.clone(),
                referrer: "defaults.selectors".into(),
            });
        }
    }

    let mut provisioners: Vec<ProvisionerBinding> = Vec::with_capacity(raw.provisioners.len());
    let mut types = BTreeSet::new();
    for p in raw.provisioners {
        if !types.insert(p.resource_type.clone()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate provisioner binding for type '{}'",
                p.resource_type
            )));
        }
        let strategy = p.strategy.parse().map_err(|_| ConfigError::UnknownStrategy {
            strategy: p.strategy.clone(),
            resource_type: p.resource_type.clone(),
        })?;
        provisioners.push(ProvisionerBinding {
            resource_type: p.resource_type,
            strategy,
            config: p.config,
            outputs: p.outputs,
        });
    }

    Ok(OrchestratorConfig { profiles, defaults, provisioners })
}
