use scoreop_config::{OrchestratorConfig, Profile};
use scoreop_domain::workload::PROFILE_ANNOTATION;
use scoreop_domain::Workload;
use tracing::debug;

use crate::error::SelectorError;

/// Stage 1: pick the profile for a workload. Evaluated in order, first hit
/// wins:
///
/// 1. the `score.dev/profile` annotation (must name an existing profile);
/// 2. auto-derivation from the workload shape — served workloads pick the
///    first profile whose name mentions "web" or "service", others prefer
///    "batch" or "job";
/// 3. the global default selector rules, in document order, against the
///    workload's labels (namespace labels are intentionally not consulted);
/// 4. the configured global default profile.
pub fn select_profile<'a>(
    config: &'a OrchestratorConfig,
    workload: &Workload,
) -> Result<&'a Profile, SelectorError> {
    if let Some(hint) = workload.metadata.annotation(PROFILE_ANNOTATION) {
        return config
            .profile(hint)
            .ok_or_else(|| SelectorError::UnknownProfile(hint.to_string()));
    }

    let has_ports = workload
        .spec
        .service
        .as_ref()
        .is_some_and(|s| !s.ports.is_empty());
    let name_hints: &[&str] = if has_ports { &["web", "service"] } else { &["batch", "job"] };
    if let Some(profile) = config
        .profiles
        .iter()
        .find(|p| name_hints.iter().any(|h| p.name.contains(h)))
    {
        debug!(workload = %workload.metadata.name, profile = %profile.name, "auto-derived profile");
        return Ok(profile);
    }

    for rule in &config.defaults.selectors {
        if rule.selector.matches(&workload.metadata.labels) {
            return config
                .profile(&rule.profile)
                .ok_or_else(|| SelectorError::UnknownProfile(rule.profile.clone()));
        }
    }

    config
        .profile(&config.defaults.profile)
        .ok_or_else(|| SelectorError::UnknownProfile(config.defaults.profile.clone()))
}
