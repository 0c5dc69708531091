use std::cmp::Ordering;
use std::collections::BTreeSet;

use scoreop_config::{Backend, OrchestratorConfig, Profile, ResourceConstraints};
use scoreop_domain::Workload;
use semver::Version;
use tracing::debug;

use crate::error::SelectorError;
use crate::features::workload_features;
use crate::profile::select_profile;
use crate::quantity::{Quantity, QuantityRange};

/// Stage 2: drop backends whose constraints disqualify the workload.
pub fn filter_candidates<'a>(
    profile: &'a Profile,
    workload: &Workload,
    features: &BTreeSet<String>,
) -> Result<Vec<&'a Backend>, SelectorError> {
    let mut candidates = Vec::new();
    for backend in &profile.backends {
        let constraints = &backend.constraints;

        let selector_ok = constraints.selectors.is_empty()
            || constraints
                .selectors
                .iter()
                .any(|s| s.matches(&workload.metadata.labels));
        if !selector_ok {
            continue;
        }

        if !constraints.features.iter().all(|f| features.contains(f)) {
            continue;
        }

        if let Some(resources) = &constraints.resources {
            if !resource_constraints_hold(resources, workload)? {
                continue;
            }
        }

        candidates.push(backend);
    }
    Ok(candidates)
}

fn resource_constraints_hold(
    constraints: &ResourceConstraints,
    workload: &Workload,
) -> Result<bool, SelectorError> {
    for (range, request_key) in [
        (&constraints.cpu, "cpu"),
        (&constraints.memory, "memory"),
        (&constraints.storage, "ephemeral-storage"),
    ] {
        let Some(range) = range else { continue };
        let range: QuantityRange = range.parse()?;
        let total = summed_requests(workload, request_key)?;
        if !range.contains(total) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Sum of all container requests for one resource name. Containers without
/// a request contribute nothing.
fn summed_requests(workload: &Workload, request_key: &str) -> Result<Quantity, SelectorError> {
    let mut total = Quantity::ZERO;
    for container in workload.spec.containers.values() {
        if let Some(resources) = &container.resources {
            if let Some(raw) = resources.requests.get(request_key) {
                total = total.saturating_add(raw.parse()?);
            }
        }
    }
    Ok(total)
}

/// Stage 3: deterministic ordering — priority descending, then SemVer
/// descending with invalid versions sorting after valid ones, then backend
/// id ascending.
fn compare_backends(a: &Backend, b: &Backend) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| compare_versions_desc(&a.version, &b.version))
        .then_with(|| a.backend_id.cmp(&b.backend_id))
}

fn compare_versions_desc(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => vb.cmp(&va),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => Ordering::Equal,
    }
}

/// The full pipeline: profile → filtered candidates → single backend.
///
/// Deterministic: the same (config, workload) pair always yields the same
/// backend id.
pub fn select_backend<'a>(
    config: &'a OrchestratorConfig,
    workload: &Workload,
) -> Result<&'a Backend, SelectorError> {
    let profile = select_profile(config, workload)?;
    let features = workload_features(workload);
    let mut candidates = filter_candidates(profile, workload, &features)?;
    if candidates.is_empty() {
        return Err(SelectorError::NoCandidates { profile: profile.name.clone() });
    }
    candidates.sort_by(|a, b| compare_backends(a, b));
    let chosen = candidates[0];
    debug!(
        workload = %workload.metadata.name,
        profile = %profile.name,
        backend = %chosen.backend_id,
        "selected backend"
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreop_config::parse_config;
    use scoreop_domain::workload::REQUIREMENTS_ANNOTATION;
    use scoreop_domain::{
        ContainerResources, ContainerSpec, ServicePort, ServiceSpec, WorkloadSpec,
    };

    fn served_workload() -> Workload {
        let mut spec = WorkloadSpec::default();
        spec.containers.insert(
            "app".into(),
            ContainerSpec { image: "nginx:latest".into(), ..Default::default() },
        );
        spec.service = Some(ServiceSpec { ports: vec![ServicePort::new(8080)] });
        Workload::new("default", "web", spec)
    }

    #[test]
    fn tie_break_prefers_release_then_id() {
        let config = parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: zebra
        runtimeClass: kubernetes
        priority: 100
        version: "1.0.0"
        template: { kind: helm, ref: x }
      - backendId: alpha
        runtimeClass: kubernetes
        priority: 100
        version: "1.0.0"
        template: { kind: helm, ref: x }
      - backendId: release
        runtimeClass: kubernetes
        priority: 100
        version: "1.0.0-rc.1"
        template: { kind: helm, ref: x }
"#,
        )
        .unwrap();
        let chosen = select_backend(&config, &served_workload()).unwrap();
        assert_eq!(chosen.backend_id, "alpha");
    }

    #[test]
    fn priority_beats_version() {
        let config = parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: old-but-preferred
        runtimeClass: kubernetes
        priority: 200
        version: "0.1.0"
        template: { kind: helm, ref: x }
      - backendId: newer
        runtimeClass: kubernetes
        priority: 100
        version: "9.9.9"
        template: { kind: helm, ref: x }
"#,
        )
        .unwrap();
        assert_eq!(
            select_backend(&config, &served_workload()).unwrap().backend_id,
            "old-but-preferred"
        );
    }

    #[test]
    fn invalid_version_sorts_after_valid() {
        let config = parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: broken
        runtimeClass: kubernetes
        priority: 100
        version: "not-semver"
        template: { kind: helm, ref: x }
      - backendId: valid
        runtimeClass: kubernetes
        priority: 100
        version: "0.0.1"
        template: { kind: helm, ref: x }
"#,
        )
        .unwrap();
        assert_eq!(select_backend(&config, &served_workload()).unwrap().backend_id, "valid");
    }

    #[test]
    fn feature_constraints_filter_candidates() {
        let config = parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: needs-scale-to-zero
        runtimeClass: knative
        priority: 200
        version: "1.0.0"
        template: { kind: manifests, ref: x }
        constraints:
          features: [http-ingress, scale-to-zero]
      - backendId: plain
        runtimeClass: kubernetes
        priority: 100
        version: "1.0.0"
        template: { kind: helm, ref: x }
        constraints:
          features: [http-ingress]
"#,
        )
        .unwrap();
        // Without scale-to-zero only `plain` survives, despite lower priority.
        assert_eq!(select_backend(&config, &served_workload()).unwrap().backend_id, "plain");

        let mut w = served_workload();
        w.metadata
            .annotations
            .insert(REQUIREMENTS_ANNOTATION.into(), "scale-to-zero".into());
        assert_eq!(
            select_backend(&config, &w).unwrap().backend_id,
            "needs-scale-to-zero"
        );
    }

    #[test]
    fn resource_constraints_apply_to_summed_requests() {
        let config = parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: small-only
        runtimeClass: kubernetes
        priority: 100
        version: "1.0.0"
        template: { kind: helm, ref: x }
        constraints:
          resources:
            cpu: "-1"
            memory: "-1Gi"
"#,
        )
        .unwrap();

        let mut w = served_workload();
        w.spec.containers.get_mut("app").unwrap().resources = Some(ContainerResources {
            requests: [("cpu".to_string(), "500m".to_string()),
                       ("memory".to_string(), "256Mi".to_string())]
                .into_iter()
                .collect(),
            limits: Default::default(),
        });
        assert!(select_backend(&config, &w).is_ok());

        w.spec.containers.get_mut("app").unwrap().resources = Some(ContainerResources {
            requests: [("cpu".to_string(), "2".to_string())].into_iter().collect(),
            limits: Default::default(),
        });
        assert!(matches!(
            select_backend(&config, &w),
            Err(SelectorError::NoCandidates { .. })
        ));
    }

    #[test]
    fn selection_is_deterministic() {
        let config = parse_config(
            r#"
profiles:
  - name: web
    backends:
      - backendId: b1
        runtimeClass: kubernetes
        priority: 10
        version: "1.0.0"
        template: { kind: helm, ref: x }
      - backendId: b2
        runtimeClass: kubernetes
        priority: 10
        version: "1.0.0"
        template: { kind: helm, ref: x }
"#,
        )
        .unwrap();
        let w = served_workload();
        let first = select_backend(&config, &w).unwrap().backend_id.clone();
        for _ in 0..10 {
            assert_eq!(select_backend(&config, &w).unwrap().backend_id, first);
        }
    }
}
