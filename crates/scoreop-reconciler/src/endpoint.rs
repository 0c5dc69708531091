use scoreop_domain::{Workload, WorkloadPlan};
use url::Url;

pub const DEFAULT_CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// An endpoint must parse as a URL with an http(s) scheme and a non-empty
/// host to be published anywhere.
pub fn validate_endpoint(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Derive the canonical endpoint for a workload.
///
/// Precedence: a template-rendered endpoint carried in the plan values
/// (reserved extension), then the workload's service ports with
/// deterministic priority, then none. The scheme is whatever the chosen
/// port indicates, never coerced.
pub fn derive_endpoint(
    workload: &Workload,
    plan: Option<&WorkloadPlan>,
    cluster_domain: &str,
) -> Option<String> {
    if let Some(plan) = plan {
        if let Some(overridden) = plan.spec.values.get("endpoint").and_then(|v| v.as_str()) {
            if !overridden.is_empty() && validate_endpoint(overridden) {
                return Some(overridden.to_string());
            }
        }
    }

    let ports = workload.spec.service.as_ref()?.ports.as_slice();
    let chosen = ports.iter().map(|p| p.port).min_by_key(|p| port_rank(*p))?;

    let scheme = scheme_for(chosen);
    let host = format!(
        "{}.{}.{}",
        workload.metadata.name, workload.metadata.namespace, cluster_domain
    );
    let endpoint = if is_standard_port(scheme, chosen) {
        format!("{scheme}://{host}")
    } else {
        format!("{scheme}://{host}:{chosen}")
    };
    validate_endpoint(&endpoint).then_some(endpoint)
}

/// HTTPS-family (443, 8443) beats HTTP-family (80, 8080) beats everything
/// else; within a class the well-known port wins, and unknown ports order
/// by number for determinism.
fn port_rank(port: u16) -> (u8, u16) {
    match port {
        443 => (0, port),
        8443 => (1, port),
        80 => (2, port),
        8080 => (3, port),
        other => (4, other),
    }
}

fn scheme_for(port: u16) -> &'static str {
    match port {
        443 | 8443 => "https",
        _ => "http",
    }
}

fn is_standard_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("https", 443) | ("http", 80))
}
