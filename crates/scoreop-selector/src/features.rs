use std::collections::BTreeSet;

use scoreop_domain::workload::{REQUIREMENTS_ANNOTATION, SCALE_TO_ZERO_ANNOTATION};
use scoreop_domain::Workload;

pub const FEATURE_HTTP_INGRESS: &str = "http-ingress";
pub const FEATURE_MONITORING: &str = "monitoring";
pub const FEATURE_SCALE_TO_ZERO: &str = "scale-to-zero";
pub const FEATURE_PERSISTENT_STORAGE: &str = "persistent-storage";
pub const FEATURE_DATABASE_CONNECTIVITY: &str = "database-connectivity";

/// Ports conventionally served by Prometheus, node-exporter, and Grafana.
const MONITORING_PORTS: [u16; 3] = [9090, 9100, 3000];

const MONITORING_ENV_HINTS: [&str; 3] = ["PROMETHEUS", "METRICS", "GRAFANA"];

const DATABASE_TYPE_HINTS: [&str; 4] = ["postgres", "mysql", "database", "redis"];

/// The feature set a workload presents to backend constraint filtering:
/// explicit requirements from the `score.dev/requirements` annotation plus
/// everything auto-detected from the spec.
pub fn workload_features(workload: &Workload) -> BTreeSet<String> {
    let mut features = BTreeSet::new();

    if let Some(explicit) = workload.metadata.annotation(REQUIREMENTS_ANNOTATION) {
        for item in explicit.split(',') {
            let item = item.trim();
            if !item.is_empty() {
                features.insert(item.to_string());
            }
        }
    }

    let ports = workload
        .spec
        .service
        .as_ref()
        .map(|s| s.ports.as_slice())
        .unwrap_or_default();
    if !ports.is_empty() {
        features.insert(FEATURE_HTTP_INGRESS.to_string());
    }
    if ports.iter().any(|p| MONITORING_PORTS.contains(&p.port)) {
        features.insert(FEATURE_MONITORING.to_string());
    }

    let env_hints = workload.spec.containers.values().any(|c| {
        c.variables
            .keys()
            .any(|name| MONITORING_ENV_HINTS.iter().any(|hint| name.contains(hint)))
    });
    if env_hints {
        features.insert(FEATURE_MONITORING.to_string());
    }

    if workload.metadata.annotation(SCALE_TO_ZERO_ANNOTATION) == Some("true") {
        features.insert(FEATURE_SCALE_TO_ZERO.to_string());
    }

    if workload.spec.containers.values().any(|c| !c.files.is_empty()) {
        features.insert(FEATURE_PERSISTENT_STORAGE.to_string());
    }

    let db_types = workload.spec.resources.values().any(|r| {
        let t = r.resource_type.to_lowercase();
        DATABASE_TYPE_HINTS.iter().any(|hint| t.contains(hint))
    });
    if db_types {
        features.insert(FEATURE_DATABASE_CONNECTIVITY.to_string());
    }

    features
}
