use std::collections::BTreeSet;

use scoreop_domain::{
    EnvMapping, FileProjection, OutputRef, ResourceClaim, VolumeProjection, VolumeSource,
    WorkloadProjection, WorkloadSpec,
};

/// Parse a whole-string claim output reference of the form
/// `${resources.<key>.outputs.<field>}`. Partial matches and embedded
/// references do not count.
pub fn parse_output_reference(value: &str) -> Option<(&str, &str)> {
    let inner = value.strip_prefix("${resources.")?.strip_suffix('}')?;
    let (key, field) = inner.split_once(".outputs.")?;
    if key.is_empty() || field.is_empty() || field.contains('.') || key.contains('$') {
        return None;
    }
    Some((key, field))
}

fn find_claim<'a>(claims: &'a [ResourceClaim], key: &str) -> Option<&'a ResourceClaim> {
    claims.iter().find(|c| c.spec.key == key)
}

/// Every output reference in the spec must resolve against a claim with
/// available outputs and the named field populated. Returns a message
/// naming the first violation.
pub fn check_feasibility(spec: &WorkloadSpec, claims: &[ResourceClaim]) -> Result<(), String> {
    for (container_name, container) in &spec.containers {
        for (var, value) in &container.variables {
            if let Some((key, field)) = parse_output_reference(value) {
                check_reference(claims, key, field).map_err(|why| {
                    format!("env var '{var}' in container '{container_name}': {why}")
                })?;
            }
        }
        for mount in &container.files {
            if let Some(source) = &mount.source {
                if let Some((key, field)) = parse_output_reference(source) {
                    check_reference(claims, key, field).map_err(|why| {
                        format!("file mount '{}' in container '{container_name}': {why}", mount.target)
                    })?;
                }
            }
        }
    }
    Ok(())
}

fn check_reference(claims: &[ResourceClaim], key: &str, field: &str) -> Result<(), String> {
    let Some(claim) = find_claim(claims, key) else {
        return Err(format!("no claim for resource '{key}'"));
    };
    if !claim.status.outputs_available {
        return Err(format!("claim '{key}' has no outputs yet"));
    }
    let populated = claim
        .status
        .outputs
        .as_ref()
        .and_then(|o| o.field(field))
        .is_some();
    if !populated {
        return Err(format!("claim '{key}' does not populate output '{field}'"));
    }
    Ok(())
}

/// Build the env/volume/file projections wiring claim outputs into the
/// running workload. Static file mounts (inline content or host paths) pass
/// through untouched and produce nothing here.
pub fn build_projection(spec: &WorkloadSpec, claims: &[ResourceClaim]) -> WorkloadProjection {
    let mut projection = WorkloadProjection::default();
    let mut seen_env: BTreeSet<(String, String, String)> = BTreeSet::new();

    for container in spec.containers.values() {
        for (var, value) in &container.variables {
            if let Some((key, field)) = parse_output_reference(value) {
                if seen_env.insert((var.clone(), key.to_string(), field.to_string())) {
                    projection.env.push(EnvMapping {
                        name: var.clone(),
                        from: OutputRef {
                            claim_key: key.to_string(),
                            output_key: field.to_string(),
                        },
                    });
                }
            }
        }

        for mount in &container.files {
            let Some(source) = &mount.source else { continue };
            let Some((key, field)) = parse_output_reference(source) else { continue };
            let Some(claim) = find_claim(claims, key) else { continue };
            let Some(outputs) = &claim.status.outputs else { continue };
            match field {
                "secretRef" => {
                    if let Some(secret) = &outputs.secret_ref {
                        projection.volumes.push(VolumeProjection {
                            target: mount.target.clone(),
                            claim_key: key.to_string(),
                            source: VolumeSource::Secret(secret.clone()),
                        });
                    }
                }
                "configMapRef" => {
                    if let Some(config_map) = &outputs.config_map_ref {
                        projection.volumes.push(VolumeProjection {
                            target: mount.target.clone(),
                            claim_key: key.to_string(),
                            source: VolumeSource::ConfigMap(config_map.clone()),
                        });
                    }
                }
                "cert" => {
                    if let Some(cert) = &outputs.cert {
                        projection.files.push(FileProjection {
                            target: mount.target.clone(),
                            claim_key: key.to_string(),
                            cert: cert.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    // Claims that only expose a URI get a default `<KEY>_URI` variable when
    // nothing in the spec references it explicitly.
    for claim in claims {
        let Some(outputs) = &claim.status.outputs else { continue };
        let uri_only = outputs.uri.as_ref().is_some_and(|u| !u.is_empty())
            && outputs.secret_ref.is_none()
            && outputs.config_map_ref.is_none()
            && outputs.image.is_none()
            && outputs.cert.is_none();
        if !uri_only {
            continue;
        }
        let referenced = projection
            .env
            .iter()
            .any(|m| m.from.claim_key == claim.spec.key && m.from.output_key == "uri");
        if !referenced {
            let name = format!(
                "{}_URI",
                claim.spec.key.to_uppercase().replace('-', "_")
            );
            projection.env.push(EnvMapping {
                name,
                from: OutputRef {
                    claim_key: claim.spec.key.clone(),
                    output_key: "uri".to_string(),
                },
            });
        }
    }

    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreop_domain::meta::ObjectMeta;
    use scoreop_domain::{
        ClaimOutputs, ContainerSpec, FileMount, LocalObjectRef, ResourceClaimSpec, WorkloadRef,
    };

    fn bound_claim(key: &str, outputs: ClaimOutputs) -> ResourceClaim {
        let mut c = ResourceClaim {
            metadata: ObjectMeta::new("default", format!("web-{key}")),
            spec: ResourceClaimSpec {
                workload_ref: WorkloadRef::new("default", "web"),
                key: key.into(),
                resource_type: "postgres".into(),
                ..Default::default()
            },
            status: Default::default(),
        };
        c.status.outputs_available = outputs.is_populated();
        c.status.outputs = Some(outputs);
        c
    }

    fn spec_with_env(var: &str, value: &str) -> WorkloadSpec {
        let mut spec = WorkloadSpec::default();
        let mut container = ContainerSpec { image: "nginx:latest".into(), ..Default::default() };
        container.variables.insert(var.into(), value.into());
        spec.containers.insert("app".into(), container);
        spec
    }

    #[test]
    fn reference_parsing_is_strict() {
        assert_eq!(
            parse_output_reference("${resources.db.outputs.uri}"),
            Some(("db", "uri"))
        );
        assert_eq!(parse_output_reference("${resources.db.outputs.uri} extra"), None);
        assert_eq!(parse_output_reference("prefix ${resources.db.outputs.uri}"), None);
        assert_eq!(parse_output_reference("${resources.db.uri}"), None);
        assert_eq!(parse_output_reference("${resources..outputs.uri}"), None);
        assert_eq!(parse_output_reference("plain-value"), None);
    }

    #[test]
    fn feasible_reference_passes() {
        let spec = spec_with_env("DB_URI", "${resources.db.outputs.uri}");
        let claims = vec![bound_claim(
            "db",
            ClaimOutputs { uri: Some("postgres://db:5432/app".into()), ..Default::default() },
        )];
        assert!(check_feasibility(&spec, &claims).is_ok());
    }

    #[test]
    fn unpopulated_field_is_infeasible() {
        // References `host`, but the claim only populates `uri`.
        let spec = spec_with_env("DB_HOST", "${resources.db.outputs.host}");
        let claims = vec![bound_claim(
            "db",
            ClaimOutputs { uri: Some("postgres://db:5432/app".into()), ..Default::default() },
        )];
        let err = check_feasibility(&spec, &claims).unwrap_err();
        assert!(err.contains("host"), "{err}");
    }

    #[test]
    fn missing_claim_is_infeasible() {
        let spec = spec_with_env("DB_URI", "${resources.db.outputs.uri}");
        assert!(check_feasibility(&spec, &[]).is_err());
    }

    #[test]
    fn env_references_become_mappings() {
        let spec = spec_with_env("DB_URI", "${resources.db.outputs.uri}");
        let claims = vec![bound_claim(
            "db",
            ClaimOutputs { uri: Some("postgres://db:5432/app".into()), ..Default::default() },
        )];
        let projection = build_projection(&spec, &claims);
        assert_eq!(projection.env.len(), 1);
        assert_eq!(projection.env[0].name, "DB_URI");
        assert_eq!(projection.env[0].from.claim_key, "db");
        assert_eq!(projection.env[0].from.output_key, "uri");
    }

    #[test]
    fn uri_only_claim_gets_default_mapping() {
        let spec = spec_with_env("UNRELATED", "plain");
        let claims = vec![bound_claim(
            "message-queue",
            ClaimOutputs { uri: Some("amqp://mq:5672".into()), ..Default::default() },
        )];
        let projection = build_projection(&spec, &claims);
        assert_eq!(projection.env.len(), 1);
        assert_eq!(projection.env[0].name, "MESSAGE_QUEUE_URI");
    }

    #[test]
    fn explicit_uri_reference_suppresses_default() {
        let spec = spec_with_env("DATABASE_URL", "${resources.db.outputs.uri}");
        let claims = vec![bound_claim(
            "db",
            ClaimOutputs { uri: Some("postgres://db:5432/app".into()), ..Default::default() },
        )];
        let projection = build_projection(&spec, &claims);
        assert_eq!(projection.env.len(), 1);
        assert_eq!(projection.env[0].name, "DATABASE_URL");
    }

    #[test]
    fn secret_mounts_become_volume_projections() {
        let mut spec = WorkloadSpec::default();
        let mut container = ContainerSpec { image: "nginx:latest".into(), ..Default::default() };
        container.files.push(FileMount {
            target: "/etc/creds".into(),
            content: None,
            source: Some("${resources.db.outputs.secretRef}".into()),
        });
        container.files.push(FileMount {
            target: "/etc/static.conf".into(),
            content: Some("inline".into()),
            source: None,
        });
        spec.containers.insert("app".into(), container);

        let claims = vec![bound_claim(
            "db",
            ClaimOutputs {
                secret_ref: Some(LocalObjectRef::new("db-credentials")),
                ..Default::default()
            },
        )];
        let projection = build_projection(&spec, &claims);
        assert_eq!(projection.volumes.len(), 1);
        assert_eq!(projection.volumes[0].target, "/etc/creds");
        assert!(matches!(
            &projection.volumes[0].source,
            VolumeSource::Secret(r) if r.name == "db-credentials"
        ));
        assert!(projection.files.is_empty());
    }

    #[test]
    fn cert_mounts_become_file_projections() {
        let mut spec = WorkloadSpec::default();
        let mut container = ContainerSpec { image: "nginx:latest".into(), ..Default::default() };
        container.files.push(FileMount {
            target: "/etc/tls/ca.pem".into(),
            content: None,
            source: Some("${resources.db.outputs.cert}".into()),
        });
        spec.containers.insert("app".into(), container);

        let claims = vec![bound_claim(
            "db",
            ClaimOutputs {
                uri: Some("postgres://db:5432/app".into()),
                cert: Some("-----BEGIN CERTIFICATE-----".into()),
                ..Default::default()
            },
        )];
        let projection = build_projection(&spec, &claims);
        assert_eq!(projection.files.len(), 1);
        assert_eq!(projection.files[0].claim_key, "db");
        assert!(projection.files[0].cert.starts_with("-----BEGIN"));
    }
}
