use async_trait::async_trait;
use scoreop_config::ProvisionerBinding;
use scoreop_domain::ResourceClaim;
use tracing::debug;

use crate::error::ProvisionerError;
use crate::strategy::{ProvisionerStrategy, ProvisioningResult};
use crate::template::{render_outputs, TemplateContext};

/// Stub manifest strategy: a real implementation would apply the manifest
/// bundle from the binding config and wait for rollout.
#[derive(Debug, Default, Clone)]
pub struct ManifestsStrategy;

impl ManifestsStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvisionerStrategy for ManifestsStrategy {
    fn name(&self) -> &'static str {
        "manifests"
    }

    async fn provision(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError> {
        debug!(claim = %claim.metadata.name, "manifests: provision");
        let outputs = render_outputs(binding, &TemplateContext::for_claim(claim));
        Ok(ProvisioningResult::bound(outputs, "manifests applied"))
    }

    async fn deprovision(
        &self,
        claim: &ResourceClaim,
        _binding: &ProvisionerBinding,
    ) -> Result<(), ProvisionerError> {
        debug!(claim = %claim.metadata.name, "manifests: deprovision");
        Ok(())
    }

    async fn get_status(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError> {
        debug!(claim = %claim.metadata.name, "manifests: get_status");
        let outputs = render_outputs(binding, &TemplateContext::for_claim(claim));
        Ok(ProvisioningResult::bound(outputs, "objects present"))
    }
}
