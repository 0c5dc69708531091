use async_trait::async_trait;
use scoreop_config::ProvisionerBinding;
use scoreop_domain::ResourceClaim;
use tracing::debug;

use crate::error::ProvisionerError;
use crate::strategy::{ProvisionerStrategy, ProvisioningResult};
use crate::template::{render_outputs, TemplateContext};

/// Stub Helm strategy: a real implementation would install the chart named
/// in the binding config. This one synthesizes the release outputs from the
/// binding's output templates and reports Bound immediately.
#[derive(Debug, Default, Clone)]
pub struct HelmStrategy;

impl HelmStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvisionerStrategy for HelmStrategy {
    fn name(&self) -> &'static str {
        "helm"
    }

    async fn provision(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError> {
        debug!(claim = %claim.metadata.name, chart = ?binding.config.get("chart"), "helm: provision");
        let outputs = render_outputs(binding, &TemplateContext::for_claim(claim));
        Ok(ProvisioningResult::bound(outputs, "release installed"))
    }

    async fn deprovision(
        &self,
        claim: &ResourceClaim,
        _binding: &ProvisionerBinding,
    ) -> Result<(), ProvisionerError> {
        debug!(claim = %claim.metadata.name, "helm: deprovision");
        Ok(())
    }

    async fn get_status(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError> {
        debug!(claim = %claim.metadata.name, "helm: get_status");
        let outputs = render_outputs(binding, &TemplateContext::for_claim(claim));
        Ok(ProvisioningResult::bound(outputs, "release healthy"))
    }
}
