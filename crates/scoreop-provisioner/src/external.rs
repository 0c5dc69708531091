use std::time::Duration;

use async_trait::async_trait;
use scoreop_config::ProvisionerBinding;
use scoreop_domain::ResourceClaim;
use tracing::debug;

use crate::error::ProvisionerError;
use crate::strategy::{ProvisionerStrategy, ProvisioningResult};
use crate::template::{render_outputs, TemplateContext};

/// Stub external-API strategy: a real implementation would POST the request
/// to the broker at `binding.config.endpoint` and poll for completion. This
/// one accepts asynchronously — provision reports Claiming, the status poll
/// reports Bound — so the two-step path through the claim state machine is
/// exercised.
#[derive(Debug, Default, Clone)]
pub struct ExternalApiStrategy;

impl ExternalApiStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvisionerStrategy for ExternalApiStrategy {
    fn name(&self) -> &'static str {
        "external-api"
    }

    async fn provision(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError> {
        debug!(
            claim = %claim.metadata.name,
            endpoint = ?binding.config.get("endpoint"),
            "external-api: provision request submitted"
        );
        let mut result = ProvisioningResult::claiming("request accepted by broker");
        result.requeue_after = Some(Duration::from_secs(10));
        Ok(result)
    }

    async fn deprovision(
        &self,
        claim: &ResourceClaim,
        _binding: &ProvisionerBinding,
    ) -> Result<(), ProvisionerError> {
        debug!(claim = %claim.metadata.name, "external-api: deprovision");
        Ok(())
    }

    async fn get_status(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError> {
        debug!(claim = %claim.metadata.name, "external-api: poll");
        let outputs = render_outputs(binding, &TemplateContext::for_claim(claim));
        Ok(ProvisioningResult::bound(outputs, "broker reports ready"))
    }
}
