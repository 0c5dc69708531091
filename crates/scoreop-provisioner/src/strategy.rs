use std::time::Duration;

use async_trait::async_trait;
use scoreop_config::ProvisionerBinding;
use scoreop_domain::{ClaimOutputs, ClaimPhase, ResourceClaim};

use crate::error::ProvisionerError;

/// What a strategy reports back from any of its three operations.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    pub phase: ClaimPhase,
    pub reason: String,
    pub message: String,
    pub outputs: Option<ClaimOutputs>,
    /// Strategy-suggested poll delay, overriding the phase default.
    pub requeue_after: Option<Duration>,
}

impl ProvisioningResult {
    pub fn bound(outputs: ClaimOutputs, message: impl Into<String>) -> Self {
        Self {
            phase: ClaimPhase::Bound,
            reason: "Succeeded".into(),
            message: message.into(),
            outputs: Some(outputs),
            requeue_after: None,
        }
    }

    pub fn claiming(message: impl Into<String>) -> Self {
        Self {
            phase: ClaimPhase::Claiming,
            reason: "Provisioning".into(),
            message: message.into(),
            outputs: None,
            requeue_after: None,
        }
    }

    pub fn failed(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase: ClaimPhase::Failed,
            reason: reason.into(),
            message: message.into(),
            outputs: None,
            requeue_after: None,
        }
    }
}

/// One way of realizing a resource claim. Implementations drive the external
/// system; the claim lifecycle controller owns all status writes.
#[async_trait]
pub trait ProvisionerStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Create or update the external resource for this claim.
    async fn provision(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError>;

    /// Tear down the external resource.
    async fn deprovision(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<(), ProvisionerError>;

    /// Read current state without modifying anything. Used for Claiming
    /// polls, Bound health checks, and Failed recovery probes.
    async fn get_status(
        &self,
        claim: &ResourceClaim,
        binding: &ProvisionerBinding,
    ) -> Result<ProvisioningResult, ProvisionerError>;
}
