use scoreop_domain::condition::reason;
use scoreop_domain::{ClaimPhase, ClaimSummary, ResourceClaim};
use serde::{Deserialize, Serialize};

/// Folded readiness of all claims belonging to one workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimAggregation {
    pub ready: bool,
    pub reason: String,
    pub message: String,
    /// Per-claim summaries in input order.
    pub summaries: Vec<ClaimSummary>,
}

/// Fold N claim statuses into one readiness summary:
///
/// 1. no claims → not ready, `ClaimPending`;
/// 2. any Failed → not ready, `ClaimFailed`;
/// 3. all Bound with outputs available → ready, `Succeeded`;
/// 4. otherwise → not ready, `ClaimPending`.
///
/// A claim without a phase counts as Pending in its summary; the stored
/// claim is left alone.
pub fn aggregate_claims(claims: &[ResourceClaim]) -> ClaimAggregation {
    let summaries: Vec<ClaimSummary> = claims
        .iter()
        .map(|c| ClaimSummary {
            key: c.spec.key.clone(),
            phase: c.status.phase.unwrap_or(ClaimPhase::Pending),
            reason: c.status.reason.clone(),
            message: c.status.message.clone(),
            outputs_available: c.status.outputs_available,
        })
        .collect();

    if claims.is_empty() {
        return ClaimAggregation {
            ready: false,
            reason: reason::CLAIM_PENDING.to_string(),
            message: "no claims".to_string(),
            summaries,
        };
    }

    if let Some(failed) = claims.iter().find(|c| c.status.phase == Some(ClaimPhase::Failed)) {
        return ClaimAggregation {
            ready: false,
            reason: reason::CLAIM_FAILED.to_string(),
            message: format!("claim '{}' failed: {}", failed.spec.key, failed.status.message),
            summaries,
        };
    }

    let all_bound = claims
        .iter()
        .all(|c| c.status.phase == Some(ClaimPhase::Bound) && c.status.outputs_available);
    if all_bound {
        return ClaimAggregation {
            ready: true,
            reason: reason::SUCCEEDED.to_string(),
            message: "all claims bound".to_string(),
            summaries,
        };
    }

    let pending: Vec<&str> = claims
        .iter()
        .filter(|c| !(c.status.phase == Some(ClaimPhase::Bound) && c.status.outputs_available))
        .map(|c| c.spec.key.as_str())
        .collect();
    ClaimAggregation {
        ready: false,
        reason: reason::CLAIM_PENDING.to_string(),
        message: format!("waiting on claims: {}", pending.join(", ")),
        summaries,
    }
}
