pub mod aggregate;
pub mod claims;
pub mod endpoint;
pub mod error;
pub mod exposure;
pub mod pipeline;
pub mod plan;
pub mod projection;
pub mod status;

pub use aggregate::{aggregate_claims, ClaimAggregation};
pub use claims::ClaimManager;
pub use endpoint::{derive_endpoint, validate_endpoint, DEFAULT_CLUSTER_DOMAIN};
pub use error::ReconcileError;
pub use exposure::{ExposureMirror, ExposureRegistrar};
pub use pipeline::{WorkloadReconciler, MAX_CONCURRENT_RECONCILES, WORKLOAD_FINALIZER};
pub use plan::{compose_values, PlanManager};
pub use projection::{build_projection, check_feasibility, parse_output_reference};
pub use status::StatusManager;
