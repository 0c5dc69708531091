use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("provision failed: {0}")]
    ProvisionFailed(String),

    #[error("deprovision failed: {0}")]
    DeprovisionFailed(String),

    #[error("unknown strategy '{0}'")]
    InvalidStrategy(String),

    #[error("no provisioner binding for resource type '{0}'")]
    UnboundType(String),

    #[error("store error: {0}")]
    Store(#[from] scoreop_store::StoreError),

    #[error("internal provisioner error: {0}")]
    Internal(String),
}
