use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] scoreop_store::StoreError),

    #[error("selector error: {0}")]
    Selector(#[from] scoreop_selector::SelectorError),

    #[error("domain error: {0}")]
    Domain(#[from] scoreop_domain::DomainError),

    #[error("internal error: {0}")]
    Internal(String),
}
