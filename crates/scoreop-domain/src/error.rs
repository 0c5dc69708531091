use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid workload '{workload}': {message}")]
    InvalidWorkload { workload: String, message: String },

    #[error("invalid resource key '{key}': keys must be lowercase alphanumerics or '-'")]
    InvalidResourceKey { key: String },

    #[error("claim outputs marked available but no output field is populated")]
    EmptyOutputs,

    #[error("invalid endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },
}
