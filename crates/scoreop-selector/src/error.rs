use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("profile '{0}' does not exist")]
    UnknownProfile(String),

    #[error("no backend in profile '{profile}' accepts this workload")]
    NoCandidates { profile: String },

    #[error("invalid quantity '{0}': only m, Mi, Gi and plain integers are recognized")]
    InvalidQuantity(String),

    #[error("invalid quantity range '{0}'")]
    InvalidRange(String),
}
