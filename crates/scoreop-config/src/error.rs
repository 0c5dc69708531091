use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml parse error in {path}: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown profile '{profile}' referenced by {referrer}")]
    UnknownProfile { profile: String, referrer: String },

    #[error("unknown strategy '{strategy}' for provisioner type '{resource_type}'")]
    UnknownStrategy { strategy: String, resource_type: String },
}
