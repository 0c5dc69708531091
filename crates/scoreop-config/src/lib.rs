pub mod error;
pub mod loader;
pub mod model;
pub mod raw;

pub use error::ConfigError;
pub use loader::{load_config, parse_config};
pub use model::{
    Backend, BackendConstraints, BackendTemplate, DefaultSelection, LabelSelector,
    LabelSelectorRequirement, OrchestratorConfig, Profile, ProfileRule, ProvisionerBinding,
    ResourceConstraints, SelectorOperator, StrategyKind,
};
