pub mod controller;
pub mod error;
pub mod external;
pub mod helm;
pub mod manifests;
pub mod registry;
pub mod strategy;
pub mod template;

pub use controller::{should_reconcile, ClaimReconciler, PROVISIONER_FINALIZER};
pub use error::ProvisionerError;
pub use external::ExternalApiStrategy;
pub use helm::HelmStrategy;
pub use manifests::ManifestsStrategy;
pub use registry::StrategyRegistry;
pub use strategy::{ProvisionerStrategy, ProvisioningResult};
pub use template::{render_outputs, render_template, TemplateContext};
