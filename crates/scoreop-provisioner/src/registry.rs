use std::collections::HashMap;
use std::sync::Arc;

use scoreop_config::{OrchestratorConfig, ProvisionerBinding, StrategyKind};

use crate::error::ProvisionerError;
use crate::external::ExternalApiStrategy;
use crate::helm::HelmStrategy;
use crate::manifests::ManifestsStrategy;
use crate::strategy::ProvisionerStrategy;

/// Maps resource types to their provisioner binding and strategy
/// implementation. Bindings come from the orchestrator config; the three
/// built-in strategies are registered by default.
pub struct StrategyRegistry {
    bindings: HashMap<String, ProvisionerBinding>,
    strategies: HashMap<StrategyKind, Arc<dyn ProvisionerStrategy>>,
}

impl StrategyRegistry {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let mut registry = Self {
            bindings: config
                .provisioners
                .iter()
                .map(|b| (b.resource_type.clone(), b.clone()))
                .collect(),
            strategies: HashMap::new(),
        };
        registry.register(StrategyKind::Helm, Arc::new(HelmStrategy::new()));
        registry.register(StrategyKind::Manifests, Arc::new(ManifestsStrategy::new()));
        registry.register(StrategyKind::ExternalApi, Arc::new(ExternalApiStrategy::new()));
        registry
    }

    /// Replace or add the implementation for a strategy kind. Tests use this
    /// to observe or script strategy behavior.
    pub fn register(&mut self, kind: StrategyKind, strategy: Arc<dyn ProvisionerStrategy>) -> &mut Self {
        self.strategies.insert(kind, strategy);
        self
    }

    /// Resolve the strategy and binding for a resource type.
    pub fn resolve(
        &self,
        resource_type: &str,
    ) -> Result<(Arc<dyn ProvisionerStrategy>, &ProvisionerBinding), ProvisionerError> {
        let binding = self
            .bindings
            .get(resource_type)
            .ok_or_else(|| ProvisionerError::UnboundType(resource_type.to_string()))?;
        let strategy = self
            .strategies
            .get(&binding.strategy)
            .cloned()
            .ok_or_else(|| ProvisionerError::InvalidStrategy(binding.strategy.to_string()))?;
        Ok((strategy, binding))
    }
}
