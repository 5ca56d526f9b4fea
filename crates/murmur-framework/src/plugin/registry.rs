use std::collections::HashMap;

use linkme::distributed_slice;
use tracing::{debug, warn};

use super::PluginDescriptor;
use crate::error::{PluginError, PluginResult};

/// Descriptors contributed at link time by built-in and downstream plugins.
#[distributed_slice]
pub static PLUGIN_REGISTRY: [PluginDescriptor];

/// Explicit map from plugin name to factory.
///
/// Configuration names plugins by string; the registry is the only place
/// those strings are resolved.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<&'static str, PluginDescriptor>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every descriptor in [`PLUGIN_REGISTRY`].
    pub fn with_linked() -> Self {
        let mut registry = Self::new();
        for desc in PLUGIN_REGISTRY {
            registry.register(*desc);
        }
        debug!(count = registry.len(), "Collected linked plugins");
        registry
    }

    /// Adds a descriptor. A later registration under the same name wins.
    pub fn register(&mut self, desc: PluginDescriptor) -> &mut Self {
        if self.factories.insert(desc.name, desc).is_some() {
            warn!(plugin = desc.name, "Plugin registered twice, keeping the later one");
        }
        self
    }

    /// Looks up the descriptor configured as `name`.
    pub fn resolve(&self, name: &str) -> PluginResult<PluginDescriptor> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| PluginError::Unresolved {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
