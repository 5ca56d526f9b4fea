//! Plugin descriptor: the static, `Copy` handle to a plugin factory.

use std::sync::Arc;

use super::{Plugin, PluginContext};
use crate::error::PluginResult;

/// Factory that builds a live [`Plugin`] from its context.
pub type CreateFn = fn(Arc<PluginContext>) -> PluginResult<Plugin>;

/// Names a plugin and points at its factory.
///
/// Descriptors are `const`-constructible so they can be contributed to
/// [`PLUGIN_REGISTRY`](super::PLUGIN_REGISTRY) from any crate:
///
/// ```rust,ignore
/// use murmur_framework::linkme;
/// use murmur_framework::plugin::{PLUGIN_REGISTRY, PluginDescriptor};
///
/// #[linkme::distributed_slice(PLUGIN_REGISTRY)]
/// #[linkme(crate = murmur_framework::linkme)]
/// static ECHO: PluginDescriptor = PluginDescriptor::new("echo", create_echo);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Name the plugin is configured under.
    pub name: &'static str,
    /// Factory creating the live plugin.
    pub create: CreateFn,
}

impl PluginDescriptor {
    pub const fn new(name: &'static str, create: CreateFn) -> Self {
        Self { name, create }
    }

    /// Calls the factory.
    #[inline]
    pub fn instantiate(&self, ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
        (self.create)(ctx)
    }
}
