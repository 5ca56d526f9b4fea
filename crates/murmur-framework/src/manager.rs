//! Plugin loading and lifecycle.
//!
//! [`PluginManager`] is the owner of every live plugin. It:
//!
//! - Resolves each configured name through a [`PluginRegistry`] and calls
//!   the factory with a freshly built [`PluginContext`].
//! - Fails the whole load on the first unresolved name, duplicate name or
//!   factory error. A manager never holds a partial plugin set.
//! - Keeps plugins in configuration order and exposes them by priority.
//! - Answers the [`REQUEST_PLUGINS`] and [`REQUEST_USAGE`] signals for as
//!   long as it lives.
//!
//! # Example
//!
//! ```rust,ignore
//! use murmur_framework::{PluginManager, PluginServices};
//! use murmur_framework::plugin::{PluginEntry, PluginRegistry};
//!
//! let services = PluginServices::default();
//! let manager = PluginManager::load(
//!     &[PluginEntry::new("maintenance")],
//!     &PluginRegistry::with_linked(),
//!     services.clone(),
//! )?;
//! // …later…
//! services.scheduler.shutdown().await;
//! manager.unload_all();
//! ```

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use murmur_core::signal::{REQUEST_PLUGINS, REQUEST_USAGE, receiver};
use murmur_core::{CacheManager, OutboundMessage, Payload, Receiver, Reference, SignalBus};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, info_span};

use crate::error::{PluginError, PluginResult};
use crate::plugin::{Plugin, PluginContext, PluginEntry, PluginRegistry};
use crate::scheduler::Scheduler;

// =============================================================================
// Shared services
// =============================================================================

/// The context objects shared by every plugin.
///
/// Created once at startup. The default value creates fresh, empty
/// instances of each.
#[derive(Clone, Default)]
pub struct PluginServices {
    pub caches: Arc<CacheManager>,
    pub signals: Arc<SignalBus>,
    pub scheduler: Scheduler,
}

// =============================================================================
// Plugin state
// =============================================================================

/// Lifecycle state of a loaded plugin.
///
/// The state machine is:
///
/// ```text
/// load()          ──► Loaded    (options merged, factory called)
/// first dispatch  ──► Active
/// unload_all()    ──► Unloaded  (on_unload hook ran; no more dispatch)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Created but no event has reached it yet.
    Loaded,
    /// Receiving events.
    Active,
    /// Unload hook ran. Handlers are never invoked again.
    Unloaded,
}

/// A plugin together with its context and lifecycle state.
pub struct LoadedPlugin {
    plugin: Plugin,
    context: Arc<PluginContext>,
    state: Mutex<PluginState>,
}

impl LoadedPlugin {
    /// The configured name.
    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    pub fn priority(&self) -> i32 {
        self.context.priority()
    }

    /// The whitelist, if it restricts anything.
    pub fn whitelist(&self) -> Option<&[String]> {
        self.context.options().active_whitelist()
    }

    pub fn state(&self) -> PluginState {
        *self.state.lock()
    }

    /// Marks the plugin active. Returns `false` once it has been unloaded.
    pub(crate) fn activate(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            PluginState::Loaded => {
                *state = PluginState::Active;
                debug!(plugin = %self.name(), "Plugin active");
                true
            }
            PluginState::Active => true,
            PluginState::Unloaded => false,
        }
    }

    /// Runs the unload hook once.
    fn unload(&self) {
        {
            let mut state = self.state.lock();
            if *state == PluginState::Unloaded {
                return;
            }
            *state = PluginState::Unloaded;
        }
        self.plugin.unload(&self.context);
        info!(plugin = %self.name(), "Plugin unloaded");
    }
}

// =============================================================================
// PluginManager
// =============================================================================

/// Owner of all live plugins, in configuration order.
pub struct PluginManager {
    plugins: Vec<Arc<LoadedPlugin>>,
    services: PluginServices,
    // Kept alive so the weak signal connections stay live.
    _receivers: Vec<Arc<dyn Receiver>>,
}

impl PluginManager {
    /// Instantiates every configured plugin.
    ///
    /// Each plugin gets the cache named after it from `services.caches`.
    ///
    /// # Errors
    ///
    /// - [`PluginError::DuplicateName`] if a name appears twice.
    /// - [`PluginError::Unresolved`] if a name is not in `registry`.
    /// - [`PluginError::Cache`] if a plugin's cache cannot be created.
    /// - Whatever a factory returns, typically [`PluginError::Factory`] or
    ///   [`PluginError::InvalidOptions`].
    pub fn load(
        entries: &[PluginEntry],
        registry: &PluginRegistry,
        services: PluginServices,
    ) -> PluginResult<Self> {
        let span = info_span!("load_plugins", count = entries.len());
        let _enter = span.enter();

        let mut seen = HashSet::new();
        let descriptors = entries
            .iter()
            .map(|entry| {
                if !seen.insert(entry.name.as_str()) {
                    return Err(PluginError::DuplicateName {
                        name: entry.name.clone(),
                    });
                }
                registry.resolve(&entry.name)
            })
            .collect::<PluginResult<Vec<_>>>()
            .inspect_err(|e| error!(error = %e, "Plugin resolution failed"))?;

        let mut plugins = Vec::with_capacity(entries.len());
        for (entry, desc) in entries.iter().zip(descriptors) {
            let cache = services
                .caches
                .get_cache(&entry.name)
                .map_err(|source| PluginError::Cache {
                    name: entry.name.clone(),
                    source,
                })?;
            let context = Arc::new(PluginContext::new(
                &entry.name,
                entry.options.clone(),
                cache,
                Arc::clone(&services.signals),
                services.scheduler.clone(),
            ));

            let plugin = desc
                .instantiate(Arc::clone(&context))
                .inspect_err(|e| error!(plugin = %entry.name, error = %e, "Plugin failed to load"))?;

            info!(
                plugin = %entry.name,
                priority = entry.options.priority,
                handlers = plugin.events().len(),
                "Plugin loaded"
            );
            plugins.push(Arc::new(LoadedPlugin {
                plugin,
                context,
                state: Mutex::new(PluginState::Loaded),
            }));
        }

        let receivers = Self::connect_introspection(&plugins, &services.signals);
        Ok(Self {
            plugins,
            services,
            _receivers: receivers,
        })
    }

    fn connect_introspection(
        plugins: &[Arc<LoadedPlugin>],
        signals: &SignalBus,
    ) -> Vec<Arc<dyn Receiver>> {
        let names: Vec<Value> = plugins.iter().map(|p| Value::from(p.name())).collect();
        let usages: HashMap<String, String> = plugins
            .iter()
            .map(|p| (p.name().to_string(), p.plugin().usage()))
            .collect();

        let list = receiver(move |_: &Payload| Ok(Value::Array(names.clone())));
        let usage = receiver(move |payload: &Payload| {
            let name = payload
                .get_str("name")
                .or_else(|| payload.args.first().and_then(Value::as_str));
            Ok(name
                .and_then(|n| usages.get(n))
                .map_or(Value::Null, |u| Value::from(u.as_str())))
        });

        signals.connect(&list, REQUEST_PLUGINS, Reference::Weak);
        signals.connect(&usage, REQUEST_USAGE, Reference::Weak);
        vec![list, usage]
    }

    /// Plugins in configuration order.
    pub fn plugins(&self) -> &[Arc<LoadedPlugin>] {
        &self.plugins
    }

    /// Plugins by descending priority. Equal priorities keep configuration order.
    pub fn plugins_by_priority(&self) -> Vec<Arc<LoadedPlugin>> {
        let mut sorted = self.plugins.clone();
        sorted.sort_by_key(|p| Reverse(p.priority()));
        sorted
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LoadedPlugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Usage text of the plugin configured as `name`.
    pub fn usage(&self, name: &str) -> Option<String> {
        self.get(name).map(|p| p.plugin().usage())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn services(&self) -> &PluginServices {
        &self.services
    }

    /// Takes every plugin's queued messages, highest priority first.
    ///
    /// Plugins of equal priority keep configuration order; each plugin's
    /// messages keep the order they were queued in.
    pub fn drain_outboxes(&self) -> Vec<OutboundMessage> {
        self.plugins_by_priority()
            .iter()
            .flat_map(|p| p.context().flush_output())
            .collect()
    }

    /// Runs every plugin's unload hook, last configured first.
    ///
    /// Calling this twice is harmless; each hook runs once.
    pub fn unload_all(&self) {
        for plugin in self.plugins.iter().rev() {
            plugin.unload();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use murmur_core::CacheExt;
    use serde_json::json;

    use super::*;
    use crate::plugin::{PluginDescriptor, PluginOptions};

    static UNLOADS: AtomicUsize = AtomicUsize::new(0);

    fn plain(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
        Ok(Plugin::builder(ctx.name()).usage(format!("usage of {}", ctx.name())).build())
    }

    fn counted(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
        Ok(Plugin::builder(ctx.name())
            .on_unload(|_| {
                UNLOADS.fetch_add(1, Ordering::SeqCst);
            })
            .build())
    }

    fn failing(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
        Err(PluginError::factory(ctx.name(), "missing api key"))
    }

    fn strict(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
        let _sides: u32 = ctx.option("sides")?.unwrap_or(6);
        plain(ctx)
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register(PluginDescriptor::new(name, plain));
        }
        registry
            .register(PluginDescriptor::new("counted", counted))
            .register(PluginDescriptor::new("failing", failing))
            .register(PluginDescriptor::new("strict", strict));
        registry
    }

    fn entry(name: &str, priority: i32) -> PluginEntry {
        PluginEntry::new(name).with_options(PluginOptions::new().with_priority(priority))
    }

    #[test]
    fn test_load_keeps_config_order() {
        let entries = [entry("a", 0), entry("b", 42), entry("c", 1)];
        let manager = PluginManager::load(&entries, &registry(), PluginServices::default()).unwrap();
        assert_eq!(manager.names(), vec!["a", "b", "c"]);

        let by_priority: Vec<i32> = manager
            .plugins_by_priority()
            .iter()
            .map(|p| p.priority())
            .collect();
        assert_eq!(by_priority, vec![42, 1, 0]);
        assert!(manager.plugins().iter().all(|p| p.state() == PluginState::Loaded));
    }

    #[test]
    fn test_equal_priority_keeps_config_order() {
        let entries = [entry("c", 5), entry("a", 5), entry("b", 9)];
        let manager = PluginManager::load(&entries, &registry(), PluginServices::default()).unwrap();
        let names: Vec<String> = manager
            .plugins_by_priority()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_unknown_plugin_fails() {
        let entries = [entry("a", 0), entry("nope", 0)];
        let result = PluginManager::load(&entries, &registry(), PluginServices::default());
        assert!(matches!(result, Err(PluginError::Unresolved { ref name }) if name == "nope"));
    }

    #[test]
    fn test_duplicate_name_fails() {
        let entries = [entry("a", 0), entry("a", 1)];
        let result = PluginManager::load(&entries, &registry(), PluginServices::default());
        assert!(matches!(result, Err(PluginError::DuplicateName { .. })));
    }

    #[test]
    fn test_factory_failure_is_fatal() {
        let entries = [entry("a", 0), entry("failing", 0)];
        let result = PluginManager::load(&entries, &registry(), PluginServices::default());
        assert!(matches!(result, Err(PluginError::Factory { ref name, .. }) if name == "failing"));
    }

    #[test]
    fn test_invalid_options_fail() {
        let bad = PluginEntry::new("strict")
            .with_options(PluginOptions::new().with_option("sides", "twenty"));
        let result = PluginManager::load(&[bad], &registry(), PluginServices::default());
        assert!(matches!(result, Err(PluginError::InvalidOptions { .. })));

        let good =
            PluginEntry::new("strict").with_options(PluginOptions::new().with_option("sides", 20));
        assert!(PluginManager::load(&[good], &registry(), PluginServices::default()).is_ok());
    }

    #[test]
    fn test_each_plugin_gets_named_cache() {
        let services = PluginServices::default();
        let manager =
            PluginManager::load(&[entry("a", 0)], &registry(), services.clone()).unwrap();
        manager.plugins()[0].context().cache().set("k", &1, None).unwrap();

        let same = services.caches.get_cache("a").unwrap();
        assert_eq!(same.get::<i32>("k").unwrap(), Some(1));
    }

    #[test]
    fn test_answers_introspection_signals() {
        let services = PluginServices::default();
        let manager = PluginManager::load(
            &[entry("b", 0), entry("a", 0)],
            &registry(),
            services.clone(),
        )
        .unwrap();
        let bus = &services.signals;

        let plugins = bus.send(REQUEST_PLUGINS, &Payload::new()).unwrap();
        assert_eq!(plugins, vec![json!(["b", "a"])]);

        let usage = bus
            .send(REQUEST_USAGE, &Payload::new().kwarg("name", "a"))
            .unwrap();
        assert_eq!(usage, vec![json!("usage of a")]);
        let positional = bus.send(REQUEST_USAGE, &Payload::new().arg("b")).unwrap();
        assert_eq!(positional, vec![json!("usage of b")]);
        let unknown = bus
            .send(REQUEST_USAGE, &Payload::new().kwarg("name", "zzz"))
            .unwrap();
        assert_eq!(unknown, vec![Value::Null]);

        drop(manager);
        assert!(bus.send(REQUEST_PLUGINS, &Payload::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unload_all_runs_hooks_once() {
        let manager =
            PluginManager::load(&[entry("counted", 0)], &registry(), PluginServices::default())
                .unwrap();
        let before = UNLOADS.load(Ordering::SeqCst);
        let plugin = Arc::clone(&manager.plugins()[0]);
        assert!(plugin.activate());
        assert_eq!(plugin.state(), PluginState::Active);

        manager.unload_all();
        manager.unload_all();
        assert_eq!(UNLOADS.load(Ordering::SeqCst), before + 1);
        assert_eq!(plugin.state(), PluginState::Unloaded);
        assert!(!plugin.activate());
    }

    #[test]
    fn test_drain_outboxes_by_priority() {
        let manager = PluginManager::load(
            &[entry("b", 0), entry("a", 9), entry("c", 0)],
            &registry(),
            PluginServices::default(),
        )
        .unwrap();
        manager.get("c").unwrap().context().send_message("chat", "from c");
        manager.get("b").unwrap().context().send_message("chat", "from b");
        let a = manager.get("a").unwrap().context();
        a.send_message("chat", "from a");
        a.send_message("chat", "again from a");

        let texts: Vec<String> = manager.drain_outboxes().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["from a", "again from a", "from b", "from c"]);
        assert!(manager.drain_outboxes().is_empty());
    }
}
