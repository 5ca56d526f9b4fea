use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use murmur_core::{Args, Cache, EventKind, Flow, OutboundMessage, Outbox, SignalBus};
use serde::de::DeserializeOwned;

use super::config::PluginOptions;
use crate::error::{PluginError, PluginResult};
use crate::scheduler::Scheduler;

/// Event handler stored inside a [`Plugin`].
pub type HandlerFn = Arc<dyn Fn(&PluginContext, Args) -> Flow + Send + Sync>;

/// Hook run once when the plugin is unloaded.
pub type UnloadFn = Box<dyn Fn(&PluginContext) + Send + Sync>;

// ─── PluginContext ────────────────────────────────────────────────────────────

/// Everything a plugin instance owns or shares.
///
/// Created by the [`PluginManager`](crate::PluginManager) before the plugin's
/// factory runs and handed to every handler call.
pub struct PluginContext {
    name: String,
    options: PluginOptions,
    cache: Arc<dyn Cache>,
    signals: Arc<SignalBus>,
    outbox: Outbox,
    scheduler: Scheduler,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("cache", &self.cache.backend())
            .field("pending", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl PluginContext {
    pub fn new(
        name: impl Into<String>,
        options: PluginOptions,
        cache: Arc<dyn Cache>,
        signals: Arc<SignalBus>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            cache,
            signals,
            outbox: Outbox::new(),
            scheduler,
        }
    }

    /// The configured plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    pub fn priority(&self) -> i32 {
        self.options.priority
    }

    /// Plugin-specific option `key` decoded as `T`.
    pub fn option<T: DeserializeOwned>(&self, key: &str) -> PluginResult<Option<T>> {
        self.options
            .option(key)
            .map_err(|e| PluginError::invalid_options(&self.name, e))
    }

    /// All plugin-specific options decoded as `T`.
    pub fn options_as<T: DeserializeOwned>(&self) -> PluginResult<T> {
        self.options
            .options_as()
            .map_err(|e| PluginError::invalid_options(&self.name, e))
    }

    /// This plugin's cache.
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// The bus shared by all plugins.
    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Queues `text` for `chat`. Delivered on the runtime's next flush.
    pub fn send_message(&self, chat: impl Into<String>, text: impl Into<String>) {
        self.outbox.send(chat, text);
    }

    /// Takes every queued message.
    pub fn flush_output(&self) -> Vec<OutboundMessage> {
        self.outbox.drain()
    }

    /// Runs `task` every `period` until the runtime shuts down.
    ///
    /// The task name is prefixed with the plugin name in logs.
    pub fn spawn_periodic<F>(&self, task: &str, period: Duration, f: F) -> PluginResult<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.scheduler
            .spawn_periodic(format!("{}.{task}", self.name), period, f)?;
        Ok(())
    }
}

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// A live plugin: its event handlers and optional unload hook.
///
/// Built with [`Plugin::builder`] inside a plugin's factory:
///
/// ```rust
/// use std::sync::Arc;
/// use murmur_core::{EventKind, Flow};
/// use murmur_framework::plugin::{Plugin, PluginContext};
/// use murmur_framework::PluginResult;
///
/// fn create(ctx: Arc<PluginContext>) -> PluginResult<Plugin> {
///     Ok(Plugin::builder(ctx.name())
///         .usage("Marks every message as read")
///         .on(EventKind::MessageStatus, |_ctx, _args| Flow::Unchanged)
///         .build())
/// }
/// ```
pub struct Plugin {
    name: String,
    usage: Option<String>,
    handlers: BTreeMap<EventKind, HandlerFn>,
    on_unload: Option<UnloadFn>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("events", &self.events())
            .field("on_unload", &self.on_unload.is_some())
            .finish()
    }
}

impl Plugin {
    pub fn builder(name: impl Into<String>) -> PluginBuilder {
        PluginBuilder {
            plugin: Plugin {
                name: name.into(),
                usage: None,
                handlers: BTreeMap::new(),
                on_unload: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Usage text shown by `!help`.
    pub fn usage(&self) -> String {
        self.usage
            .clone()
            .unwrap_or_else(|| format!("No known usage for {}", self.name))
    }

    /// Handler bound to `kind`, if any.
    pub fn handler(&self, kind: EventKind) -> Option<&HandlerFn> {
        self.handlers.get(&kind)
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Events this plugin handles, in declaration order of [`EventKind`].
    pub fn events(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    pub(crate) fn unload(&self, ctx: &PluginContext) {
        if let Some(hook) = &self.on_unload {
            hook(ctx);
        }
    }
}

/// Builder returned by [`Plugin::builder`].
#[must_use]
pub struct PluginBuilder {
    plugin: Plugin,
}

impl PluginBuilder {
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.plugin.usage = Some(usage.into());
        self
    }

    /// Binds `handler` to `kind`, replacing any earlier binding for it.
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&PluginContext, Args) -> Flow + Send + Sync + 'static,
    {
        self.plugin.handlers.insert(kind, Arc::new(handler));
        self
    }

    pub fn on_unload<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PluginContext) + Send + Sync + 'static,
    {
        self.plugin.on_unload = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Plugin {
        self.plugin
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::{CacheExt, MemoryCache, args};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn context(options: PluginOptions) -> PluginContext {
        PluginContext::new(
            "test",
            options,
            Arc::new(MemoryCache::new()),
            Arc::new(SignalBus::new()),
            Scheduler::new(),
        )
    }

    #[test]
    fn test_default_usage() {
        let plugin = Plugin::builder("quiet").build();
        assert_eq!(plugin.usage(), "No known usage for quiet");
        let plugin = Plugin::builder("loud").usage("!shout <text>").build();
        assert_eq!(plugin.usage(), "!shout <text>");
    }

    #[test]
    fn test_handlers_by_event() {
        let plugin = Plugin::builder("p")
            .on(EventKind::UserStatus, |_, _| Flow::Unchanged)
            .on(EventKind::MessageStatus, |_, args| Flow::Continue(args))
            .build();
        assert!(plugin.handles(EventKind::MessageStatus));
        assert!(!plugin.handles(EventKind::CallStatus));
        assert_eq!(
            plugin.events(),
            vec![EventKind::MessageStatus, EventKind::UserStatus]
        );

        let ctx = context(PluginOptions::new());
        let handler = plugin.handler(EventKind::MessageStatus).unwrap();
        assert_eq!(handler(&ctx, args![1_i64]), Flow::next(args![1_i64]));
    }

    #[test]
    fn test_context_outbox() {
        let ctx = context(PluginOptions::new());
        ctx.send_message("chat", "one");
        ctx.send_message("chat", "two");
        let sent: Vec<String> = ctx.flush_output().into_iter().map(|m| m.text).collect();
        assert_eq!(sent, vec!["one", "two"]);
        assert!(ctx.flush_output().is_empty());
    }

    #[test]
    fn test_context_options() {
        #[derive(Deserialize)]
        struct Roller {
            sides: u32,
        }

        let ctx = context(PluginOptions::new().with_option("sides", 20));
        assert_eq!(ctx.option::<u32>("sides").unwrap(), Some(20));
        assert_eq!(ctx.options_as::<Roller>().unwrap().sides, 20);
        assert!(matches!(
            ctx.option::<String>("sides"),
            Err(PluginError::InvalidOptions { ref name, .. }) if name == "test"
        ));
    }

    #[test]
    fn test_context_cache() {
        let ctx = context(PluginOptions::new());
        ctx.cache().set("seen", &json!(["a"]), None).unwrap();
        assert_eq!(
            ctx.cache().get::<Vec<String>>("seen").unwrap(),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_unload_hook() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let plugin = Plugin::builder("p")
            .on_unload(move |ctx| {
                assert_eq!(ctx.name(), "test");
                flag.store(true, Ordering::SeqCst);
            })
            .build();
        plugin.unload(&context(PluginOptions::new()));
        assert!(ran.load(Ordering::SeqCst));
    }
}
