//! Event routing through the plugin chain.
//!
//! For each event the router collects every binding, sorts by priority and
//! runs them as a **mutation-passing chain**:
//!
//! ```text
//! args ─► [prio 42] ─► args' ─► [prio 1] ─► args'' ─► [prio 0] ─► result
//!              │ Unchanged / wrong shape: previous args carry on
//! ```
//!
//! | Step | Rule |
//! |------|------|
//! | collect | plugin handlers (config order), then explicit handlers (registration order) |
//! | sort | priority descending, stable |
//! | filter | `MessageStatus` only: skip handlers whose whitelist excludes the message's chat |
//! | chain | accept `Flow::Continue(args)` only if its shape matches the input |
//!
//! Bindings are recomputed on every dispatch, so handlers registered mid-run
//! take effect on the next event.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use murmur_core::{Args, EventKind, Flow, UnknownEvent};
use parking_lot::RwLock;
use tracing::{Level, debug, error, span, trace};

use crate::manager::{LoadedPlugin, PluginManager};
use crate::plugin::HandlerFn;
use crate::whitelist::is_whitelisted;

/// A handler registered directly on the router.
pub type EventCallback = Arc<dyn Fn(Args) -> Flow + Send + Sync>;

// ─── Bindings ─────────────────────────────────────────────────────────────────

enum Binding {
    Plugin {
        plugin: Arc<LoadedPlugin>,
        handler: HandlerFn,
    },
    Explicit {
        index: usize,
        handler: EventCallback,
    },
}

impl Binding {
    fn priority(&self) -> i32 {
        match self {
            Binding::Plugin { plugin, .. } => plugin.priority(),
            Binding::Explicit { .. } => 0,
        }
    }

    fn label(&self, kind: EventKind) -> String {
        match self {
            Binding::Plugin { plugin, .. } => {
                format!("{}.{}", plugin.name(), kind.handler_name())
            }
            Binding::Explicit { index, .. } => format!("handler#{index}"),
        }
    }

    /// Whitelist check for chat messages.
    ///
    /// Arguments that carry no message have no chat to check, so they pass.
    fn allows(&self, args: &Args) -> bool {
        let Binding::Plugin { plugin, .. } = self else {
            return true;
        };
        match plugin.whitelist() {
            None => true,
            Some(list) => args
                .message()
                .is_none_or(|msg| is_whitelisted(&msg.chat, list)),
        }
    }

    fn call(&self, args: Args) -> Flow {
        match self {
            Binding::Plugin { plugin, handler } => handler(plugin.context(), args),
            Binding::Explicit { handler, .. } => handler(args),
        }
    }
}

// =============================================================================
// EventRouter
// =============================================================================

/// Dispatches host events to plugin handlers and explicitly registered
/// callbacks.
pub struct EventRouter {
    plugins: Arc<PluginManager>,
    handlers: RwLock<HashMap<EventKind, Vec<EventCallback>>>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("plugins", &self.plugins.names())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

impl EventRouter {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self {
            plugins,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    /// Adds a callback for `event` with priority 0 and no whitelist.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownEvent`] if `event` is not a host event name; nothing
    /// is registered.
    pub fn register_event_handler<F>(&self, event: &str, handler: F) -> Result<(), UnknownEvent>
    where
        F: Fn(Args) -> Flow + Send + Sync + 'static,
    {
        let kind = event.parse::<EventKind>().inspect_err(|e| {
            error!(event, error = %e, "Cannot register handler for unknown event");
        })?;
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
        debug!(event = %kind, "Registered event handler");
        Ok(())
    }

    /// Handler labels for `kind`, in the order they would run.
    ///
    /// Plugin handlers are labelled `plugin.on_event_name`, explicit ones
    /// `handler#n`.
    pub fn handlers(&self, kind: EventKind) -> Vec<(String, i32)> {
        self.bindings(kind)
            .iter()
            .map(|b| (b.label(kind), b.priority()))
            .collect()
    }

    fn bindings(&self, kind: EventKind) -> Vec<Binding> {
        let mut bindings: Vec<Binding> = self
            .plugins
            .plugins()
            .iter()
            .filter_map(|plugin| {
                plugin.plugin().handler(kind).map(|handler| Binding::Plugin {
                    plugin: Arc::clone(plugin),
                    handler: Arc::clone(handler),
                })
            })
            .collect();

        if let Some(explicit) = self.handlers.read().get(&kind) {
            bindings.extend(explicit.iter().enumerate().map(|(index, handler)| {
                Binding::Explicit {
                    index,
                    handler: Arc::clone(handler),
                }
            }));
        }

        bindings.sort_by_key(|b| Reverse(b.priority()));
        bindings
    }

    /// Dispatches the event named `event`.
    ///
    /// Returns the arguments left at the end of the chain, or `None` if the
    /// name is not a host event.
    pub fn dispatch(&self, event: &str, args: Args) -> Option<Args> {
        match event.parse::<EventKind>() {
            Ok(kind) => Some(self.dispatch_kind(kind, args)),
            Err(e) => {
                error!(event, error = %e, "Ignoring unknown event");
                None
            }
        }
    }

    /// Dispatches an already-parsed event.
    pub fn dispatch_kind(&self, kind: EventKind, args: Args) -> Args {
        let span = span!(Level::DEBUG, "dispatch", event = %kind);
        let _enter = span.enter();

        let mut current = args;
        for binding in self.bindings(kind) {
            if let Binding::Plugin { plugin, .. } = &binding
                && !plugin.activate()
            {
                continue;
            }
            if kind.is_chat_message() && !binding.allows(&current) {
                trace!(handler = %binding.label(kind), "Chat not whitelisted, skipping");
                continue;
            }

            trace!(handler = %binding.label(kind), priority = binding.priority(), "Calling handler");
            match binding.call(current.clone()) {
                Flow::Continue(next) if next.same_shape(&current) => current = next,
                Flow::Continue(next) => {
                    debug!(
                        handler = %binding.label(kind),
                        expected = ?current.shape(),
                        got = ?next.shape(),
                        "Handler returned arguments of a different shape, keeping previous"
                    );
                }
                Flow::Unchanged => {}
            }
        }
        current
    }

    /// A cloneable entry point that dispatches `event`.
    pub fn on_event(self: &Arc<Self>, event: impl Into<String>) -> EventHandler {
        EventHandler {
            router: Arc::clone(self),
            event: event.into(),
        }
    }
}

/// Host-facing callable bound to one event name.
///
/// ```rust,ignore
/// let on_message = router.on_event("MessageStatus");
/// host.subscribe(move |message, status| {
///     on_message.call(args![message, status]);
/// });
/// ```
#[derive(Clone)]
pub struct EventHandler {
    router: Arc<EventRouter>,
    event: String,
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

impl EventHandler {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Dispatches the bound event. The return value is informational.
    pub fn call(&self, args: Args) -> Option<Args> {
        self.router.dispatch(&self.event, args)
    }
}
