//! Runtime orchestration.
//!
//! [`BotRuntime`] owns the shared services and the loaded plugins, and
//! moves plugin output to a [`Host`].
//!
//! ```text
//! host event source ──► runtime.router().dispatch(..) ──► plugin handlers
//!                                                              │ send_message
//! Host::send_message ◄── flush (every flush_interval_ms) ◄── outboxes
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use murmur_runtime::{BotRuntime, ConfigLoader};
//! use murmur_framework::plugin::PluginRegistry;
//!
//! let runtime = BotRuntime::from_loader(ConfigLoader::new(), &PluginRegistry::with_linked())?;
//! let router = runtime.router();
//! // feed router.dispatch("MessageStatus", args) from the chat client ...
//! runtime.run(host).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use murmur_core::signal::REQUEST_CHATS;
use murmur_core::{CacheManager, Payload, Receiver, Reference, SignalBus};
use murmur_framework::plugin::PluginRegistry;
use murmur_framework::{EventRouter, PluginManager, PluginServices, Scheduler};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::signal;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, MurmurConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::Host;
use crate::logging;

/// The running bot: shared services, loaded plugins and the event router.
///
/// Lifecycle:
///
/// ```text
/// from_config()  ──► caches configured, plugins loaded
/// attach(host)   ──► request_chats_list answered from the host's chats
/// run_until(..)  ──► flush / prune loop
/// shutdown()     ──► tasks joined, plugins unloaded, final flush, caches pruned
/// ```
pub struct BotRuntime {
    config: MurmurConfig,
    services: PluginServices,
    router: Arc<EventRouter>,
    host: RwLock<Option<Arc<dyn Host>>>,
    chats: Arc<RwLock<Vec<String>>>,
    chats_receiver: Mutex<Option<Arc<dyn Receiver>>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for BotRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRuntime")
            .field("plugins", &self.plugins().names())
            .field("attached", &self.host.read().is_some())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl BotRuntime {
    /// Builds the runtime from a validated configuration.
    ///
    /// Creates the cache manager (configured caches plus defaults), the
    /// signal bus and the scheduler, then loads every configured plugin from
    /// `registry`. Logging is not touched.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Config`] if the configuration is invalid.
    /// - [`RuntimeError::Cache`] if a configured cache cannot be opened.
    /// - [`RuntimeError::Plugin`] if a plugin fails to resolve or load.
    pub fn from_config(config: MurmurConfig, registry: &PluginRegistry) -> RuntimeResult<Self> {
        validate_config(&config)?;

        let caches = CacheManager::with_defaults(config.default_cache.clone());
        caches.configure(&config.caches)?;

        let services = PluginServices {
            caches: Arc::new(caches),
            signals: Arc::new(SignalBus::new()),
            scheduler: Scheduler::new(),
        };

        let plugins = PluginManager::load(&config.plugins, registry, services.clone())
            .inspect_err(|_| services.scheduler.cancel())?;

        info!(
            plugins = plugins.len(),
            caches = config.caches.len(),
            flush_interval_ms = config.runtime.flush_interval_ms,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            services,
            router: Arc::new(EventRouter::new(Arc::new(plugins))),
            host: RwLock::new(None),
            chats: Arc::new(RwLock::new(Vec::new())),
            chats_receiver: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Loads and validates configuration with `loader`, initializes logging
    /// from it, then builds the runtime.
    pub fn from_loader(loader: ConfigLoader, registry: &PluginRegistry) -> RuntimeResult<Self> {
        let config = loader.load_validated()?;
        logging::init_from_config(&config.logging);
        Self::from_config(config, registry)
    }

    pub fn config(&self) -> &MurmurConfig {
        &self.config
    }

    /// Dispatch entry point for the host's event source.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        self.router.plugins()
    }

    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.services.caches
    }

    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.services.signals
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.services.scheduler
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.host.read().is_some()
    }

    // ─── Host ─────────────────────────────────────────────────────────────────

    /// Makes `host` the delivery target and starts answering
    /// `request_chats_list` from its conversations.
    ///
    /// Attaching again replaces the host and refreshes the chat list.
    pub async fn attach(&self, host: Arc<dyn Host>) {
        self.refresh_chats(host.as_ref()).await;
        *self.host.write() = Some(host);

        let mut slot = self.chats_receiver.lock();
        if slot.is_none() {
            let chats = Arc::clone(&self.chats);
            let receiver = murmur_core::signal::receiver(move |_: &Payload| {
                Ok(Value::from(chats.read().clone()))
            });
            self.services
                .signals
                .connect(&receiver, REQUEST_CHATS, Reference::Strong);
            *slot = Some(receiver);
        }
        info!(chats = self.chats.read().len(), "Host attached");
    }

    /// Replaces the chat snapshot with what `host` reports now.
    pub async fn refresh_chats<H: Host + ?Sized>(&self, host: &H) {
        let chats = host.chats().await;
        let mut current = self.chats.write();
        if *current != chats {
            debug!(count = chats.len(), "Chat list refreshed");
            *current = chats;
        }
    }

    /// Sends every queued plugin message through `host`.
    ///
    /// Messages go out by plugin priority, highest first, each plugin's in
    /// the order queued. A failed delivery is logged and dropped.
    ///
    /// Returns the number of messages delivered.
    pub async fn flush<H: Host + ?Sized>(&self, host: &H) -> usize {
        let pending = self.plugins().drain_outboxes();
        if pending.is_empty() {
            return 0;
        }

        let mut sent = 0;
        for message in &pending {
            match host.send_message(message).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(chat = %message.chat, error = %e, "Failed to deliver message"),
            }
        }
        debug!(sent, failed = pending.len() - sent, "Outboxes flushed");
        sent
    }

    fn attached_host(&self) -> Option<Arc<dyn Host>> {
        self.host.read().clone()
    }

    // ─── Main loop ────────────────────────────────────────────────────────────

    /// Attaches `host` and flushes outboxes until `shutdown` resolves or the
    /// host detaches, then shuts down.
    ///
    /// Every flush tick also refreshes the chat list answered to
    /// `request_chats_list`. Expired cache entries are pruned every
    /// `prune_interval_secs`.
    pub async fn run_until<F>(&self, host: Arc<dyn Host>, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.attach(Arc::clone(&host)).await;

        let settings = self.config.runtime;
        let mut flush = time::interval(settings.flush_interval());
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prune = settings.prune_interval().map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!(plugins = self.plugins().len(), "Runtime running");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = flush.tick() => {
                    self.refresh_chats(host.as_ref()).await;
                    self.flush(host.as_ref()).await;
                    if !host.is_attached() {
                        info!("Host detached, stopping");
                        break;
                    }
                }
                () = tick(prune.as_mut()), if prune.is_some() => {
                    let removed = self.services.caches.prune_all();
                    debug!(removed, "Pruned expired cache entries");
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// [`run_until`](Self::run_until) Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Signal`] if the signal listeners cannot be installed.
    pub async fn run(&self, host: Arc<dyn Host>) -> RuntimeResult<()> {
        let shutdown = shutdown_signal()?;
        self.run_until(host, shutdown).await
    }

    /// Stops everything, once.
    ///
    /// 1. Periodic tasks are cancelled and joined.
    /// 2. Plugin unload hooks run, last configured first.
    /// 3. Remaining output is flushed when a host is attached.
    /// 4. Expired cache entries are pruned.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.services.scheduler.shutdown().await;
        self.plugins().unload_all();

        if let Some(host) = self.attached_host() {
            self.flush(host.as_ref()).await;
        }
        if let Some(receiver) = self.chats_receiver.lock().take() {
            self.services.signals.disconnect(&receiver, REQUEST_CHATS);
        }

        let removed = self.services.caches.prune_all();
        info!(removed, "Runtime shut down");
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
fn shutdown_signal() -> RuntimeResult<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(RuntimeError::Signal)?;

    Ok(async move {
        #[cfg(unix)]
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => error!(error = %e, "Ctrl+C listener failed, shutting down"),
            },
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        };

        #[cfg(not(unix))]
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "Ctrl+C listener failed, shutting down"),
        };
    })
}

// =============================================================================
// Tests
// =============================================================================
