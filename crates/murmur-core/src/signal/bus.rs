use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use super::payload::{Payload, Receiver, ReceiverResult};
use crate::error::{SignalError, SignalResult};

/// Handle to one connection on a [`SignalBus`].
///
/// Handles are generation-checked: once a connection is removed its slot may
/// be reused, and the old handle no longer matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    index: u32,
    generation: u32,
}

/// How the bus holds on to a receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reference {
    /// The connection lives only as long as the receiver's other owners.
    #[default]
    Weak,
    /// The bus keeps the receiver alive until it is disconnected.
    Strong,
}

/// Wraps a closure as a shareable receiver.
pub fn receiver<F>(f: F) -> Arc<dyn Receiver>
where
    F: Fn(&Payload) -> ReceiverResult + Send + Sync + 'static,
{
    Arc::new(f)
}

fn receiver_id(receiver: &Arc<dyn Receiver>) -> usize {
    Arc::as_ptr(receiver).cast::<()>() as usize
}

// ─── Connection table ────────────────────────────────────────────────────────

enum Held {
    Strong(Arc<dyn Receiver>),
    Weak(Weak<dyn Receiver>),
}

impl Held {
    fn upgrade(&self) -> Option<Arc<dyn Receiver>> {
        match self {
            Held::Strong(r) => Some(Arc::clone(r)),
            Held::Weak(w) => w.upgrade(),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Held::Strong(_) => true,
            Held::Weak(w) => w.strong_count() > 0,
        }
    }
}

struct Connection {
    signal: String,
    receiver_id: usize,
    held: Held,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    connection: Option<Connection>,
}

/// Arena of connection slots plus a per-signal index in connection order.
#[derive(Default)]
struct Table {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_signal: HashMap<String, Vec<u32>>,
}

impl Table {
    fn id_at(&self, index: u32) -> ConnectionId {
        ConnectionId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn find(&self, signal: &str, receiver_id: usize) -> Option<ConnectionId> {
        self.by_signal.get(signal)?.iter().copied().find_map(|index| {
            self.slots[index as usize]
                .connection
                .as_ref()
                .filter(|c| c.receiver_id == receiver_id)
                .map(|_| self.id_at(index))
        })
    }

    fn insert(&mut self, connection: Connection) -> ConnectionId {
        let signal = connection.signal.clone();
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].connection = Some(connection);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    connection: Some(connection),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.by_signal.entry(signal).or_default().push(index);
        self.id_at(index)
    }

    /// Empties the slot if `id` is current. The caller drops the returned
    /// connection after releasing the lock.
    fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let connection = slot.connection.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if let Some(indices) = self.by_signal.get_mut(&connection.signal) {
            indices.retain(|&i| i != id.index);
            if indices.is_empty() {
                self.by_signal.remove(&connection.signal);
            }
        }
        Some(connection)
    }

    /// Live receivers for `signal` in connection order. Dead weak slots are freed.
    fn resolve(&mut self, signal: &str) -> Vec<Arc<dyn Receiver>> {
        let Some(indices) = self.by_signal.get(signal) else {
            return Vec::new();
        };

        let mut live = Vec::with_capacity(indices.len());
        let mut dead = Vec::new();
        for &index in indices {
            if let Some(connection) = &self.slots[index as usize].connection {
                match connection.held.upgrade() {
                    Some(receiver) => live.push(receiver),
                    None => dead.push(self.id_at(index)),
                }
            }
        }

        if !dead.is_empty() {
            debug!(
                signal,
                count = dead.len(),
                "Dropping connections to released receivers"
            );
            for id in dead {
                self.remove(id);
            }
        }
        live
    }
}

// =============================================================================
// SignalBus
// =============================================================================

/// Named publish/subscribe channels between plugins.
///
/// One bus is created at startup and shared by `Arc`. A single lock guards
/// the connection table for every signal; [`send`](Self::send) holds it only
/// while resolving receivers, so receivers may connect or disconnect during a
/// send.
///
/// ```rust
/// use std::sync::Arc;
/// use murmur_core::signal::{Payload, Reference, SignalBus, receiver};
/// use serde_json::json;
///
/// let bus = SignalBus::new();
/// let echo = receiver(|p: &Payload| Ok(json!(p.args.len())));
/// bus.connect(&echo, "count_args", Reference::Weak);
///
/// let results = bus.send("count_args", &Payload::new().arg(1).arg(2))?;
/// assert_eq!(results, vec![json!(2)]);
///
/// drop(echo);
/// assert!(bus.send("count_args", &Payload::new())?.is_empty());
/// # Ok::<(), murmur_core::SignalError>(())
/// ```
#[derive(Default)]
pub struct SignalBus {
    table: Mutex<Table>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `receiver` to `signal`.
    ///
    /// Connecting a receiver that is already connected to `signal` returns
    /// the existing handle and keeps the original reference mode.
    pub fn connect(
        &self,
        receiver: &Arc<dyn Receiver>,
        signal: &str,
        reference: Reference,
    ) -> ConnectionId {
        let receiver_id = receiver_id(receiver);
        let mut table = self.table.lock();
        if let Some(id) = table.find(signal, receiver_id) {
            trace!(signal, "Receiver already connected");
            return id;
        }

        let held = match reference {
            Reference::Strong => Held::Strong(Arc::clone(receiver)),
            Reference::Weak => Held::Weak(Arc::downgrade(receiver)),
        };
        let id = table.insert(Connection {
            signal: signal.to_string(),
            receiver_id,
            held,
        });
        debug!(signal, ?reference, "Receiver connected");
        id
    }

    /// Disconnects `receiver` from `signal`. Returns whether it was connected.
    pub fn disconnect(&self, receiver: &Arc<dyn Receiver>, signal: &str) -> bool {
        let removed = {
            let mut table = self.table.lock();
            table
                .find(signal, receiver_id(receiver))
                .and_then(|id| table.remove(id))
        };
        let found = removed.is_some();
        drop(removed);
        if found {
            debug!(signal, "Receiver disconnected");
        }
        found
    }

    /// Disconnects by handle. A stale handle is a no-op.
    pub fn disconnect_id(&self, id: ConnectionId) -> bool {
        let removed = self.table.lock().remove(id);
        let found = removed.is_some();
        drop(removed);
        found
    }

    /// Returns `true` if `id` still names a connection.
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        let table = self.table.lock();
        table
            .slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.connection.is_some())
    }

    /// Calls every live receiver of `signal` in connection order.
    ///
    /// Returns one value per receiver. The first receiver error aborts the
    /// send and is returned; later receivers are not called.
    pub fn send(&self, signal: &str, payload: &Payload) -> SignalResult<Vec<Value>> {
        let receivers = self.table.lock().resolve(signal);
        trace!(signal, receivers = receivers.len(), "Sending signal");

        receivers
            .iter()
            .map(|receiver| {
                receiver
                    .receive(payload)
                    .map_err(|source| SignalError::Receiver {
                        signal: signal.to_string(),
                        source,
                    })
            })
            .collect()
    }

    /// Number of live receivers connected to `signal`.
    pub fn receivers(&self, signal: &str) -> usize {
        let table = self.table.lock();
        table.by_signal.get(signal).map_or(0, |indices| {
            indices
                .iter()
                .filter(|&&index| {
                    table.slots[index as usize]
                        .connection
                        .as_ref()
                        .is_some_and(|c| c.held.is_alive())
                })
                .count()
        })
    }

    pub fn has_receivers(&self, signal: &str) -> bool {
        self.receivers(signal) > 0
    }

    /// Signals with at least one connection slot, sorted.
    pub fn signals(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.lock().by_signal.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn constant(value: i64) -> Arc<dyn Receiver> {
        receiver(move |_| Ok(json!(value)))
    }

    #[test]
    fn test_fan_out_in_connection_order() {
        let bus = SignalBus::new();
        let receivers: Vec<_> = (0..3).map(constant).collect();
        for r in &receivers {
            bus.connect(r, "sig", Reference::Weak);
        }

        let payload = Payload::new().arg(1).kwarg("x", "y");
        let results = bus.send("sig", &payload).unwrap();
        assert_eq!(results, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_receivers_see_payload() {
        let bus = SignalBus::new();
        let r = receiver(|p: &Payload| {
            Ok(json!({ "first": p.args.first(), "x": p.get_str("x") }))
        });
        bus.connect(&r, "sig", Reference::Strong);

        let results = bus.send("sig", &Payload::new().arg(1).kwarg("x", "y")).unwrap();
        assert_eq!(results, vec![json!({ "first": 1, "x": "y" })]);
    }

    #[test]
    fn test_connect_is_idempotent() {
        let bus = SignalBus::new();
        let r = constant(1);
        let a = bus.connect(&r, "sig", Reference::Weak);
        let b = bus.connect(&r, "sig", Reference::Strong);
        assert_eq!(a, b);
        assert_eq!(bus.send("sig", &Payload::new()).unwrap().len(), 1);

        // same receiver on another signal is a separate connection
        let c = bus.connect(&r, "other", Reference::Weak);
        assert_ne!(a, c);
    }

    #[test]
    fn test_disconnect() {
        let bus = SignalBus::new();
        let r1 = constant(1);
        let r2 = constant(2);
        bus.connect(&r1, "sig", Reference::Weak);
        let id2 = bus.connect(&r2, "sig", Reference::Weak);

        assert!(bus.disconnect(&r1, "sig"));
        assert!(!bus.disconnect(&r1, "sig"));
        assert_eq!(bus.send("sig", &Payload::new()).unwrap(), vec![json!(2)]);

        assert!(bus.disconnect_id(id2));
        assert!(!bus.is_connected(id2));
        assert!(bus.send("sig", &Payload::new()).unwrap().is_empty());
        assert!(bus.signals().is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_touch_reused_slot() {
        let bus = SignalBus::new();
        let r1 = constant(1);
        let r2 = constant(2);
        let old = bus.connect(&r1, "sig", Reference::Weak);
        assert!(bus.disconnect_id(old));

        let new = bus.connect(&r2, "sig", Reference::Weak);
        assert_ne!(old, new);
        assert!(!bus.disconnect_id(old));
        assert!(bus.is_connected(new));
        assert_eq!(bus.send("sig", &Payload::new()).unwrap(), vec![json!(2)]);
    }

    #[test]
    fn test_weak_receiver_dropped() {
        let bus = SignalBus::new();
        let kept = constant(1);
        let dropped = constant(2);
        bus.connect(&kept, "sig", Reference::Weak);
        bus.connect(&dropped, "sig", Reference::Weak);
        assert_eq!(bus.receivers("sig"), 2);

        drop(dropped);
        assert_eq!(bus.receivers("sig"), 1);
        assert_eq!(bus.send("sig", &Payload::new()).unwrap(), vec![json!(1)]);
        assert_eq!(bus.send("sig", &Payload::new()).unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_strong_receiver_kept_alive() {
        let bus = SignalBus::new();
        let r = constant(7);
        bus.connect(&r, "sig", Reference::Strong);
        drop(r);
        assert_eq!(bus.send("sig", &Payload::new()).unwrap(), vec![json!(7)]);
    }

    #[test]
    fn test_receiver_error_propagates() {
        let bus = SignalBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = receiver(|_| Err("boom".into()));
        let counter = Arc::clone(&calls);
        let after = receiver(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        bus.connect(&failing, "sig", Reference::Weak);
        bus.connect(&after, "sig", Reference::Weak);

        let err = bus.send("sig", &Payload::new()).unwrap_err();
        assert!(matches!(err, SignalError::Receiver { ref signal, .. } if signal == "sig"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_receiver_may_disconnect_itself() {
        let bus = Arc::new(SignalBus::new());
        let own_id: Arc<Mutex<Option<ConnectionId>>> = Arc::new(Mutex::new(None));

        let bus_ref = Arc::clone(&bus);
        let id_ref = Arc::clone(&own_id);
        let once = receiver(move |_| {
            if let Some(id) = id_ref.lock().take() {
                bus_ref.disconnect_id(id);
            }
            Ok(json!("once"))
        });

        let id = bus.connect(&once, "sig", Reference::Weak);
        *own_id.lock() = Some(id);

        assert_eq!(bus.send("sig", &Payload::new()).unwrap(), vec![json!("once")]);
        assert!(bus.send("sig", &Payload::new()).unwrap().is_empty());
    }

    #[test]
    fn test_send_unknown_signal() {
        let bus = SignalBus::new();
        assert!(bus.send("nobody", &Payload::new()).unwrap().is_empty());
        assert!(!bus.has_receivers("nobody"));
    }
}
