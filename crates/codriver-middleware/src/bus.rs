//! Categorised publish/subscribe event bus.
//!
//! Every [`EventCategory`] is a FIFO lane with one long-lived worker thread
//! started when the bus is built.  [`EventBus::emit`] pushes onto the lane's
//! unbounded channel and returns immediately; the worker delivers events to
//! handlers in emission order.  Lanes are independent: a slow handler on
//! `Audio` never delays `Telemetry`.
//!
//! | Category | Typical traffic |
//! |---|---|
//! | [`EventCategory::Telemetry`] | dialogue requests raised by reaction rules |
//! | [`EventCategory::Audio`] | user / co-driver speech boundaries |
//! | [`EventCategory::Transcription`] | finished transcriptions |
//! | [`EventCategory::Text`], [`EventCategory::Ui`] | front-end traffic |
//! | [`EventCategory::Generic`] | everything else (the default) |
//!
//! Besides routing, the bus owns two pieces of shared state: named state
//! flags ([`set_state`](EventBus::set_state) / [`is_blocked`](EventBus::is_blocked))
//! and the [`Floor`] consulted by every telemetry gate.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use codriver_middleware::bus::{EventBus, handler};
//! use codriver_types::{EventCategory, EventKind, EventPayload};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! bus.subscribe(
//!     EventKind::DialogueResponseRequest,
//!     handler(move |event| {
//!         sink.lock().unwrap().push(event.payload.clone());
//!         Ok(())
//!     }),
//! );
//! bus.emit(
//!     EventKind::DialogueResponseRequest,
//!     EventPayload::Message("hello".into()),
//!     EventCategory::Telemetry,
//! )
//! .unwrap();
//! bus.shutdown();
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use codriver_types::{CoDriverError, Event, EventCategory, EventKind, EventPayload};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::floor::Floor;
use crate::subscription::panic_message;

/// Source recorded on events emitted without an explicit one.
const DEFAULT_SOURCE: &str = "codriver-middleware::bus";

/// A bus handler.  Identity for [`EventBus::unsubscribe`] is the `Arc`
/// allocation.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), CoDriverError> + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Event) -> Result<(), CoDriverError> + Send + Sync + 'static,
{
    Arc::new(f)
}

type HandlerTable = RwLock<HashMap<EventKind, Vec<EventHandler>>>;

struct Inner {
    handlers: Arc<HandlerTable>,
    senders: RwLock<Option<HashMap<EventCategory, Sender<Event>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    states: RwLock<HashMap<EventKind, bool>>,
    block_on_states: Vec<EventKind>,
    floor: Arc<Floor>,
}

/// Shared event bus.  Clones are cheap and share the same lanes.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("floor_held", &self.inner.floor.is_held())
            .field("shut_down", &self.inner.senders.read().is_none())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Build the bus and start one worker per category.
    pub fn new() -> Self {
        let handlers: Arc<HandlerTable> = Arc::default();
        let mut senders = HashMap::new();
        let mut workers = Vec::new();

        for category in EventCategory::ALL {
            let (tx, rx) = unbounded();
            let table = Arc::clone(&handlers);
            let spawned = thread::Builder::new()
                .name(format!("bus-{category:?}").to_lowercase())
                .spawn(move || drain(category, rx, table));
            match spawned {
                Ok(worker) => {
                    senders.insert(category, tx);
                    workers.push(worker);
                }
                Err(e) => error!(?category, error = %e, "failed to start bus worker"),
            }
        }

        Self {
            inner: Arc::new(Inner {
                handlers,
                senders: RwLock::new(Some(senders)),
                workers: Mutex::new(workers),
                states: RwLock::new(HashMap::new()),
                block_on_states: vec![EventKind::UserSpeechStart],
                floor: Arc::new(Floor::new()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Append `handler` to `kind`.  Subscribing the same handler twice
    /// delivers each event to it twice.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) {
        self.inner
            .handlers
            .write()
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Remove every occurrence of `handler` from `kind`.
    pub fn unsubscribe(&self, kind: EventKind, handler: &EventHandler) {
        let mut table = self.inner.handlers.write();
        if let Some(bound) = table.get_mut(&kind) {
            bound.retain(|h| !std::ptr::addr_eq(Arc::as_ptr(h), Arc::as_ptr(handler)));
            if bound.is_empty() {
                table.remove(&kind);
            }
        }
    }

    /// Number of handlers bound to `kind`, duplicates included.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// Queue an event of `kind` on `category`.
    ///
    /// # Errors
    ///
    /// [`CoDriverError::BusShutdown`] after [`shutdown`](Self::shutdown).
    pub fn emit(
        &self,
        kind: EventKind,
        payload: EventPayload,
        category: EventCategory,
    ) -> Result<(), CoDriverError> {
        self.publish(Event::new(DEFAULT_SOURCE, kind, payload), category)
    }

    /// Queue a pre-built event on `category`.
    pub fn publish(&self, event: Event, category: EventCategory) -> Result<(), CoDriverError> {
        let senders = self.inner.senders.read();
        let sender = senders
            .as_ref()
            .and_then(|lanes| lanes.get(&category))
            .ok_or(CoDriverError::BusShutdown)?;
        debug!(kind = ?event.kind, ?category, source = %event.source, "event queued");
        sender.send(event).map_err(|_| CoDriverError::BusShutdown)
    }

    // -----------------------------------------------------------------------
    // State flags
    // -----------------------------------------------------------------------

    /// Record whether the situation named by `kind` is currently active.
    pub fn set_state(&self, kind: EventKind, active: bool) {
        self.inner.states.write().insert(kind, active);
    }

    pub fn state(&self, kind: EventKind) -> bool {
        self.inner.states.read().get(&kind).copied().unwrap_or(false)
    }

    /// `true` while any blocking state (the user speaking) is active.
    pub fn is_blocked(&self) -> bool {
        let states = self.inner.states.read();
        self.inner
            .block_on_states
            .iter()
            .any(|kind| states.get(kind).copied().unwrap_or(false))
    }

    // -----------------------------------------------------------------------
    // Floor
    // -----------------------------------------------------------------------

    /// The floor shared with every telemetry gate.
    pub fn floor(&self) -> Arc<Floor> {
        Arc::clone(&self.inner.floor)
    }

    pub fn block_telemetry_handlers(&self) {
        self.inner.floor.block();
    }

    pub fn unblock_telemetry_handlers(&self) {
        self.inner.floor.release();
    }

    pub fn telemetry_handlers_blocked(&self) -> bool {
        self.inner.floor.is_held()
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Stop accepting events, let every lane drain, and join the workers.
    ///
    /// Blocks until in-flight handlers return.  Calling it again is a no-op.
    /// When called from inside a handler, that handler's own worker is left
    /// to exit on its own.
    pub fn shutdown(&self) {
        // Dropping the senders ends each worker's receive loop once its
        // queue is empty.
        drop(self.inner.senders.write().take());

        let workers = std::mem::take(&mut *self.inner.workers.lock());
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            let name = worker.thread().name().unwrap_or("bus-worker").to_string();
            if worker.join().is_err() {
                warn!(worker = %name, "bus worker terminated abnormally");
            }
        }
        debug!("event bus shut down");
    }
}

fn drain(category: EventCategory, rx: Receiver<Event>, handlers: Arc<HandlerTable>) {
    for event in rx.iter() {
        // Snapshot the list so handlers may (un)subscribe while running.
        let bound: Vec<EventHandler> = handlers
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for handler in bound {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            let details = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            let err = CoDriverError::HandlerFailure {
                handler: format!("{:?}", event.kind),
                details,
            };
            error!(?category, error = %err, "event handler failed");
        }
    }
    debug!(?category, "bus worker drained");
}
