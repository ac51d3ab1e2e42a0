//! In-process event source backed by a delivery worker thread
//!
//! [`ChannelSourceFactory`] stands in for the kernel channel wherever events
//! originate inside the process: tests, replay tools, or a platform without
//! sysevent. Events are injected through an [`EventInjector`] and delivered to
//! the live source's callback on a dedicated worker thread, the same way the
//! native channel delivers from its own thread pool.
//!
//! Like the kernel channel it models, only one source can be bound to a
//! factory at a time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{Result, SourceError};
use crate::event::EventHeader;
use crate::payload::NvList;
use crate::source::{EventCallback, Source, SourceFactory};

/// Commands sent from injectors and the source handle to the delivery worker
#[derive(Debug)]
enum Command {
    /// Deliver one event to the callback
    Deliver { nvl0: NvList, nvl1: NvList },
    /// Stop the worker
    Shutdown,
}

struct Binding {
    instance: u64,
    tx: Sender<Command>,
}

struct FactoryState {
    /// The currently bound source, if any
    bound: Mutex<Option<Binding>>,
    available: AtomicBool,
    next_instance: AtomicU64,
    constructed: AtomicU64,
    destroyed: AtomicU64,
}

/// Factory for [`ChannelSource`] instances
#[derive(Clone)]
pub struct ChannelSourceFactory {
    state: Arc<FactoryState>,
}

impl ChannelSourceFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FactoryState {
                bound: Mutex::new(None),
                available: AtomicBool::new(true),
                next_instance: AtomicU64::new(1),
                constructed: AtomicU64::new(0),
                destroyed: AtomicU64::new(0),
            }),
        }
    }

    /// Get a handle for injecting events into the live source
    pub fn injector(&self) -> EventInjector {
        EventInjector {
            state: Arc::clone(&self.state),
        }
    }

    /// Make later constructions fail as if the channel refused access
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Number of sources constructed so far
    pub fn constructed_count(&self) -> u64 {
        self.state.constructed.load(Ordering::SeqCst)
    }

    /// Number of sources destroyed so far
    pub fn destroyed_count(&self) -> u64 {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    /// Whether a source is currently bound
    pub fn is_bound(&self) -> bool {
        self.state.bound.lock().is_some()
    }
}

impl Default for ChannelSourceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFactory for ChannelSourceFactory {
    fn construct(&self, on_event: EventCallback) -> Result<Box<dyn Source>> {
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(SourceError::PermissionDenied(
                "channel source marked unavailable".to_string(),
            ));
        }

        let mut bound = self.state.bound.lock();

        if let Some(existing) = bound.as_ref() {
            return Err(SourceError::ResourceExhausted(format!(
                "channel already bound to instance {}",
                existing.instance
            )));
        }

        let instance = self.state.next_instance.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = channel::unbounded();
        let worker = spawn_delivery_worker(instance, rx, on_event)?;
        let worker_thread = worker.thread().id();

        *bound = Some(Binding {
            instance,
            tx: tx.clone(),
        });
        self.state.constructed.fetch_add(1, Ordering::SeqCst);

        tracing::debug!("Channel source instance {} bound", instance);

        Ok(Box::new(ChannelSource {
            instance,
            tx,
            worker: Some(worker),
            worker_thread,
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Spawns the delivery worker for one source instance
///
/// The worker drains commands in order, so every event injected before
/// shutdown is delivered before the worker exits.
fn spawn_delivery_worker(
    instance: u64,
    rx: Receiver<Command>,
    on_event: EventCallback,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("sysevent-delivery-{}", instance))
        .spawn(move || {
            while let Ok(cmd) = rx.recv() {
                match cmd {
                    Command::Deliver { nvl0, nvl1 } => on_event(nvl0, nvl1),
                    Command::Shutdown => {
                        tracing::debug!("Delivery worker {} received shutdown command", instance);
                        break;
                    }
                }
            }
        })
        .map_err(|e| SourceError::Worker(format!("failed to spawn delivery worker: {}", e)))
}

/// A live in-process source
pub struct ChannelSource {
    instance: u64,
    tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    worker_thread: ThreadId,
    state: Arc<FactoryState>,
}

impl ChannelSource {
    /// Unbind from the factory so injectors stop reaching this instance
    fn detach(&self) {
        let mut bound = self.state.bound.lock();
        if bound.as_ref().map(|b| b.instance) == Some(self.instance) {
            *bound = None;
        }
    }

    fn stop_worker(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let _ = self.tx.send(Command::Shutdown);

        // Destroy may be reached from a callback running on the worker itself
        if thread::current().id() == self.worker_thread {
            return Ok(());
        }

        worker
            .join()
            .map_err(|_| SourceError::Worker(format!("delivery worker {} panicked", self.instance)))
    }
}

impl Source for ChannelSource {
    fn destroy(mut self: Box<Self>) -> Result<()> {
        self.detach();
        let result = self.stop_worker();
        self.state.destroyed.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Channel source instance {} destroyed", self.instance);
        result
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        if self.worker.is_some() {
            tracing::warn!(
                "Channel source instance {} dropped without destroy",
                self.instance
            );
            self.detach();
            let _ = self.tx.send(Command::Shutdown);
        }
    }
}

/// Handle for feeding events into whichever source is currently bound
#[derive(Clone)]
pub struct EventInjector {
    state: Arc<FactoryState>,
}

impl EventInjector {
    /// Queue an event for delivery
    ///
    /// Returns `false` when no source is bound; the event is dropped, as the
    /// kernel channel drops events nobody subscribed to.
    pub fn publish(&self, nvl0: NvList, nvl1: NvList) -> bool {
        let bound = self.state.bound.lock();
        match bound.as_ref() {
            Some(binding) => binding
                .tx
                .send(Command::Deliver { nvl0, nvl1 })
                .is_ok(),
            None => {
                tracing::trace!("No channel source bound, dropping event");
                false
            }
        }
    }

    /// Queue an event built from a typed header
    pub fn publish_event(&self, header: &EventHeader, attributes: NvList) -> bool {
        self.publish(header.to_nvlist(), attributes)
    }
}
