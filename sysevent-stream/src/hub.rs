//! Shared state behind a manager and all of its streams
//!
//! The source handle and the consumer registry live under one mutex so that
//! construction, teardown, registration, deregistration and broadcast never
//! interleave. The condvar wakes callers waiting for the handle to leave a
//! transitional phase (see [`crate::handle`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use sysevent_source::{Event, EventCallback, NvList, SourceFactory};

use crate::config::StreamConfig;
use crate::handle::SourceHandle;
use crate::manager::ManagerStats;
use crate::registry::ConsumerRegistry;

pub(crate) struct HubState {
    pub(crate) handle: SourceHandle,
    pub(crate) registry: ConsumerRegistry,
}

#[derive(Default)]
pub(crate) struct HubCounters {
    pub(crate) constructions: AtomicU64,
    pub(crate) teardowns: AtomicU64,
    pub(crate) events_broadcast: AtomicU64,
}

pub(crate) struct Hub {
    pub(crate) state: Mutex<HubState>,
    pub(crate) settled: Condvar,
    pub(crate) factory: Arc<dyn SourceFactory>,
    pub(crate) config: StreamConfig,
    pub(crate) counters: HubCounters,
}

impl Hub {
    pub(crate) fn new(factory: Arc<dyn SourceFactory>, config: StreamConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState {
                handle: SourceHandle::new(),
                registry: ConsumerRegistry::default(),
            }),
            settled: Condvar::new(),
            factory,
            config,
            counters: HubCounters::default(),
        })
    }

    /// Build the callback handed to a source of the given generation
    ///
    /// Holds the hub weakly: the hub owns the source, which owns the callback.
    pub(crate) fn event_callback(self: &Arc<Self>, generation: u64) -> EventCallback {
        let hub: Weak<Hub> = Arc::downgrade(self);
        Arc::new(move |nvl0: NvList, nvl1: NvList| {
            if let Some(hub) = hub.upgrade() {
                hub.broadcast(generation, Event::new(nvl0, nvl1));
            }
        })
    }

    pub(crate) fn stats(&self) -> ManagerStats {
        let state = self.state.lock();
        ManagerStats {
            active_consumers: state.registry.len(),
            source_live: state.handle.is_live(),
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            teardowns: self.counters.teardowns.load(Ordering::Relaxed),
            events_broadcast: self.counters.events_broadcast.load(Ordering::Relaxed),
        }
    }
}

// Every stream holds the hub, so the last reference goes only after the
// last dispose has torn the source down.
impl Drop for Hub {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        debug_assert!(
            !state.handle.is_live() && !state.handle.is_settling(),
            "hub dropped with a source still attached"
        );
        debug_assert!(state.registry.is_empty());
    }
}
