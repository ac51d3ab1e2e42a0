//! Source handle lifecycle
//!
//! A hub owns zero or one live source. The handle moves through
//!
//! ```text
//!   Idle ──► Constructing ──► Live ──► Destroying ──► Idle
//!                 │
//!                 └── construction failed ──► Idle
//! ```
//!
//! The hub lock is released while the factory runs and while `destroy` runs,
//! so a source whose construction or teardown waits on its own delivery
//! thread cannot deadlock against a broadcast that thread has in flight.
//! Anyone else who needs the handle while it is `Constructing` or
//! `Destroying` waits on the hub's condvar, so two sources never exist at
//! once.
//!
//! Each constructed source gets a new generation number. Its callback
//! carries that number, and events from a generation that is no longer
//! current are discarded.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::MutexGuard;
use sysevent_source::{Source, SourceError};

use crate::hub::{Hub, HubState};

pub(crate) enum SourcePhase {
    Idle,
    Constructing { generation: u64 },
    Live { generation: u64, source: Box<dyn Source> },
    Destroying { generation: u64 },
}

pub(crate) struct SourceHandle {
    phase: SourcePhase,
    last_generation: u64,
}

impl SourceHandle {
    pub(crate) fn new() -> Self {
        Self {
            phase: SourcePhase::Idle,
            last_generation: 0,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        matches!(self.phase, SourcePhase::Live { .. })
    }

    /// Whether the handle is between stable phases
    pub(crate) fn is_settling(&self) -> bool {
        matches!(
            self.phase,
            SourcePhase::Constructing { .. } | SourcePhase::Destroying { .. }
        )
    }

    /// Whether events from a source of `generation` may reach consumers
    pub(crate) fn accepts(&self, generation: u64) -> bool {
        match self.phase {
            SourcePhase::Constructing { generation: current }
            | SourcePhase::Live {
                generation: current,
                ..
            } => current == generation,
            SourcePhase::Idle | SourcePhase::Destroying { .. } => false,
        }
    }

    fn begin_construct(&mut self) -> u64 {
        debug_assert!(matches!(self.phase, SourcePhase::Idle));
        self.last_generation += 1;
        let generation = self.last_generation;
        self.phase = SourcePhase::Constructing { generation };
        generation
    }

    fn finish_construct(&mut self, generation: u64, source: Option<Box<dyn Source>>) {
        debug_assert!(matches!(
            self.phase,
            SourcePhase::Constructing { generation: g } if g == generation
        ));
        self.phase = match source {
            Some(source) => SourcePhase::Live { generation, source },
            None => SourcePhase::Idle,
        };
    }

    /// Take the live source out of the handle, entering `Destroying`
    pub(crate) fn begin_teardown(&mut self) -> Option<(u64, Box<dyn Source>)> {
        match std::mem::replace(&mut self.phase, SourcePhase::Idle) {
            SourcePhase::Live { generation, source } => {
                self.phase = SourcePhase::Destroying { generation };
                Some((generation, source))
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    pub(crate) fn finish_teardown(&mut self, generation: u64) {
        if matches!(self.phase, SourcePhase::Destroying { generation: g } if g == generation) {
            self.phase = SourcePhase::Idle;
        }
    }
}

impl Hub {
    /// Make sure a source is live, constructing one if there is none
    ///
    /// Returns with `state` locked and the handle `Live`, or with the
    /// construction error and the handle `Idle`.
    pub(crate) fn ensure_exists(
        self: &Arc<Self>,
        state: &mut MutexGuard<'_, HubState>,
    ) -> Result<(), SourceError> {
        loop {
            if state.handle.is_live() {
                return Ok(());
            }
            if !state.handle.is_settling() {
                break;
            }
            self.settled.wait(state);
        }

        let generation = state.handle.begin_construct();
        let on_event = self.event_callback(generation);
        tracing::debug!(
            "Constructing {} source (generation {})",
            self.factory.name(),
            generation
        );

        let result = MutexGuard::unlocked(state, || {
            panic::catch_unwind(AssertUnwindSafe(|| self.factory.construct(on_event)))
        });

        let outcome = match result {
            Ok(Ok(source)) => {
                state.handle.finish_construct(generation, Some(source));
                self.counters.constructions.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    "{} source live (generation {})",
                    self.factory.name(),
                    generation
                );
                Ok(())
            }
            Ok(Err(e)) => {
                state.handle.finish_construct(generation, None);
                tracing::warn!("Failed to construct {} source: {}", self.factory.name(), e);
                Err(e)
            }
            Err(payload) => {
                state.handle.finish_construct(generation, None);
                self.settled.notify_all();
                panic::resume_unwind(payload);
            }
        };

        self.settled.notify_all();
        outcome
    }

    /// Destroy the live source if no consumer is registered
    pub(crate) fn teardown_if_unused(&self, state: &mut MutexGuard<'_, HubState>) {
        if !state.registry.is_empty() {
            return;
        }
        let Some((generation, source)) = state.handle.begin_teardown() else {
            return;
        };

        tracing::debug!(
            "No consumers left, destroying {} source (generation {})",
            self.factory.name(),
            generation
        );

        let result = MutexGuard::unlocked(state, || source.destroy());

        state.handle.finish_teardown(generation);
        self.counters.teardowns.fetch_add(1, Ordering::Relaxed);
        self.settled.notify_all();

        match result {
            Ok(()) => tracing::info!(
                "{} source torn down (generation {})",
                self.factory.name(),
                generation
            ),
            Err(e) => tracing::warn!(
                "Failed to destroy {} source (generation {}): {}",
                self.factory.name(),
                generation,
                e
            ),
        }
    }
}
