//! Registry of live consumer streams
//!
//! The registry maps stream ids to the sending half of each stream's queue.
//! Ids are issued under the hub lock at the moment of insertion, so iterating
//! the map visits streams in registration order and removal by id needs no
//! scan.
//!
//! An empty registry is the one condition that tears the source down.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::{Sender, TrySendError};
use sysevent_source::{Event, SourceError};

use crate::hub::Hub;
use crate::stream::{StreamId, StreamShared};

/// The registry's reference to one stream
pub(crate) struct ConsumerSlot {
    sender: Sender<Event>,
    shared: Arc<StreamShared>,
}

impl ConsumerSlot {
    pub(crate) fn new(sender: Sender<Event>, shared: Arc<StreamShared>) -> Self {
        Self { sender, shared }
    }

    /// Enqueue an event for this stream
    ///
    /// Returns `false` when the event was skipped: the stream is closed, its
    /// reader is gone, or its bounded queue is full.
    fn push(&self, id: StreamId, event: &Event) -> bool {
        if self.shared.is_closed() {
            return false;
        }

        match self.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.shared.record_dropped();
                tracing::warn!("Queue full for {}, dropping event", id);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Ordered set of registered streams
#[derive(Default)]
pub(crate) struct ConsumerRegistry {
    slots: BTreeMap<StreamId, ConsumerSlot>,
}

impl ConsumerRegistry {
    pub(crate) fn insert(&mut self, id: StreamId, slot: ConsumerSlot) {
        self.slots.insert(id, slot);
    }

    /// Remove a stream, returning whether it was registered
    pub(crate) fn remove(&mut self, id: StreamId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<StreamId> {
        self.slots.keys().copied().collect()
    }

    /// Deliver an event to every registered stream in registration order
    ///
    /// Returns the number of streams that accepted it.
    pub(crate) fn broadcast(&self, event: &Event) -> usize {
        self.slots
            .iter()
            .filter(|(id, slot)| slot.push(**id, event))
            .count()
    }
}

impl Hub {
    /// Register a stream, constructing the source first if needed
    ///
    /// The id is issued while the lock is held, so ids follow registration
    /// order.
    pub(crate) fn register(self: &Arc<Self>, slot: ConsumerSlot) -> Result<StreamId, SourceError> {
        let mut state = self.state.lock();
        self.ensure_exists(&mut state)?;

        let id = StreamId::next();
        let before = state.registry.len();
        state.registry.insert(id, slot);
        tracing::debug!(
            "Consumer count: {} -> {} (registered {})",
            before,
            state.registry.len(),
            id
        );
        Ok(id)
    }

    /// Remove a stream and tear the source down if it was the last one
    pub(crate) fn deregister(&self, id: StreamId) {
        let mut state = self.state.lock();

        let before = state.registry.len();
        if state.registry.remove(id) {
            tracing::debug!(
                "Consumer count: {} -> {} (deregistered {})",
                before,
                state.registry.len(),
                id
            );
        } else {
            tracing::trace!("{} was not registered", id);
        }

        self.teardown_if_unused(&mut state);
    }

    /// Deliver an event from the source of `generation` to every stream
    pub(crate) fn broadcast(&self, generation: u64, event: Event) {
        let state = self.state.lock();
        if !state.handle.accepts(generation) {
            tracing::trace!(
                "Discarding event from retired source generation {}",
                generation
            );
            return;
        }

        let delivered = state.registry.broadcast(&event);
        self.counters.events_broadcast.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            "Broadcast {} event to {} of {} consumers",
            event.class_name().unwrap_or("unclassified"),
            delivered,
            state.registry.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{self, Receiver};
    use sysevent_source::NvList;

    fn slot(capacity: Option<usize>) -> (ConsumerSlot, Receiver<Event>, Arc<StreamShared>) {
        let (tx, rx) = match capacity {
            Some(cap) => channel::bounded(cap),
            None => channel::unbounded(),
        };
        let shared = Arc::new(StreamShared::default());
        (ConsumerSlot::new(tx, Arc::clone(&shared)), rx, shared)
    }

    fn xy(x: i32, y: i32) -> Event {
        Event::new(NvList::new().with("x", x).with("y", y), NvList::new())
    }

    #[test]
    fn test_broadcast_reaches_every_stream() {
        let mut registry = ConsumerRegistry::default();
        let (a, rx_a, _) = slot(None);
        let (b, rx_b, _) = slot(None);
        registry.insert(StreamId::next(), a);
        registry.insert(StreamId::next(), b);

        let event = xy(1, 2);
        assert_eq!(registry.broadcast(&event), 2);

        let got_a = rx_a.try_recv().unwrap();
        let got_b = rx_b.try_recv().unwrap();
        assert!(got_a.same_payloads(&event));
        assert!(got_b.same_payloads(&event));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_registration_order() {
        let mut registry = ConsumerRegistry::default();
        let ids: Vec<_> = (0..5).map(|_| StreamId::next()).collect();

        // Insert out of order; ids alone decide iteration order
        for id in ids.iter().rev() {
            let (s, _rx, _) = slot(None);
            registry.insert(*id, s);
        }
        assert_eq!(registry.ids(), ids);

        assert!(registry.remove(ids[2]));
        assert!(!registry.remove(ids[2]));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_closed_stream_is_skipped() {
        let mut registry = ConsumerRegistry::default();
        let (open, rx_open, _) = slot(None);
        let (closed, rx_closed, closed_shared) = slot(None);
        registry.insert(StreamId::next(), closed);
        registry.insert(StreamId::next(), open);

        closed_shared.close();
        assert_eq!(registry.broadcast(&xy(1, 2)), 1);
        assert!(rx_closed.try_recv().is_err());
        assert!(rx_open.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_reader_does_not_block_others() {
        let mut registry = ConsumerRegistry::default();
        let (gone, rx_gone, _) = slot(None);
        let (live, rx_live, _) = slot(None);
        registry.insert(StreamId::next(), gone);
        registry.insert(StreamId::next(), live);
        drop(rx_gone);

        assert_eq!(registry.broadcast(&xy(3, 4)), 1);
        assert_eq!(rx_live.try_recv().unwrap().nvl0().get_i32("x"), Some(3));
    }

    #[test]
    fn test_full_queue_drops_for_that_stream_only() {
        let mut registry = ConsumerRegistry::default();
        let (small, rx_small, small_shared) = slot(Some(1));
        let (large, rx_large, _) = slot(None);
        registry.insert(StreamId::next(), small);
        registry.insert(StreamId::next(), large);

        assert_eq!(registry.broadcast(&xy(1, 0)), 2);
        assert_eq!(registry.broadcast(&xy(2, 0)), 1);

        assert_eq!(small_shared.stats().dropped, 1);
        assert_eq!(rx_small.len(), 1);
        assert_eq!(rx_large.len(), 2);
    }
}
