//! Consumer streams
//!
//! A [`ConsumerStream`] is one consumer's view of the shared source: every
//! event broadcast while it is registered, in source order, pulled at the
//! consumer's own pace.
//!
//! Provides the same pull patterns as the rest of the SDK:
//! - Blocking: `recv()`, `for event in &stream`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`
//!
//! The sequence ends only when the stream is disposed, either explicitly with
//! [`ConsumerStream::dispose`] or by dropping it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use sysevent_source::Event;

use crate::error::Result;
use crate::hub::Hub;
use crate::registry::ConsumerSlot;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a consumer stream
///
/// Issued in strictly increasing order for the lifetime of the process and
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Per-stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Events handed to the consumer
    pub delivered: u64,
    /// Events lost because the stream's bounded queue was full
    pub dropped: u64,
}

/// State shared between a stream and its registry slot
#[derive(Debug, Default)]
pub(crate) struct StreamShared {
    closed: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl StreamShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed, returning whether this call did it
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> StreamStats {
        StreamStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// One consumer's lazily pulled sequence of events
///
/// Created by [`SyseventManager::create_consumer_stream`](crate::SyseventManager::create_consumer_stream).
/// All methods take `&self`, so a stream can be read on one thread and
/// disposed from another; a reader blocked in [`recv`](Self::recv) wakes up
/// and sees the end of the sequence.
///
/// # Example
///
/// ```rust,ignore
/// let stream = manager.create_consumer_stream()?;
///
/// // Blocking iteration
/// for event in &stream {
///     println!("{:?}/{:?}", event.class_name(), event.subclass_name());
/// }
///
/// // Non-blocking drain
/// for event in stream.try_iter() {
///     println!("{:?}", event);
/// }
///
/// stream.dispose();
/// ```
pub struct ConsumerStream {
    id: StreamId,
    rx: Receiver<Event>,
    shared: Arc<StreamShared>,
    hub: Arc<Hub>,
}

impl ConsumerStream {
    /// Build a queue and register it with the hub, which issues the id
    ///
    /// Nothing is returned if registration fails.
    pub(crate) fn create(hub: &Arc<Hub>) -> Result<Self> {
        let (tx, rx) = match hub.config.queue_capacity {
            Some(capacity) => channel::bounded(capacity),
            None => channel::unbounded(),
        };
        let shared = Arc::new(StreamShared::default());

        let id = hub.register(ConsumerSlot::new(tx, Arc::clone(&shared)))?;

        Ok(Self {
            id,
            rx,
            shared,
            hub: Arc::clone(hub),
        })
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Number of events queued and not yet pulled
    pub fn pending(&self) -> usize {
        if self.is_disposed() {
            0
        } else {
            self.rx.len()
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.shared.stats()
    }

    /// Release this stream's registration
    ///
    /// Idempotent. Queued events are discarded and every later pull returns
    /// `None`. If this was the last stream, the shared source is destroyed
    /// before this returns.
    pub fn dispose(&self) {
        if !self.shared.close() {
            return;
        }
        tracing::debug!("Disposing {}", self.id);
        self.hub.deregister(self.id);
    }

    /// Block until the next event is available
    ///
    /// Returns `None` once the stream is disposed.
    pub fn recv(&self) -> Option<Event> {
        if self.is_disposed() {
            return None;
        }
        let event = self.rx.recv().ok()?;
        self.accept(event)
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is queued or the stream is disposed.
    pub fn try_recv(&self) -> Option<Event> {
        if self.is_disposed() {
            return None;
        }
        let event = self.rx.try_recv().ok()?;
        self.accept(event)
    }

    /// Block until an event is available or the timeout expires
    ///
    /// Returns `None` if the timeout expires or the stream is disposed.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        if self.is_disposed() {
            return None;
        }
        let event = self.rx.recv_timeout(timeout).ok()?;
        self.accept(event)
    }

    /// Blocking iterator over events until the stream is disposed
    pub fn iter(&self) -> Iter<'_> {
        Iter { inner: self }
    }

    /// Get a non-blocking iterator over currently queued events
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Get a blocking iterator with timeout
    ///
    /// Blocks for up to `timeout` on each call to `next()` and stops at the
    /// first wait that yields nothing.
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }

    fn accept(&self, event: Event) -> Option<Event> {
        // Disposed while we were waiting
        if self.is_disposed() {
            return None;
        }
        self.shared.record_delivered();
        Some(event)
    }
}

impl Iterator for ConsumerStream {
    type Item = Event;

    /// Block until the next event
    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl<'a> IntoIterator for &'a ConsumerStream {
    type Item = Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Drop for ConsumerStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ConsumerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerStream")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Blocking iterator over a borrowed stream
pub struct Iter<'a> {
    inner: &'a ConsumerStream,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv()
    }
}

/// Non-blocking iterator over currently queued events
pub struct TryIter<'a> {
    inner: &'a ConsumerStream,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a> {
    inner: &'a ConsumerStream,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIter<'a> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
