//! Sysevent manager
//!
//! The entry point for creating consumer streams. A manager owns one hub:
//! the source handle and the registry of streams fed by it. Cloning a
//! manager shares the hub.

use std::sync::Arc;

use sysevent_source::SourceFactory;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::hub::Hub;
use crate::stream::ConsumerStream;

/// Snapshot of a manager's state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Streams currently registered
    pub active_consumers: usize,
    /// Whether a source instance currently exists
    pub source_live: bool,
    /// Sources constructed over the manager's lifetime
    pub constructions: u64,
    /// Sources destroyed over the manager's lifetime
    pub teardowns: u64,
    /// Events broadcast to consumers
    pub events_broadcast: u64,
}

/// Fans one shared event source out to any number of consumer streams
///
/// The source is constructed when the first stream is created and destroyed
/// when the last stream is disposed. All methods are synchronous and may be
/// called from any thread.
///
/// # Example
///
/// ```rust
/// use sysevent_source::{ChannelSourceFactory, EventHeader, NvList};
/// use sysevent_stream::SyseventManager;
/// use std::time::Duration;
///
/// let factory = ChannelSourceFactory::new();
/// let injector = factory.injector();
/// let manager = SyseventManager::new(factory);
///
/// let stream = manager.create_consumer_stream()?;
/// assert!(manager.is_source_live());
///
/// injector.publish_event(&EventHeader::new("EC_dev_add", "ESC_disk"), NvList::new());
/// let event = stream.recv_timeout(Duration::from_secs(1)).unwrap();
/// assert_eq!(event.class_name(), Some("EC_dev_add"));
///
/// stream.dispose();
/// assert!(!manager.is_source_live());
/// # Ok::<(), sysevent_stream::StreamError>(())
/// ```
#[derive(Clone)]
pub struct SyseventManager {
    hub: Arc<Hub>,
}

impl SyseventManager {
    /// Create a manager with default configuration
    pub fn new<F>(factory: F) -> Self
    where
        F: SourceFactory + 'static,
    {
        Self {
            hub: Hub::new(Arc::new(factory), StreamConfig::default()),
        }
    }

    /// Create a manager with custom configuration
    pub fn with_config<F>(factory: F, config: StreamConfig) -> Result<Self>
    where
        F: SourceFactory + 'static,
    {
        Self::with_shared_factory(Arc::new(factory), config)
    }

    /// Create a manager around a factory that is shared elsewhere
    pub fn with_shared_factory(
        factory: Arc<dyn SourceFactory>,
        config: StreamConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            hub: Hub::new(factory, config),
        })
    }

    /// Create a new consumer stream
    ///
    /// Constructs the shared source if no stream currently exists. Fails with
    /// [`StreamError::SourceUnavailable`](crate::StreamError::SourceUnavailable)
    /// if the source cannot be constructed, in which case no stream is
    /// registered and a later call may retry.
    pub fn create_consumer_stream(&self) -> Result<ConsumerStream> {
        ConsumerStream::create(&self.hub)
    }

    /// Number of streams currently registered
    pub fn consumer_count(&self) -> usize {
        self.hub.state.lock().registry.len()
    }

    /// Whether the shared source currently exists
    pub fn is_source_live(&self) -> bool {
        self.hub.state.lock().handle.is_live()
    }

    pub fn stats(&self) -> ManagerStats {
        self.hub.stats()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.hub.config
    }
}

impl std::fmt::Debug for SyseventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyseventManager")
            .field("source", &self.hub.factory.name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use sysevent_source::{EventCallback, NvList, Source, SourceError};

    /// Factory that keeps the latest callback so tests can fire events
    #[derive(Clone, Default)]
    struct ScriptedFactory {
        callback: Arc<Mutex<Option<EventCallback>>>,
        constructed: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
        fail: Arc<Mutex<bool>>,
    }

    struct ScriptedSource {
        callback: Arc<Mutex<Option<EventCallback>>>,
        destroyed: Arc<AtomicUsize>,
    }

    impl Source for ScriptedSource {
        fn destroy(self: Box<Self>) -> sysevent_source::Result<()> {
            self.callback.lock().unwrap().take();
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl SourceFactory for ScriptedFactory {
        fn construct(&self, on_event: EventCallback) -> sysevent_source::Result<Box<dyn Source>> {
            if *self.fail.lock().unwrap() {
                return Err(SourceError::PermissionDenied("denied".to_string()));
            }
            *self.callback.lock().unwrap() = Some(on_event);
            self.constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSource {
                callback: Arc::clone(&self.callback),
                destroyed: Arc::clone(&self.destroyed),
            }))
        }
    }

    impl ScriptedFactory {
        fn fire(&self, x: i32, y: i32) {
            let callback = self.callback.lock().unwrap().clone();
            if let Some(callback) = callback {
                callback(NvList::new().with("x", x).with("y", y), NvList::new());
            }
        }
    }

    #[test]
    fn test_source_follows_consumers() {
        let factory = ScriptedFactory::default();
        let manager = SyseventManager::new(factory.clone());

        assert!(!manager.is_source_live());
        assert_eq!(manager.consumer_count(), 0);

        let a = manager.create_consumer_stream().unwrap();
        let b = manager.create_consumer_stream().unwrap();
        assert!(manager.is_source_live());
        assert_eq!(manager.consumer_count(), 2);
        assert_eq!(factory.constructed.load(Ordering::SeqCst), 1);

        a.dispose();
        assert!(manager.is_source_live());
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 0);

        b.dispose();
        assert!(!manager.is_source_live());
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_reach_streams() {
        let factory = ScriptedFactory::default();
        let manager = SyseventManager::new(factory.clone());

        let stream = manager.create_consumer_stream().unwrap();
        factory.fire(1, 2);

        let event = stream.try_recv().unwrap();
        assert_eq!(event.nvl0().get_i32("x"), Some(1));
        assert_eq!(event.nvl0().get_i32("y"), Some(2));
        assert_eq!(stream.stats().delivered, 1);
        assert_eq!(manager.stats().events_broadcast, 1);
    }

    #[test]
    fn test_construction_failure() {
        let factory = ScriptedFactory::default();
        *factory.fail.lock().unwrap() = true;
        let manager = SyseventManager::new(factory.clone());

        let result = manager.create_consumer_stream();
        assert!(matches!(result, Err(StreamError::SourceUnavailable(_))));
        assert!(!manager.is_source_live());
        assert_eq!(manager.consumer_count(), 0);

        *factory.fail.lock().unwrap() = false;
        let stream = manager.create_consumer_stream().unwrap();
        assert!(manager.is_source_live());
        drop(stream);
        assert!(!manager.is_source_live());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SyseventManager::with_config(
            ScriptedFactory::default(),
            StreamConfig::bounded(0),
        );
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }

    #[test]
    fn test_stats() {
        let factory = ScriptedFactory::default();
        let manager = SyseventManager::new(factory.clone());
        assert_eq!(manager.stats(), ManagerStats::default());

        let stream = manager.create_consumer_stream().unwrap();
        let stats = manager.stats();
        assert_eq!(stats.active_consumers, 1);
        assert!(stats.source_live);
        assert_eq!(stats.constructions, 1);

        stream.dispose();
        let stats = manager.stats();
        assert_eq!(stats.active_consumers, 0);
        assert!(!stats.source_live);
        assert_eq!(stats.teardowns, 1);
    }

    #[test]
    fn test_streams_outlive_manager() {
        let factory = ScriptedFactory::default();
        let manager = SyseventManager::new(factory.clone());
        let stream = manager.create_consumer_stream().unwrap();
        drop(manager);

        factory.fire(5, 6);
        assert_eq!(stream.try_recv().unwrap().nvl0().get_i32("x"), Some(5));
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 0);

        // Last stream tears down; the hub goes with it
        drop(stream);
        assert_eq!(factory.destroyed.load(Ordering::SeqCst), 1);
        assert!(factory.callback.lock().unwrap().is_none());
    }
}
