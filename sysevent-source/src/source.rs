//! The contract between a native event channel and its consumers
//!
//! A [`SourceFactory`] opens the channel and hands back a live [`Source`].
//! The source invokes the callback it was constructed with once per received
//! event, from whatever thread it delivers on, until [`Source::destroy`]
//! returns. After `destroy` returns the callback must never run again.

use std::sync::Arc;

use crate::error::Result;
use crate::payload::NvList;

/// Callback a source invokes per event with its two payloads
pub type EventCallback = Arc<dyn Fn(NvList, NvList) + Send + Sync>;

/// A live subscription to the event channel
pub trait Source: Send {
    /// Detach from the channel and release it
    ///
    /// Consumes the source. Errors are reported for logging only; the source
    /// is considered gone either way.
    fn destroy(self: Box<Self>) -> Result<()>;
}

/// Opens the event channel
pub trait SourceFactory: Send + Sync {
    /// Open the channel, delivering events to `on_event`
    fn construct(&self, on_event: EventCallback) -> Result<Box<dyn Source>>;

    /// Short name used in log output
    fn name(&self) -> &str {
        "source"
    }
}

impl<F> SourceFactory for F
where
    F: Fn(EventCallback) -> Result<Box<dyn Source>> + Send + Sync,
{
    fn construct(&self, on_event: EventCallback) -> Result<Box<dyn Source>> {
        self(on_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullSource;

    impl Source for NullSource {
        fn destroy(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_closure_factory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let factory = move |on_event: EventCallback| -> Result<Box<dyn Source>> {
            on_event(NvList::new(), NvList::new());
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullSource))
        };

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let source = factory
            .construct(Arc::new(move |_: NvList, _: NvList| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(factory.name(), "source");
        assert!(source.destroy().is_ok());
    }

    #[test]
    fn test_failing_factory() {
        let factory = |_: EventCallback| -> Result<Box<dyn Source>> {
            Err(SourceError::PermissionDenied("not privileged".to_string()))
        };
        let result = factory.construct(Arc::new(|_: NvList, _: NvList| {}));
        assert!(matches!(result, Err(SourceError::PermissionDenied(_))));
    }
}
