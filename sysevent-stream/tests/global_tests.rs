//! Tests for the process-wide manager
//!
//! The global can only be installed once per process, so the whole
//! install sequence runs inside a single test.


use mock_source::MockSourceFactory;
use sysevent_stream::{global, SourceError, StreamError};

#[test]
fn test_global_install_sequence() {
    assert!(!global::is_installed());
    assert!(global::manager().is_none());

    let err = sysevent_stream::create_consumer_stream().unwrap_err();
    assert!(matches!(
        err,
        StreamError::SourceUnavailable(SourceError::Unavailable(_))
    ));

    let factory = MockSourceFactory::new();
    global::install(factory.clone()).unwrap();
    assert!(global::is_installed());

    let again = global::install(MockSourceFactory::new()).unwrap_err();
    assert!(matches!(again, StreamError::AlreadyInstalled));

    let a = sysevent_stream::create_consumer_stream().unwrap();
    let b = sysevent_stream::create_consumer_stream().unwrap();
    assert_eq!(factory.construction_count(), 1);
    assert_eq!(global::manager().unwrap().consumer_count(), 2);

    factory.fire_xy(4, 2);
    assert!(a.try_recv().is_some());
    assert!(b.try_recv().is_some());

    drop(a);
    drop(b);
    assert_eq!(factory.destruction_count(), 1);
    assert!(!global::manager().unwrap().is_source_live());
}
