//! # Sysevent Stream
//!
//! Fans a single, expensive, process-wide system event source out to any
//! number of independent consumer streams.
//!
//! ## Overview
//!
//! Opening the kernel event channel is costly and only one subscription
//! should exist at a time. This crate keeps exactly one [`Source`] alive
//! while at least one consumer exists and hands every consumer its own
//! ordered, lazily pulled copy of the event sequence.
//!
//! ## Key Features
//!
//! - **Demand-Driven Source**: constructed when the first stream is created,
//!   destroyed when the last stream is disposed
//! - **Fan-Out**: every event reaches every registered stream exactly once,
//!   in source order
//! - **Independent Pacing**: each stream has its own queue; a slow consumer
//!   never holds up the others
//! - **Sync API**: blocking, non-blocking and timeout pulls, usable from any
//!   thread
//!
//! ## Usage
//!
//! ```rust
//! use sysevent_source::{ChannelSourceFactory, EventHeader, NvList};
//! use sysevent_stream::SyseventManager;
//! use std::time::Duration;
//!
//! let factory = ChannelSourceFactory::new();
//! let injector = factory.injector();
//! let manager = SyseventManager::new(factory);
//!
//! let a = manager.create_consumer_stream()?;
//! let b = manager.create_consumer_stream()?;
//!
//! let header = EventHeader::new("EC_zfs", "ESC_ZFS_scrub_finish");
//! injector.publish_event(&header, NvList::new().with("pool_name", "tank"));
//!
//! for stream in [&a, &b] {
//!     let event = stream.recv_timeout(Duration::from_secs(1)).unwrap();
//!     assert_eq!(event.nvl1().get_str("pool_name"), Some("tank"));
//! }
//!
//! a.dispose();
//! b.dispose(); // last consumer: the source is destroyed here
//! assert!(!manager.is_source_live());
//! # Ok::<(), sysevent_stream::StreamError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   Source ──callback──► Hub ─┬─► [queue 1] ─► ConsumerStream 1
//!                             ├─► [queue 2] ─► ConsumerStream 2
//!                             └─► [queue N] ─► ConsumerStream N
//! ```
//!
//! The hub holds the source handle and the consumer registry under one
//! mutex. Registration constructs the source on demand; deregistration of
//! the last stream destroys it.
//!
//! [`Source`]: sysevent_source::Source

pub mod config;
pub mod error;
pub mod global;
mod handle;
mod hub;
pub mod logging;
pub mod manager;
mod registry;
pub mod stream;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use global::create_consumer_stream;
pub use manager::{ManagerStats, SyseventManager};
pub use stream::{ConsumerStream, StreamId, StreamStats};

// Re-export commonly used types from the source crate
pub use sysevent_source::{
    Event, EventHeader, EventOrigin, NvList, NvValue, Source, SourceError, SourceFactory,
};

/// Prelude module for convenient imports
///
/// ```rust
/// use sysevent_stream::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ConsumerStream, Event, NvList, NvValue, Result, SourceFactory, StreamConfig, StreamError,
        SyseventManager,
    };
}
