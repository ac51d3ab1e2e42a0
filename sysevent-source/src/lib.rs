//! # Sysevent Source
//!
//! The boundary between a native system event channel and the consumers that
//! fan its events out.
//!
//! - [`SourceFactory`] / [`Source`]: construct with a callback, receive one
//!   callback per event, destroy explicitly.
//! - [`NvList`] / [`NvValue`]: the structured payloads an event carries.
//! - [`Event`] / [`EventHeader`]: an immutable, shared pair of payloads.
//! - [`ChannelSourceFactory`]: an in-process source fed through an
//!   [`EventInjector`], delivering on its own worker thread.
//!
//! ```rust
//! use std::sync::Arc;
//! use sysevent_source::{ChannelSourceFactory, EventHeader, NvList, SourceFactory};
//!
//! let factory = ChannelSourceFactory::new();
//! let source = factory.construct(Arc::new(|nvl0: NvList, _nvl1: NvList| {
//!     println!("class: {:?}", nvl0.get_str("class_name"));
//! }))?;
//!
//! let header = EventHeader::new("EC_dev_add", "ESC_disk");
//! factory.injector().publish_event(&header, NvList::new());
//!
//! source.destroy()?;
//! # Ok::<(), sysevent_source::SourceError>(())
//! ```

pub mod channel;
pub mod error;
pub mod event;
pub mod payload;
pub mod source;

pub use channel::{ChannelSource, ChannelSourceFactory, EventInjector};
pub use error::{Result, SourceError};
pub use event::{Event, EventHeader, EventOrigin, KERNEL_PID};
pub use payload::{NvList, NvValue, RawNvValue};
pub use source::{EventCallback, Source, SourceFactory};
