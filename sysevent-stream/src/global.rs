//! Process-wide default manager
//!
//! Most programs subscribe to the system event channel from several places
//! but should only ever hold one subscription to it. Installing a factory
//! once at startup lets any code call [`create_consumer_stream`] without
//! threading a manager through.
//!
//! ```rust,ignore
//! sysevent_stream::global::install(my_factory)?;
//!
//! // Anywhere else in the process
//! let stream = sysevent_stream::create_consumer_stream()?;
//! ```

use std::sync::OnceLock;

use sysevent_source::{SourceError, SourceFactory};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::manager::SyseventManager;
use crate::stream::ConsumerStream;

static GLOBAL: OnceLock<SyseventManager> = OnceLock::new();

/// Install the process-wide manager with default configuration
pub fn install<F>(factory: F) -> Result<()>
where
    F: SourceFactory + 'static,
{
    install_with_config(factory, StreamConfig::default())
}

/// Install the process-wide manager
///
/// Fails with [`StreamError::AlreadyInstalled`] if one is already installed.
pub fn install_with_config<F>(factory: F, config: StreamConfig) -> Result<()>
where
    F: SourceFactory + 'static,
{
    let manager = SyseventManager::with_config(factory, config)?;
    GLOBAL
        .set(manager)
        .map_err(|_| StreamError::AlreadyInstalled)?;
    tracing::debug!("Process-wide sysevent manager installed");
    Ok(())
}

/// The process-wide manager, if installed
pub fn manager() -> Option<&'static SyseventManager> {
    GLOBAL.get()
}

pub fn is_installed() -> bool {
    GLOBAL.get().is_some()
}

/// Create a consumer stream on the process-wide manager
///
/// Fails with [`StreamError::SourceUnavailable`] when no manager has been
/// installed or its source cannot be constructed.
pub fn create_consumer_stream() -> Result<ConsumerStream> {
    match GLOBAL.get() {
        Some(manager) => manager.create_consumer_stream(),
        None => Err(StreamError::SourceUnavailable(SourceError::Unavailable(
            "no process-wide sysevent source installed".to_string(),
        ))),
    }
}
