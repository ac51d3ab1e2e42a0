//! Event types delivered by a source
//!
//! Every event is a pair of payloads. The first (`nvl0`) is a header built by
//! the source from the raw event: class, subclass, vendor, publisher, origin
//! and publisher pid. The second (`nvl1`) is the event's attribute list,
//! passed through verbatim and empty when the event carried none.
//!
//! Events are immutable and cheap to clone; every consumer stream receives a
//! handle to the same payloads.

use std::fmt;
use std::sync::Arc;

use crate::payload::NvList;

/// Publisher pid reported for events raised by the kernel
pub const KERNEL_PID: i32 = 0;

/// Header field names, in the order a source writes them
pub mod fields {
    pub const CLASS_NAME: &str = "class_name";
    pub const SUBCLASS_NAME: &str = "subclass_name";
    pub const VENDOR_NAME: &str = "vendor_name";
    pub const PUBLISHER_NAME: &str = "publisher_name";
    pub const SOURCE: &str = "source";
    pub const PID: &str = "pid";
}

/// Who raised an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOrigin {
    Kernel,
    User,
}

impl EventOrigin {
    /// Classify a publisher pid
    pub fn from_pid(pid: i32) -> Self {
        if pid == KERNEL_PID {
            EventOrigin::Kernel
        } else {
            EventOrigin::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventOrigin::Kernel => "kernel",
            EventOrigin::User => "user",
        }
    }

    /// Parse the `source` header value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kernel" => Some(EventOrigin::Kernel),
            "user" => Some(EventOrigin::User),
            _ => None,
        }
    }
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for the header payload of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    pub class_name: String,
    pub subclass_name: String,
    pub vendor_name: String,
    pub publisher_name: String,
    pub pid: i32,
}

impl EventHeader {
    /// Create a kernel-raised header for the given class and subclass
    pub fn new(class_name: impl Into<String>, subclass_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            subclass_name: subclass_name.into(),
            vendor_name: String::new(),
            publisher_name: String::new(),
            pid: KERNEL_PID,
        }
    }

    pub fn with_vendor(mut self, vendor_name: impl Into<String>) -> Self {
        self.vendor_name = vendor_name.into();
        self
    }

    pub fn with_publisher(mut self, publisher_name: impl Into<String>) -> Self {
        self.publisher_name = publisher_name.into();
        self
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = pid;
        self
    }

    pub fn origin(&self) -> EventOrigin {
        EventOrigin::from_pid(self.pid)
    }

    /// Render the header as the first payload of an event
    pub fn to_nvlist(&self) -> NvList {
        NvList::new()
            .with(fields::CLASS_NAME, self.class_name.as_str())
            .with(fields::SUBCLASS_NAME, self.subclass_name.as_str())
            .with(fields::VENDOR_NAME, self.vendor_name.as_str())
            .with(fields::PUBLISHER_NAME, self.publisher_name.as_str())
            .with(fields::SOURCE, self.origin().as_str())
            .with(fields::PID, self.pid)
    }
}

#[derive(Debug, PartialEq, Eq, serde::Serialize)]
struct EventPayloads {
    nvl0: NvList,
    nvl1: NvList,
}

/// An immutable pair of payloads shared by every consumer
#[derive(Clone, PartialEq, Eq)]
pub struct Event {
    inner: Arc<EventPayloads>,
}

impl Event {
    pub fn new(nvl0: NvList, nvl1: NvList) -> Self {
        Self {
            inner: Arc::new(EventPayloads { nvl0, nvl1 }),
        }
    }

    /// Build an event from a typed header and an attribute list
    pub fn from_header(header: &EventHeader, attributes: NvList) -> Self {
        Self::new(header.to_nvlist(), attributes)
    }

    /// The first payload (header)
    pub fn nvl0(&self) -> &NvList {
        &self.inner.nvl0
    }

    /// The second payload (attributes)
    pub fn nvl1(&self) -> &NvList {
        &self.inner.nvl1
    }

    pub fn class_name(&self) -> Option<&str> {
        self.nvl0().get_str(fields::CLASS_NAME)
    }

    pub fn subclass_name(&self) -> Option<&str> {
        self.nvl0().get_str(fields::SUBCLASS_NAME)
    }

    pub fn vendor_name(&self) -> Option<&str> {
        self.nvl0().get_str(fields::VENDOR_NAME)
    }

    pub fn publisher_name(&self) -> Option<&str> {
        self.nvl0().get_str(fields::PUBLISHER_NAME)
    }

    pub fn origin(&self) -> Option<EventOrigin> {
        self.nvl0().get_str(fields::SOURCE).and_then(EventOrigin::parse)
    }

    pub fn pid(&self) -> Option<i32> {
        self.nvl0().get_i32(fields::PID)
    }

    /// True when both handles point at the same delivered payloads
    pub fn same_payloads(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "nvl0": self.nvl0().to_json(),
            "nvl1": self.nvl1().to_json(),
        })
    }
}

impl serde::Serialize for Event {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(self.inner.as_ref(), serializer)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("nvl0", self.nvl0())
            .field("nvl1", self.nvl1())
            .finish()
    }
}
