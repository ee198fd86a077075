// src/types.rs
//! Scalar types shared by every layer of the router.

use std::fmt;

/// Local port number on a router. One link attaches to one port.
pub type Port = u32;

/// Link or route latency, in the harness' time units.
pub type Latency = u32;

/// Monotonic clock reading supplied by the harness.
pub type Time = u64;

/// Name of a destination host (e.g. "h1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(String);

impl HostId {
    pub fn new(name: impl Into<String>) -> Self {
        HostId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        HostId(s.to_owned())
    }
}

impl From<String> for HostId {
    fn from(s: String) -> Self {
        HostId(s)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
