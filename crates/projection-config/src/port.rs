//! Compose short-syntax port parsing
//!
//! Accepted shapes, each optionally suffixed with `/proto`:
//! - `CONTAINER`
//! - `HOST:CONTAINER`
//! - `BIND:HOST:CONTAINER`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bind address marking a binding as reachable from the docker host only
pub const LOOPBACK_ADDRESS: &str = "127.0.0.1";

/// Port protocol class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Raw TCP passthrough (`/tcp` suffix)
    Stream,
    /// Reverse-proxied HTTP (no suffix)
    Http,
}

impl Protocol {
    /// Both classes, in artifact generation order
    pub const ALL: [Protocol; 2] = [Protocol::Stream, Protocol::Http];

    /// Lowercase name used in file names and settings keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Stream => "stream",
            Protocol::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single published port of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    /// Port published on the host side
    pub host_port: String,
    /// Port the container listens on
    pub container_port: String,
    /// Protocol class derived from the suffix
    pub protocol: Protocol,
    /// Host address the port is bound to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
}

impl PortBinding {
    /// Whether the binding is only reachable through the loopback interface
    pub fn is_loopback(&self) -> bool {
        self.bind_address.as_deref() == Some(LOOPBACK_ADDRESS)
    }
}

/// Parse a compose port entry.
///
/// Returns `None` when the entry has no usable port component.
/// Only `/tcp` selects the stream class; anything else, including other
/// protocol suffixes, is treated as HTTP.
pub fn parse_port(entry: &str) -> Option<PortBinding> {
    let entry = entry.trim();

    let (mapping, protocol) = match entry.rsplit_once('/') {
        Some((mapping, "tcp")) => (mapping, Protocol::Stream),
        Some((mapping, _)) => (mapping, Protocol::Http),
        None => (entry, Protocol::Http),
    };

    // Split from the right so a bracketed IPv6 bind address keeps its colons
    let mut parts = mapping.rsplitn(3, ':');
    let container_port = parts.next()?.trim();
    let host_port = parts.next().map(str::trim).unwrap_or(container_port);
    let bind_address = parts
        .next()
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string);

    if container_port.is_empty() || host_port.is_empty() {
        return None;
    }

    Some(PortBinding {
        host_port: host_port.to_string(),
        container_port: container_port.to_string(),
        protocol,
        bind_address,
    })
}
