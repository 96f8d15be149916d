//! Error types for the toplevel probe

use thiserror::Error;
use wayland_client::{ConnectError, DispatchError};

/// Failures that abort the probe and make the process exit non-zero
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No compositor reachable through `WAYLAND_DISPLAY` / `WAYLAND_SOCKET`
    #[error("Failed to connect to Wayland display: {0}")]
    Connect(#[source] ConnectError),

    /// The connection broke before the globals were discovered
    #[error("Wayland round-trip failed: {0}")]
    Roundtrip(#[source] DispatchError),

    /// A required global was not announced at the version we bind
    #[error("Compositor doesn't support required interface {interface} v{version}")]
    MissingCapability {
        interface: &'static str,
        version: u32,
    },

    /// A protocol object could not be created
    #[error("Failed to create {object}")]
    ObjectCreation { object: &'static str },
}
