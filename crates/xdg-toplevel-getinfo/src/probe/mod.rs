//! Toplevel probe
//!
//! Maps a throwaway xdg toplevel and reports the size the compositor
//! configures it to, corrected by the output scale.
//!
//! ## Architecture
//!
//! - `Session`: protocol-free state machine driven by configure and close
//!   events
//! - `ObjectChain`: the protocol objects, created in order and destroyed in
//!   reverse
//! - `ToplevelProbe`: owns the connection and runs the bounded handshake
//!
//! ## Handshake
//!
//! One round-trip discovers `wl_compositor` and `xdg_wm_base`. The surface
//! is then given the toplevel role and committed, and a further round-trip
//! plus a small budget of extra ones wait for a configure with a non-zero
//! size.

mod chain;
mod client;
mod error;
mod session;

pub use client::ToplevelProbe;
pub use error::ProbeError;
pub use session::ProbeOutcome;
