//! Probe session state machine
//!
//! The session holds everything the Wayland event handlers mutate, kept
//! free of protocol types so the configure handling can be exercised
//! without a compositor. Handlers receive it by `&mut` from the event
//! queue, one event at a time.

use std::fmt;

use tracing::debug;

use crate::scale::ScaleSource;

/// A toplevel size in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: i32,
    pub height: i32,
}

impl PixelSize {
    /// Convert a logical compositor size to pixels
    ///
    /// Both dimensions are multiplied first and truncated afterwards.
    pub fn from_logical(width: i32, height: i32, scale: f64) -> Self {
        Self {
            width: (f64::from(width) * scale) as i32,
            height: (f64::from(height) * scale) as i32,
        }
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a configured probe ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Configured {
    Success(PixelSize),
    Closed,
}

/// Position of the probe in the configure handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Discovering,
    AwaitingCapabilities,
    SurfaceReady,
    AwaitingConfigure,
    Configured(Configured),
    Failed,
}

/// Final result of a probe that reached teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The compositor proposed a size and the scale was known
    Measured(PixelSize),
    /// The compositor asked the toplevel to close before sizing it
    Closed,
    /// The round-trip budget ran out while still waiting
    BudgetExhausted,
    /// The connection broke while waiting for a configure
    Disconnected,
}

/// What a toplevel configure event did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureResponse {
    /// Width or height was zero, the compositor left sizing to us
    Deferred,
    /// The scale could not be resolved, keep waiting
    ScaleUnavailable,
    /// The size was recorded and the session stopped running
    Measured(PixelSize),
    /// A result was already settled
    Ignored,
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    running: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Connecting,
            running: true,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while no usable configure or close has been seen
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn measured(&self) -> Option<PixelSize> {
        match self.phase {
            Phase::Configured(Configured::Success(size)) => Some(size),
            _ => None,
        }
    }

    /// The settled result, if the compositor already produced one
    pub fn outcome(&self) -> Option<ProbeOutcome> {
        if let Some(size) = self.measured() {
            return Some(ProbeOutcome::Measured(size));
        }

        match self.phase {
            Phase::Configured(Configured::Closed) => Some(ProbeOutcome::Closed),
            _ => None,
        }
    }

    /// Move to the next handshake phase
    ///
    /// Settled or failed sessions stay where they are.
    pub fn advance(&mut self, next: Phase) {
        if matches!(self.phase, Phase::Configured(_) | Phase::Failed) {
            debug!(?next, current = ?self.phase, "Ignoring transition of settled probe");
            return;
        }

        debug!(from = ?self.phase, to = ?next, "Probe transition");
        self.phase = next;
        if let Phase::Configured(_) = next {
            self.running = false;
        }
    }

    pub fn fail(&mut self) {
        debug!(from = ?self.phase, "Probe failed");
        self.phase = Phase::Failed;
        self.running = false;
    }

    /// Handle `xdg_toplevel.configure`
    pub fn handle_toplevel_configure(
        &mut self,
        width: i32,
        height: i32,
        scale: &dyn ScaleSource,
    ) -> ConfigureResponse {
        if !self.running {
            return ConfigureResponse::Ignored;
        }

        if width == 0 || height == 0 {
            debug!("Compositor is deferring size decision to us");
            return ConfigureResponse::Deferred;
        }

        let Some(factor) = scale.scale() else {
            debug!("Failed to get output scale");
            return ConfigureResponse::ScaleUnavailable;
        };

        let size = PixelSize::from_logical(width, height, factor);
        debug!(width, height, factor, "Base dimensions from compositor");
        self.advance(Phase::Configured(Configured::Success(size)));

        ConfigureResponse::Measured(size)
    }

    /// Handle `xdg_toplevel.close`
    ///
    /// A measurement that was already taken stands.
    pub fn handle_close(&mut self) {
        if !self.running {
            return;
        }

        debug!("Compositor closed the toplevel before sizing it");
        self.advance(Phase::Configured(Configured::Closed));
    }
}
