//! Wayland side of the toplevel probe
//!
//! [`ToplevelProbe`] owns the connection and its event queue. Every
//! protocol event is dispatched into [`ProbeState`], which forwards the
//! interesting ones to the [`Session`] state machine.

use std::fmt;

use tracing::{debug, warn};
use wayland_client::protocol::{wl_compositor, wl_registry, wl_surface};
use wayland_client::{delegate_noop, Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use super::chain::{ObjectChain, COMPOSITOR_VERSION, WM_BASE_VERSION};
use super::session::{Phase, ProbeOutcome, Session};
use super::ProbeError;
use crate::scale::ScaleSource;

/// State the event queue dispatches into
pub struct ProbeState {
    session: Session,
    chain: ObjectChain,
    scale: Box<dyn ScaleSource>,
}

impl ProbeState {
    fn new(scale: Box<dyn ScaleSource>) -> Self {
        Self {
            session: Session::new(),
            chain: ObjectChain::default(),
            scale,
        }
    }
}

/// A short-lived Wayland client that maps one toplevel and reads its size
pub struct ToplevelProbe {
    connection: Connection,
    queue: EventQueue<ProbeState>,
    state: ProbeState,
    roundtrip_budget: u32,
}

impl ToplevelProbe {
    /// Connect to the compositor named by the environment
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Connect` if no compositor is reachable.
    pub fn connect(scale: Box<dyn ScaleSource>, roundtrip_budget: u32) -> Result<Self, ProbeError> {
        let connection = Connection::connect_to_env().map_err(ProbeError::Connect)?;
        let queue = connection.new_event_queue();

        Ok(Self {
            connection,
            queue,
            state: ProbeState::new(scale),
            roundtrip_budget,
        })
    }

    /// Run the configure handshake and tear everything down
    ///
    /// Teardown happens on every path, including errors.
    pub fn run(mut self) -> Result<ProbeOutcome, ProbeError> {
        let result = self.measure();
        if result.is_err() {
            self.state.session.fail();
        }
        self.teardown();
        result
    }

    fn measure(&mut self) -> Result<ProbeOutcome, ProbeError> {
        let qh = self.queue.handle();

        self.state.session.advance(Phase::Discovering);
        let registry = self.connection.display().get_registry(&qh, ());
        self.state.chain.set_registry(registry);

        self.queue
            .roundtrip(&mut self.state)
            .map_err(ProbeError::Roundtrip)?;
        self.state.session.advance(Phase::AwaitingCapabilities);
        self.state.chain.require_capabilities()?;

        self.state.chain.create_toplevel(&qh)?;
        self.state.session.advance(Phase::SurfaceReady);

        self.state.session.advance(Phase::AwaitingConfigure);
        let mut pump = QueuePump {
            queue: &mut self.queue,
            state: &mut self.state,
        };
        Ok(await_configure(&mut pump, self.roundtrip_budget))
    }

    fn teardown(&mut self) {
        debug!(phase = ?self.state.session.phase(), "Tearing down probe");
        self.state.chain.teardown();
        if let Err(e) = self.connection.flush() {
            debug!("Could not flush destroy requests: {}", e);
        }
    }
}

/// Something that can block for one batch of compositor events
pub trait EventPump {
    type Error: fmt::Display;

    /// Flush queued requests and dispatch every event they caused
    fn roundtrip(&mut self) -> Result<(), Self::Error>;

    fn session(&self) -> &Session;
}

struct QueuePump<'a> {
    queue: &'a mut EventQueue<ProbeState>,
    state: &'a mut ProbeState,
}

impl EventPump for QueuePump<'_> {
    type Error = wayland_client::DispatchError;

    fn roundtrip(&mut self) -> Result<(), Self::Error> {
        self.queue.roundtrip(self.state).map(|dispatched| {
            debug!(dispatched, "Round-trip complete");
        })
    }

    fn session(&self) -> &Session {
        &self.state.session
    }
}

/// Wait for the compositor to settle the toplevel
///
/// Performs one round-trip unconditionally, then at most `budget` more
/// while the session is still running.
pub fn await_configure<P: EventPump>(pump: &mut P, budget: u32) -> ProbeOutcome {
    let mut spent = 0;

    loop {
        if let Err(e) = pump.roundtrip() {
            warn!("Lost compositor connection while waiting for configure: {}", e);
            return ProbeOutcome::Disconnected;
        }

        if let Some(outcome) = pump.session().outcome() {
            return outcome;
        }

        if spent == budget {
            debug!(budget, "Round-trip budget exhausted without a usable configure");
            return ProbeOutcome::BudgetExhausted;
        }
        spent += 1;
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for ProbeState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                if interface == wl_compositor::WlCompositor::interface().name {
                    if version < COMPOSITOR_VERSION {
                        debug!(version, "wl_compositor too old, ignoring");
                        return;
                    }
                    let compositor = registry.bind::<wl_compositor::WlCompositor, _, _>(
                        name,
                        COMPOSITOR_VERSION,
                        qh,
                        (),
                    );
                    state.chain.set_compositor(compositor);
                } else if interface == xdg_wm_base::XdgWmBase::interface().name {
                    if version < WM_BASE_VERSION {
                        debug!(version, "xdg_wm_base too old, ignoring");
                        return;
                    }
                    let wm_base =
                        registry.bind::<xdg_wm_base::XdgWmBase, _, _>(name, WM_BASE_VERSION, qh, ());
                    state.chain.set_wm_base(wm_base);
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                debug!(name, "Global removed");
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ProbeState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for ProbeState {
    fn event(
        _: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for ProbeState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                state
                    .session
                    .handle_toplevel_configure(width, height, state.scale.as_ref());
            }
            xdg_toplevel::Event::Close => state.session.handle_close(),
            _ => {}
        }
    }
}

delegate_noop!(ProbeState: wl_compositor::WlCompositor);
delegate_noop!(ProbeState: ignore wl_surface::WlSurface);
