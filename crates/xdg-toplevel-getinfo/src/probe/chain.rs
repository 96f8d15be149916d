//! Ownership chain of the probe's protocol objects
//!
//! Each object is created from its predecessor and must be destroyed
//! before it:
//!
//! ```text
//! registry -> { wl_compositor, xdg_wm_base } -> wl_surface -> xdg_surface -> xdg_toplevel
//! ```
//!
//! [`ObjectChain`] keeps one optional slot per [`Link`] and walks the
//! slots top-down on teardown, skipping empty ones.

use tracing::debug;
use wayland_client::protocol::{wl_compositor, wl_registry, wl_surface};
use wayland_client::{Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use super::client::ProbeState;
use super::ProbeError;

/// Version `wl_compositor` is bound at
pub const COMPOSITOR_VERSION: u32 = 4;

/// Version `xdg_wm_base` is bound at
pub const WM_BASE_VERSION: u32 = 1;

/// One slot of the chain, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Link {
    Registry,
    Compositor,
    WmBase,
    Surface,
    XdgSurface,
    Toplevel,
}

impl Link {
    /// The order objects are destroyed in
    pub const TEARDOWN: [Link; 6] = [
        Link::Toplevel,
        Link::XdgSurface,
        Link::Surface,
        Link::WmBase,
        Link::Compositor,
        Link::Registry,
    ];

    /// Slots that must be filled before this one can be created
    pub fn requires(self) -> &'static [Link] {
        match self {
            Link::Registry => &[],
            Link::Compositor | Link::WmBase => &[Link::Registry],
            Link::Surface => &[Link::Compositor, Link::WmBase],
            Link::XdgSurface => &[Link::Surface, Link::WmBase],
            Link::Toplevel => &[Link::XdgSurface],
        }
    }

    pub fn interface(self) -> &'static str {
        match self {
            Link::Registry => wl_registry::WlRegistry::interface().name,
            Link::Compositor => wl_compositor::WlCompositor::interface().name,
            Link::WmBase => xdg_wm_base::XdgWmBase::interface().name,
            Link::Surface => wl_surface::WlSurface::interface().name,
            Link::XdgSurface => xdg_surface::XdgSurface::interface().name,
            Link::Toplevel => xdg_toplevel::XdgToplevel::interface().name,
        }
    }
}

/// First prerequisite of `link` that `present` reports missing
pub fn missing_prerequisite(link: Link, present: impl Fn(Link) -> bool) -> Option<Link> {
    link.requires().iter().copied().find(|required| !present(*required))
}

#[derive(Debug, Default)]
pub struct ObjectChain {
    registry: Option<wl_registry::WlRegistry>,
    compositor: Option<wl_compositor::WlCompositor>,
    wm_base: Option<xdg_wm_base::XdgWmBase>,
    surface: Option<wl_surface::WlSurface>,
    xdg_surface: Option<xdg_surface::XdgSurface>,
    toplevel: Option<xdg_toplevel::XdgToplevel>,
}

impl ObjectChain {
    pub fn contains(&self, link: Link) -> bool {
        match link {
            Link::Registry => self.registry.is_some(),
            Link::Compositor => self.compositor.is_some(),
            Link::WmBase => self.wm_base.is_some(),
            Link::Surface => self.surface.is_some(),
            Link::XdgSurface => self.xdg_surface.is_some(),
            Link::Toplevel => self.toplevel.is_some(),
        }
    }

    pub fn set_registry(&mut self, registry: wl_registry::WlRegistry) {
        self.registry = Some(registry);
    }

    pub fn set_compositor(&mut self, compositor: wl_compositor::WlCompositor) {
        if self.compositor.is_none() {
            self.compositor = Some(compositor);
        }
    }

    pub fn set_wm_base(&mut self, wm_base: xdg_wm_base::XdgWmBase) {
        if self.wm_base.is_none() {
            self.wm_base = Some(wm_base);
        }
    }

    /// Fail with the first capability the compositor did not provide
    pub fn require_capabilities(&self) -> Result<(), ProbeError> {
        for (link, version) in [
            (Link::Compositor, COMPOSITOR_VERSION),
            (Link::WmBase, WM_BASE_VERSION),
        ] {
            if !self.contains(link) {
                return Err(ProbeError::MissingCapability {
                    interface: link.interface(),
                    version,
                });
            }
        }

        Ok(())
    }

    /// Create surface, xdg_surface and toplevel, then commit the surface
    pub fn create_toplevel(&mut self, qh: &QueueHandle<ProbeState>) -> Result<(), ProbeError> {
        self.ensure_ready(Link::Surface)?;
        let (Some(compositor), Some(wm_base)) = (self.compositor.clone(), self.wm_base.clone())
        else {
            return Err(ProbeError::ObjectCreation {
                object: Link::Surface.interface(),
            });
        };

        let surface = alive(compositor.create_surface(qh, ()), Link::Surface)?;
        self.surface = Some(surface.clone());

        self.ensure_ready(Link::XdgSurface)?;
        let xdg_surface = alive(wm_base.get_xdg_surface(&surface, qh, ()), Link::XdgSurface)?;
        self.xdg_surface = Some(xdg_surface.clone());

        self.ensure_ready(Link::Toplevel)?;
        let toplevel = alive(xdg_surface.get_toplevel(qh, ()), Link::Toplevel)?;
        self.toplevel = Some(toplevel);

        surface.commit();

        Ok(())
    }

    /// Fail if a predecessor of `link` is not held
    fn ensure_ready(&self, link: Link) -> Result<(), ProbeError> {
        match missing_prerequisite(link, |l| self.contains(l)) {
            None => Ok(()),
            Some(missing) => {
                debug!(object = link.interface(), missing = missing.interface(), "Missing predecessor");
                Err(ProbeError::ObjectCreation {
                    object: link.interface(),
                })
            }
        }
    }

    /// Destroy every held object, newest first
    pub fn teardown(&mut self) {
        for link in Link::TEARDOWN {
            self.release(link);
        }
    }

    fn release(&mut self, link: Link) {
        if !self.contains(link) {
            return;
        }

        match link {
            Link::Toplevel => self.toplevel.take().into_iter().for_each(|t| t.destroy()),
            Link::XdgSurface => self.xdg_surface.take().into_iter().for_each(|x| x.destroy()),
            Link::Surface => self.surface.take().into_iter().for_each(|s| s.destroy()),
            Link::WmBase => self.wm_base.take().into_iter().for_each(|w| w.destroy()),
            // no destructor request in the protocol, dropping the proxy is enough
            Link::Compositor => self.compositor = None,
            Link::Registry => self.registry = None,
        }
        debug!(object = link.interface(), "Released");
    }
}

fn alive<P: Proxy>(proxy: P, link: Link) -> Result<P, ProbeError> {
    if proxy.is_alive() {
        Ok(proxy)
    } else {
        Err(ProbeError::ObjectCreation {
            object: link.interface(),
        })
    }
}
