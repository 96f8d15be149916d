//! On-screen keyboard silencing
//!
//! A visible on-screen keyboard shrinks the area the compositor offers new
//! toplevels, the same way it does on Android, so it is hidden before the
//! probe runs. Nothing here is fatal: every failure is logged and the probe
//! goes ahead with a possibly smaller size.

use std::thread;
use std::time::Duration;

use dbus::blocking::stdintf::org_freedesktop_dbus::Properties;
use dbus::blocking::Connection;
use dbus::strings::{BusName, Interface, Path};
use thiserror::Error;
use tracing::{debug, warn};

use xdg_toplevel_getinfo_config::KeyboardConfig;

/// Errors talking to the on-screen keyboard, never propagated past this module
#[derive(Debug, Error)]
pub enum KeyboardError {
    #[error("Error connecting to session bus: {0}")]
    Bus(#[source] dbus::Error),

    #[error("Invalid keyboard address: {0}")]
    Address(String),

    #[error("Error getting keyboard visibility: {0}")]
    GetVisible(#[source] dbus::Error),

    #[error("Error setting keyboard visibility: {0}")]
    SetVisible(#[source] dbus::Error),
}

/// The visibility controls of an on-screen keyboard
#[cfg_attr(test, mockall::automock)]
pub trait OskService {
    fn is_visible(&self) -> Result<bool, KeyboardError>;

    fn set_visible(&self, visible: bool) -> Result<(), KeyboardError>;
}

/// What happened to the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Silenced {
    AlreadyHidden,
    Hidden,
    HideFailed,
    /// Visibility could not be read, nothing was changed
    Unknown,
}

/// squeekboard (or any `sm.puri.OSK0` implementation) on the session bus
pub struct DbusOsk {
    connection: Connection,
    bus_name: BusName<'static>,
    path: Path<'static>,
    interface: Interface<'static>,
    timeout: Duration,
}

impl DbusOsk {
    pub fn connect(config: &KeyboardConfig) -> Result<Self, KeyboardError> {
        let bus_name = BusName::new(config.bus_name.clone()).map_err(KeyboardError::Address)?;
        let path = Path::new(config.object_path.clone()).map_err(KeyboardError::Address)?;
        let interface =
            Interface::new(config.interface.clone()).map_err(KeyboardError::Address)?;
        let connection = Connection::new_session().map_err(KeyboardError::Bus)?;

        Ok(Self {
            connection,
            bus_name,
            path,
            interface,
            timeout: config.call_timeout,
        })
    }

    fn proxy(&self) -> dbus::blocking::Proxy<'_, &Connection> {
        self.connection
            .with_proxy(self.bus_name.clone(), self.path.clone(), self.timeout)
    }
}

impl OskService for DbusOsk {
    fn is_visible(&self) -> Result<bool, KeyboardError> {
        self.proxy()
            .get::<bool>(&self.interface, "Visible")
            .map_err(KeyboardError::GetVisible)
    }

    fn set_visible(&self, visible: bool) -> Result<(), KeyboardError> {
        self.proxy()
            .method_call::<(), _, _, _>(self.interface.clone(), "SetVisible", (visible,))
            .map_err(KeyboardError::SetVisible)
    }
}

/// Hide the configured on-screen keyboard, ignoring every failure
pub fn ensure_hidden(config: &KeyboardConfig) -> Silenced {
    match DbusOsk::connect(config) {
        Ok(service) => hide(&service, config.settle_delay),
        Err(e) => {
            debug!("{}", e);
            Silenced::Unknown
        }
    }
}

/// Hide `service` if it is visible, then give the compositor time to re-layout
pub fn hide(service: &dyn OskService, settle_delay: Duration) -> Silenced {
    let visible = match service.is_visible() {
        Ok(visible) => visible,
        Err(e) => {
            debug!("{}", e);
            return Silenced::Unknown;
        }
    };

    let silenced = if visible {
        debug!("Keyboard is visible. Setting to hidden");
        match service.set_visible(false) {
            Ok(()) => {
                debug!("Keyboard hidden successfully");
                Silenced::Hidden
            }
            Err(e) => {
                warn!("{}", e);
                Silenced::HideFailed
            }
        }
    } else {
        debug!("Keyboard is already hidden");
        Silenced::AlreadyHidden
    };

    thread::sleep(settle_delay);
    silenced
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn bus_error() -> dbus::Error {
        dbus::Error::new_custom(
            "org.freedesktop.DBus.Error.ServiceUnknown",
            "The name sm.puri.OSK0 was not provided by any .service files",
        )
    }

    #[test]
    fn test_visible_keyboard_is_hidden() {
        let mut osk = MockOskService::new();
        osk.expect_is_visible().times(1).returning(|| Ok(true));
        osk.expect_set_visible()
            .with(eq(false))
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(hide(&osk, Duration::ZERO), Silenced::Hidden);
    }

    #[test]
    fn test_hidden_keyboard_is_left_alone() {
        let mut osk = MockOskService::new();
        osk.expect_is_visible().times(1).returning(|| Ok(false));
        osk.expect_set_visible().never();

        assert_eq!(hide(&osk, Duration::ZERO), Silenced::AlreadyHidden);
    }

    #[test]
    fn test_unreadable_visibility_changes_nothing() {
        let mut osk = MockOskService::new();
        osk.expect_is_visible()
            .times(1)
            .returning(|| Err(KeyboardError::GetVisible(bus_error())));
        osk.expect_set_visible().never();

        assert_eq!(hide(&osk, Duration::ZERO), Silenced::Unknown);
    }

    #[test]
    fn test_failed_hide_is_swallowed() {
        let mut osk = MockOskService::new();
        osk.expect_is_visible().returning(|| Ok(true));
        osk.expect_set_visible()
            .returning(|_| Err(KeyboardError::SetVisible(bus_error())));

        assert_eq!(hide(&osk, Duration::ZERO), Silenced::HideFailed);
    }

    #[test]
    fn test_settle_delay_applied_after_hide() {
        let mut osk = MockOskService::new();
        osk.expect_is_visible().returning(|| Ok(true));
        osk.expect_set_visible().returning(|_| Ok(()));

        let started = std::time::Instant::now();
        hide(&osk, Duration::from_millis(20));

        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_invalid_address_is_rejected_before_connecting() {
        let config = KeyboardConfig {
            object_path: "not a path".to_string(),
            ..KeyboardConfig::default()
        };

        match DbusOsk::connect(&config) {
            Err(KeyboardError::Address(_)) => {}
            Err(other) => panic!("Expected Address error, got: {:?}", other),
            Ok(_) => panic!("Expected Address error, got a connection"),
        }
    }

    #[test]
    fn test_error_messages_name_the_step() {
        let err = KeyboardError::GetVisible(bus_error());
        assert!(err.to_string().starts_with("Error getting keyboard visibility"));

        let err = KeyboardError::SetVisible(bus_error());
        assert!(err.to_string().starts_with("Error setting keyboard visibility"));
    }
}
