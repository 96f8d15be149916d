//! Configuration data model

use std::time::Duration;

/// GSettings schema phosh stores its monitor layout under
pub const DEFAULT_SCALE_SCHEMA: &str = "sm.puri.phosh.monitors";

/// Key holding the per-output configuration dictionary
pub const DEFAULT_SCALE_KEY: &str = "config";

/// Output whose scale is applied to the measurement
pub const DEFAULT_OUTPUT: &str = "HWCOMPOSER-1";

/// Well-known name, object path and interface of the on-screen keyboard
pub const DEFAULT_OSK_NAME: &str = "sm.puri.OSK0";
pub const DEFAULT_OSK_PATH: &str = "/sm/puri/OSK0";
pub const DEFAULT_OSK_INTERFACE: &str = "sm.puri.OSK0";

/// Extra round-trips allowed after the first one following the commit
pub const DEFAULT_ROUNDTRIP_BUDGET: u32 = 10;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub scale: ScaleConfig,
    pub keyboard: KeyboardConfig,
    pub probe: ProbeConfig,
}

/// Where the output scale is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleConfig {
    /// Reverse-domain schema id
    pub schema: String,
    /// Key of the `a{sa{sv}}` monitor configuration value
    pub key: String,
    /// Output identifier looked up inside the configuration value
    pub output: String,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCALE_SCHEMA.to_string(),
            key: DEFAULT_SCALE_KEY.to_string(),
            output: DEFAULT_OUTPUT.to_string(),
        }
    }
}

/// On-screen keyboard service to hide before measuring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardConfig {
    /// Set to false to skip talking to the keyboard at all
    pub enabled: bool,
    pub bus_name: String,
    pub object_path: String,
    pub interface: String,
    /// Pause after the hide request so the compositor can re-layout
    pub settle_delay: Duration,
    /// Timeout applied to each D-Bus method call
    pub call_timeout: Duration,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bus_name: DEFAULT_OSK_NAME.to_string(),
            object_path: DEFAULT_OSK_PATH.to_string(),
            interface: DEFAULT_OSK_INTERFACE.to_string(),
            settle_delay: Duration::from_millis(100),
            call_timeout: Duration::from_millis(25_000),
        }
    }
}

/// Toplevel probe tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub roundtrip_budget: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            roundtrip_budget: DEFAULT_ROUNDTRIP_BUDGET,
        }
    }
}
