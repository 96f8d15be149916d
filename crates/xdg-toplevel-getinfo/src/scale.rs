//! Output scale lookup
//!
//! Phosh persists its monitor layout in GSettings as an `a{sa{sv}}`
//! dictionary keyed by output name. The compositor could report the scale
//! over `org.gnome.Mutter.DisplayConfig` or wlr-output-management, but the
//! former is a deeply nested variant and the latter only works while the
//! screen is on, so the stored setting is read instead.

use gio::prelude::*;
use glib::translate::{from_glib_full, ToGlibPtr};
use glib::Variant;
use tracing::debug;

use xdg_toplevel_getinfo_config::ScaleConfig;

/// Source of the factor converting logical compositor units to pixels
#[cfg_attr(test, mockall::automock)]
pub trait ScaleSource {
    /// The scale factor, or `None` when it cannot be determined
    fn scale(&self) -> Option<f64>;
}

/// Reads the scale phosh stored for one output
#[derive(Debug, Clone)]
pub struct GSettingsScale {
    config: ScaleConfig,
}

impl GSettingsScale {
    pub fn new(config: ScaleConfig) -> Self {
        Self { config }
    }

    fn stored_config(&self) -> Option<Variant> {
        let Some(source) = gio::SettingsSchemaSource::default() else {
            debug!("No GSettings schema source installed");
            return None;
        };

        // Settings::new aborts on an unknown schema, so look it up first
        let Some(schema) = source.lookup(&self.config.schema, true) else {
            debug!("Could not get {} settings", self.config.schema);
            return None;
        };

        if schema.path().is_none() {
            debug!("Schema {} is relocatable, no fixed path to read", self.config.schema);
            return None;
        }

        if !schema.has_key(&self.config.key) {
            debug!("Could not get {} value", self.config.key);
            return None;
        }

        let settings = gio::Settings::new_full(&schema, None::<&gio::SettingsBackend>, None);
        Some(settings.value(&self.config.key))
    }
}

impl ScaleSource for GSettingsScale {
    fn scale(&self) -> Option<f64> {
        let config = self.stored_config()?;
        let raw = scale_for_output(&config, &self.config.output)?;
        round_up_scale(raw)
    }
}

/// Look up `config[output]["scale"]` as a double
pub fn scale_for_output(config: &Variant, output: &str) -> Option<f64> {
    let Some(monitor) = lookup(config, output) else {
        debug!("Could not find {}", output);
        return None;
    };

    let Some(scale) = lookup(&monitor, "scale") else {
        debug!("Could not find scale value");
        return None;
    };

    let value = scale.get::<f64>();
    if let Some(value) = value {
        debug!("Found scale (direct): {}", value);
    } else {
        debug!("Scale of {} is {}, not a double", output, scale.type_());
    }
    value
}

/// Round fractional scales up to the next integer
///
/// Under-scaling a splash image is worse than making it slightly too big.
/// Negative and non-finite values are treated as unavailable.
pub fn round_up_scale(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw < 0.0 {
        debug!("Ignoring unusable scale {}", raw);
        return None;
    }

    if raw.fract() != 0.0 {
        let rounded = raw.ceil();
        debug!("Rounded up to: {}", rounded);
        return Some(rounded);
    }

    Some(raw)
}

fn lookup(dict: &Variant, key: &str) -> Option<Variant> {
    // g_variant_lookup_value is only defined for string-keyed dictionaries
    if !dict.type_().as_str().starts_with("a{s") {
        debug!("Expected a string-keyed dictionary, got {}", dict.type_());
        return None;
    }
    unsafe {
        from_glib_full(glib::ffi::g_variant_lookup_value(
            dict.to_glib_none().0,
            key.to_glib_none().0,
            std::ptr::null(),
        ))
    }
}
