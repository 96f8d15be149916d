//! KDL configuration parser

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "XDG_TOPLEVEL_GETINFO_CONFIG";

/// Configuration file used when `$XDG_TOPLEVEL_GETINFO_CONFIG` is unset
const DEFAULT_CONFIG_PATH: &str = "~/.config/xdg-toplevel-getinfo/config.kdl";

/// Resolve the configuration file location
///
/// `$XDG_TOPLEVEL_GETINFO_CONFIG` wins when set and non-empty. Tilde is
/// expanded in either case.
pub fn config_path() -> PathBuf {
    let raw = std::env::var(CONFIG_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    shellexpand::tilde(&raw).into_owned().into()
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    parse_config(path)
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl depends on an older miette, so rebuild the span by hand
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "scale" => parse_scale(node, &mut config.scale)?,
            "keyboard" => parse_keyboard(node, &mut config.keyboard)?,
            "probe" => parse_probe(node, &mut config.probe)?,
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_scale(node: &kdl::KdlNode, scale: &mut ScaleConfig) -> Result<(), ConfigError> {
    for child in child_nodes(node) {
        match child.name().value() {
            "schema" => scale.schema = string_value(child)?,
            "key" => scale.key = string_value(child)?,
            "output" => scale.output = string_value(child)?,
            name => {
                tracing::warn!("Unknown scale config option: {}", name);
            }
        }
    }

    Ok(())
}

fn parse_keyboard(node: &kdl::KdlNode, keyboard: &mut KeyboardConfig) -> Result<(), ConfigError> {
    for child in child_nodes(node) {
        match child.name().value() {
            "enabled" => keyboard.enabled = bool_value(child)?,
            "bus-name" => keyboard.bus_name = string_value(child)?,
            "object-path" => keyboard.object_path = string_value(child)?,
            "interface" => keyboard.interface = string_value(child)?,
            "settle-delay-ms" => {
                keyboard.settle_delay = Duration::from_millis(unsigned_value(child)?);
            }
            "call-timeout-ms" => {
                keyboard.call_timeout = Duration::from_millis(unsigned_value(child)?);
            }
            name => {
                tracing::warn!("Unknown keyboard config option: {}", name);
            }
        }
    }

    Ok(())
}

fn parse_probe(node: &kdl::KdlNode, probe: &mut ProbeConfig) -> Result<(), ConfigError> {
    for child in child_nodes(node) {
        match child.name().value() {
            "roundtrip-budget" => {
                let budget = unsigned_value(child)?;
                probe.roundtrip_budget =
                    u32::try_from(budget).map_err(|_| ConfigError::Invalid {
                        message: format!("roundtrip-budget {} is too large", budget),
                    })?;
            }
            name => {
                tracing::warn!("Unknown probe config option: {}", name);
            }
        }
    }

    Ok(())
}

fn child_nodes(node: &kdl::KdlNode) -> &[kdl::KdlNode] {
    node.children().map(|doc| doc.nodes()).unwrap_or(&[])
}

fn first_value<'a>(node: &'a kdl::KdlNode) -> Result<&'a kdl::KdlValue, ConfigError> {
    node.entries()
        .first()
        .map(|entry| entry.value())
        .ok_or_else(|| ConfigError::MissingValue {
            node: node.name().value().to_string(),
        })
}

fn string_value(node: &kdl::KdlNode) -> Result<String, ConfigError> {
    let name = node.name().value();
    let value = first_value(node)?
        .as_string()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects a string", name),
        })?;

    if value.is_empty() {
        return Err(ConfigError::Invalid {
            message: format!("`{}` must not be empty", name),
        });
    }

    Ok(value.to_string())
}

fn bool_value(node: &kdl::KdlNode) -> Result<bool, ConfigError> {
    first_value(node)?
        .as_bool()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects true or false", node.name().value()),
        })
}

fn unsigned_value(node: &kdl::KdlNode) -> Result<u64, ConfigError> {
    let name = node.name().value();
    let value = first_value(node)?
        .as_i64()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects an integer", name),
        })?;

    u64::try_from(value).map_err(|_| ConfigError::Invalid {
        message: format!("`{}` must not be negative, got {}", name, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Tests touching the process environment must not run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_empty_config_is_default() {
        let result = parse_config_str("").unwrap();
        assert_eq!(result, Config::default());
        assert_eq!(result.scale.output, "HWCOMPOSER-1");
        assert_eq!(result.probe.roundtrip_budget, 10);
        assert_eq!(result.keyboard.settle_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            scale {
                schema "org.example.monitors"
                key "layout"
                output "DSI-1"
            }

            keyboard {
                enabled false
                bus-name "org.example.OSK"
                object-path "/org/example/OSK"
                interface "org.example.OSK"
                settle-delay-ms 250
                call-timeout-ms 500
            }

            probe {
                roundtrip-budget 3
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.scale.schema, "org.example.monitors");
        assert_eq!(result.scale.key, "layout");
        assert_eq!(result.scale.output, "DSI-1");
        assert!(!result.keyboard.enabled);
        assert_eq!(result.keyboard.bus_name, "org.example.OSK");
        assert_eq!(result.keyboard.object_path, "/org/example/OSK");
        assert_eq!(result.keyboard.interface, "org.example.OSK");
        assert_eq!(result.keyboard.settle_delay, Duration::from_millis(250));
        assert_eq!(result.keyboard.call_timeout, Duration::from_millis(500));
        assert_eq!(result.probe.roundtrip_budget, 3);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = r#"
            scale {
                output "DSI-1"
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.scale.output, "DSI-1");
        assert_eq!(result.scale.schema, DEFAULT_SCALE_SCHEMA);
        assert_eq!(result.keyboard, KeyboardConfig::default());
        assert_eq!(result.probe, ProbeConfig::default());
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            theme "dark"
            probe {
                roundtrip-budget 4
                verbose true
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.probe.roundtrip_budget, 4);
    }

    #[test]
    fn test_negative_budget_rejected() {
        let config = r#"
            probe {
                roundtrip-budget -1
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::Invalid { message } => {
                assert!(message.contains("roundtrip-budget"));
                assert!(message.contains("-1"));
            }
            _ => panic!("Expected Invalid error, got: {:?}", err),
        }
    }

    #[test]
    fn test_oversized_budget_rejected() {
        let config = r#"
            probe {
                roundtrip-budget 99999999999
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_empty_output_rejected() {
        let config = r#"
            scale {
                output ""
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::Invalid { message } => assert!(message.contains("output")),
            _ => panic!("Expected Invalid error, got: {:?}", err),
        }
    }

    #[test]
    fn test_wrong_type_rejected() {
        let config = r#"
            keyboard {
                enabled "yes"
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_missing_value_rejected() {
        let config = r#"
            scale {
                schema
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::MissingValue { node } => assert_eq!(node, "schema"),
            _ => panic!("Expected MissingValue error, got: {:?}", err),
        }
    }

    #[test]
    fn test_malformed_kdl_reports_span() {
        let err = parse_config_str("scale {").unwrap_err();
        match err {
            ConfigError::ParseError { src, .. } => assert_eq!(src, "scale {"),
            _ => panic!("Expected ParseError, got: {:?}", err),
        }
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.kdl");

        let result = load_config(&path).unwrap();
        assert_eq!(result, Config::default());
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "probe {\n    roundtrip-budget 2\n}\n").unwrap();

        let result = load_config(&path).unwrap();
        assert_eq!(result.probe.roundtrip_budget, 2);
    }

    #[test]
    fn test_config_path_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let original = env::var(CONFIG_ENV).ok();

        env::set_var(CONFIG_ENV, "/tmp/getinfo-test.kdl");
        let path = config_path();

        if let Some(val) = original {
            env::set_var(CONFIG_ENV, val);
        } else {
            env::remove_var(CONFIG_ENV);
        }

        assert_eq!(path, PathBuf::from("/tmp/getinfo-test.kdl"));
    }

    #[test]
    fn test_config_path_default_is_under_config_dir() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let original = env::var(CONFIG_ENV).ok();

        env::remove_var(CONFIG_ENV);
        let path = config_path();

        if let Some(val) = original {
            env::set_var(CONFIG_ENV, val);
        }

        assert!(path.ends_with(".config/xdg-toplevel-getinfo/config.kdl"));
    }
}
