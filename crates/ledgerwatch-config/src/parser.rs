//! KDL configuration parser

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Where the configuration lives unless `--config` says otherwise
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/ledgerwatch/config.kdl";

/// Expand a leading `~` in a configuration path
pub fn expand_path(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}

/// Load the configuration named on the command line
///
/// A missing file at [`DEFAULT_CONFIG_PATH`] is not an error: every setting
/// has a default. A missing file anywhere else is.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let expanded = expand_path(path);
    if path == DEFAULT_CONFIG_PATH && !expanded.exists() {
        tracing::debug!(path = %expanded.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    parse_config(&expanded)
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
            "global" => {
                config.global = parse_global(node)?;
            }
            "connection" => {
                config.connection = parse_connection(node)?;
            }
            "monitor" => {
                config.monitor = parse_monitor(node)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

/// First argument of a node, which must be a string
fn string_arg<'a>(node: &'a kdl::KdlNode, field: &str) -> Result<&'a str, ConfigError> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| ConfigError::MissingValue {
            field: field.to_string(),
        })
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    let val = string_arg(child, "log-level")?;
                    global.log_level = val
                        .parse()
                        .map_err(|e| ConfigError::Invalid { message: e })?;
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_connection(node: &kdl::KdlNode) -> Result<ConnectionConfig, ConfigError> {
    let mut connection = ConnectionConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "url" => {
                    let url = string_arg(child, "url")?;
                    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                        return Err(ConfigError::Invalid {
                            message: format!(
                                "Connection url '{}' must use the ws:// or wss:// scheme",
                                url
                            ),
                        });
                    }
                    connection.url = url.to_string();
                }
                "receive-timeout-ms" => {
                    let millis = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_i64())
                        .ok_or_else(|| ConfigError::MissingValue {
                            field: "receive-timeout-ms".to_string(),
                        })?;
                    if millis <= 0 {
                        return Err(ConfigError::Invalid {
                            message: format!(
                                "receive-timeout-ms must be positive, got {}",
                                millis
                            ),
                        });
                    }
                    connection.receive_timeout = Duration::from_millis(millis as u64);
                }
                "command-field" => {
                    let val = string_arg(child, "command-field")?;
                    connection.command_field = val
                        .parse()
                        .map_err(|e| ConfigError::Invalid { message: e })?;
                }
                name => {
                    tracing::warn!("Unknown connection config option: {}", name);
                }
            }
        }
    }

    Ok(connection)
}

fn parse_monitor(node: &kdl::KdlNode) -> Result<MonitorConfig, ConfigError> {
    let mut monitor = MonitorConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "account" => {
                    let account = string_arg(child, "account")?.trim();
                    if account.is_empty() {
                        return Err(ConfigError::Invalid {
                            message: "Monitor account must not be empty".to_string(),
                        });
                    }
                    monitor.account = Some(account.to_string());
                }
                "ledger-stream" => {
                    monitor.ledger_stream = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_bool())
                        .ok_or_else(|| ConfigError::MissingValue {
                            field: "ledger-stream".to_string(),
                        })?;
                }
                name => {
                    tracing::warn!("Unknown monitor config option: {}", name);
                }
            }
        }
    }

    Ok(monitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.connection.url, DEFAULT_URL);
        assert_eq!(config.connection.receive_timeout, DEFAULT_RECEIVE_TIMEOUT);
        assert_eq!(config.connection.command_field, CommandField::Command);
        assert!(config.monitor.ledger_stream);
        assert!(config.monitor.account.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = r#"
            global {
                log-level "debug"
            }
            connection {
                url "ws://localhost:6006"
                receive-timeout-ms 50
                command-field "method"
            }
            monitor {
                account "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe"
                ledger-stream false
            }
        "#;

        let config = parse_config_str(config).unwrap();

        assert_eq!(config.global.log_level, LogLevel::Debug);
        assert_eq!(config.connection.url, "ws://localhost:6006");
        assert_eq!(config.connection.receive_timeout, Duration::from_millis(50));
        assert_eq!(config.connection.command_field, CommandField::Method);
        assert_eq!(
            config.monitor.account.as_deref(),
            Some("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe")
        );
        assert!(!config.monitor.ledger_stream);
    }

    #[test]
    fn test_http_url_rejected() {
        let config = r#"
            connection {
                url "https://s.altnet.rippletest.net:51234/"
            }
        "#;

        match parse_config_str(config) {
            Err(ConfigError::Invalid { message }) => {
                assert!(message.contains("ws://"), "unexpected message: {}", message);
            }
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = r#"
            connection {
                receive-timeout-ms 0
            }
        "#;

        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_timeout_must_be_integer() {
        let config = r#"
            connection {
                receive-timeout-ms "fast"
            }
        "#;

        match parse_config_str(config) {
            Err(ConfigError::MissingValue { field }) => assert_eq!(field, "receive-timeout-ms"),
            other => panic!("Expected MissingValue error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_field_rejected() {
        let config = r#"
            connection {
                command-field "verb"
            }
        "#;

        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = r#"
            global {
                log-level "loud"
            }
        "#;

        match parse_config_str(config) {
            Err(ConfigError::Invalid { message }) => assert!(message.contains("loud")),
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_blank_account_rejected() {
        let config = r#"
            monitor {
                account "   "
            }
        "#;

        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_account_without_value_reports_field() {
        let config = r#"
            monitor {
                account
            }
        "#;

        match parse_config_str(config) {
            Err(ConfigError::MissingValue { field }) => assert_eq!(field, "account"),
            other => panic!("Expected MissingValue error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            wallet {
                secret "nope"
            }
            connection {
                retries 5
            }
        "#;

        let config = parse_config_str(config).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_syntax_error_reports_parse_error() {
        let result = parse_config_str("connection {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_parse_config_from_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "monitor {\n    account \"rTestAccount\"\n}\n")
            .expect("Failed to write config");

        let config = parse_config(&path).unwrap();
        assert_eq!(config.monitor.account.as_deref(), Some("rTestAccount"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = parse_config(&dir.path().join("absent.kdl"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("absent.kdl");
        let result = load_config(path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_reads_explicit_path() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "connection {\n    command-field \"method\"\n}\n")
            .expect("Failed to write config");

        let config = load_config(path.to_str().unwrap()).expect("Failed to load config");
        assert_eq!(config.connection.command_field, CommandField::Method);
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/ledgerwatch.kdl");
        assert!(expanded.ends_with("ledgerwatch.kdl"));
        assert_eq!(expand_path("/etc/x.kdl"), PathBuf::from("/etc/x.kdl"));
    }
}
