//! Configuration data model

use std::time::Duration;

/// Public WebSocket endpoint of the ledger test network
pub const DEFAULT_URL: &str = "wss://s.altnet.rippletest.net:51233";

/// Default bound on a single receive poll
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(200);

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub global: GlobalConfig,
    pub connection: ConnectionConfig,
    pub monitor: MonitorConfig,
}

/// Global settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Name of the field that carries the command in an outgoing request
///
/// The WebSocket API expects `command`; JSON-RPC style servers and some
/// client libraries use `method` for the same thing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandField {
    #[default]
    Command,
    Method,
}

impl CommandField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Method => "method",
        }
    }
}

impl std::str::FromStr for CommandField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(Self::Command),
            "method" => Ok(Self::Method),
            _ => Err(format!(
                "Unknown command field: {} (expected \"command\" or \"method\")",
                s
            )),
        }
    }
}

/// Connection settings for the single WebSocket connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server URL (`ws://` or `wss://`)
    pub url: String,
    /// How long one receive poll may block before yielding nothing
    pub receive_timeout: Duration,
    pub command_field: CommandField,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            command_field: CommandField::default(),
        }
    }
}

/// What the monitor worker subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Classic address of the watched account, if any
    pub account: Option<String>,
    /// Subscribe to the ledger close stream
    pub ledger_stream: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            account: None,
            ledger_stream: true,
        }
    }
}
