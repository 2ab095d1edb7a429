//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use rivalwatch_config::ConfigError;
use rivalwatch_core::CoreError;

/// Exit codes for process termination.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to the event stream")]
    #[diagnostic(
        code(rivalwatch::connection_failed),
        help(
            "Check that the endpoint is reachable and the project id is correct.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Connection attempt timed out")]
    #[diagnostic(
        code(rivalwatch::timeout),
        help("Increase the timeout with --timeout or check endpoint responsiveness.")
    )]
    Timeout,

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(rivalwatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: rivalwatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No stream endpoint configured")]
    #[diagnostic(
        code(rivalwatch::no_config),
        help(
            "Pass --endpoint and --project, or create a config file with: rivalwatch config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Config file already exists")]
    #[diagnostic(
        code(rivalwatch::config_exists),
        help("Use --force to overwrite it.\nPath: {path}")
    )]
    ConfigExists { path: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rivalwatch::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize config: {0}")]
    #[diagnostic(code(rivalwatch::toml))]
    Toml(#[from] toml::ser::Error),

    #[error(transparent)]
    #[diagnostic(code(rivalwatch::config))]
    Config(Box<figment::Error>),

    #[error("internal error: {0}")]
    #[diagnostic(code(rivalwatch::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError / ConfigError → CliError mapping ───────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ChannelFailed { reason } => Self::ConnectionFailed { reason },

            CoreError::Timeout => Self::Timeout,

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },

            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },

            ConfigError::Serialization(e) => Self::Toml(e),
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}
