// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML application configuration.
//!
//! Loading is split into three steps an app bootstrap (`bolt-cli`, or any
//! embedder) composes itself: [`load_config`]/[`parse_toml`] produce an
//! [`AppConfig`] with file defaults, [`apply_env_overrides`] layers
//! environment variables on top, and [`AppConfig::finalize`] enforces the one
//! invariant this crate cares about beyond shape — a bot token and a custom
//! authorize resolver are mutually exclusive, never both and never neither.
//! That check is deferred to `finalize` rather than folded into
//! deserialization because the caller may still be about to call
//! `use_custom_authorize()` in code after loading the file.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use bolt_error::BoltError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
const LARGE_TIMEOUT_THRESHOLD_MS: u64 = 10_000;

/// Failure to load or shape-validate a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured path doesn't exist.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: String,
    },

    /// The file exists but isn't valid TOML, or doesn't match [`AppConfig`]'s
    /// shape.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Underlying parser message.
        reason: String,
    },

    /// The file parsed but failed one or more field-level checks.
    #[error("config validation failed: {}", .reasons.join("; "))]
    ValidationError {
        /// One message per violated check.
        reasons: Vec<String>,
    },
}

/// A non-fatal configuration observation surfaced to the caller for logging,
/// never blocking startup on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// An optional field was left unset.
    MissingOptionalField {
        /// Field name.
        field: String,
        /// What leaving it unset means in practice.
        hint: String,
    },
    /// A configured timeout is unusually large.
    LargeTimeout {
        /// Which timeout.
        field: String,
        /// The configured value, in milliseconds.
        ms: u64,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOptionalField { field, hint } => {
                write!(f, "`{field}` is not set: {hint}")
            }
            Self::LargeTimeout { field, ms } => {
                write!(f, "`{field}` is set to {ms}ms, which is unusually large")
            }
        }
    }
}

/// Top-level application configuration, loaded from TOML and optionally
/// overridden by environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AppConfig {
    /// Bot token (`xoxb-...`). Mutually exclusive with a custom authorize
    /// resolver — see [`AppConfig::finalize`].
    #[serde(default)]
    pub bot_token: Option<String>,
    /// HMAC signing secret used by the HTTP receiver to verify request
    /// authenticity.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// App-level token (`xapp-...`), required only for a Socket Mode
    /// receiver.
    #[serde(default)]
    pub app_token: Option<String>,
    /// Whether the embedder supplies its own [`bolt_auth::Authorize`]
    /// resolver rather than a static `bot_token`. Not itself part of the
    /// file's TOML shape in the common case, but settable by embedders
    /// before calling [`AppConfig::finalize`].
    #[serde(default)]
    pub use_custom_authorize: bool,
    /// Log level passed through to the `tracing` subscriber the embedder
    /// configures. Defaults to `"info"`.
    #[serde(default = "default_log_level")]
    pub log_level: Option<String>,
    /// Port the reference HTTP receiver binds to. Defaults to `3000`.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Signature timestamp tolerance window, in milliseconds, enforced by
    /// the HTTP receiver. Defaults to `300_000` (five minutes).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_log_level() -> Option<String> {
    Some("info".to_string())
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout_ms() -> u64 {
    300_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            signing_secret: None,
            app_token: None,
            use_custom_authorize: false,
            log_level: default_log_level(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Enforce the token-XOR-authorize invariant and return `self`
    /// unchanged if it holds.
    ///
    /// Exactly one of `bot_token` or `use_custom_authorize` must be set:
    /// neither means the app has no way to act, and both means two
    /// conflicting sources of truth for credentials.
    pub fn finalize(self) -> Result<Self, BoltError> {
        match (self.bot_token.is_some(), self.use_custom_authorize) {
            (true, true) => Err(BoltError::app_init(
                "`bot_token` and a custom authorize resolver are mutually exclusive; configure exactly one",
            )),
            (false, false) => Err(BoltError::app_init(
                "no credential source configured: set `bot_token` or supply a custom authorize resolver",
            )),
            _ => Ok(self),
        }
    }
}

/// Parse an [`AppConfig`] from a TOML string.
pub fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

/// Load an [`AppConfig`] from `path`, or the defaults if `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    parse_toml(&content)
}

/// Layer `BOLT_*` environment variables on top of an already-loaded config.
/// Values present in the environment always win over the file.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = std::env::var("BOLT_BOT_TOKEN") {
        config.bot_token = Some(v);
    }
    if let Ok(v) = std::env::var("BOLT_SIGNING_SECRET") {
        config.signing_secret = Some(v);
    }
    if let Ok(v) = std::env::var("BOLT_APP_TOKEN") {
        config.app_token = Some(v);
    }
    if let Ok(v) = std::env::var("BOLT_LOG_LEVEL") {
        config.log_level = Some(v);
    }
    if let Ok(v) = std::env::var("BOLT_PORT") {
        if let Ok(port) = v.parse() {
            config.port = port;
        }
    }
}

/// Field-level shape checks that don't belong in [`AppConfig::finalize`]
/// (which only enforces the token/authorize invariant). Returns soft
/// [`ConfigWarning`]s for anything worth logging, and a hard
/// [`ConfigError::ValidationError`] for anything that can't be started with.
pub fn validate_config(config: &AppConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    if let Some(level) = &config.log_level {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            reasons.push(format!(
                "`log_level` must be one of {VALID_LOG_LEVELS:?}, got {level:?}"
            ));
        }
    } else {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "log_level".to_string(),
            hint: "defaulting to `info`".to_string(),
        });
    }

    if config.signing_secret.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "signing_secret".to_string(),
            hint: "the HTTP receiver cannot verify request authenticity without one".to_string(),
        });
    }

    if config.request_timeout_ms == 0 || config.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
        reasons.push(format!(
            "`request_timeout_ms` must be in 1..={MAX_REQUEST_TIMEOUT_MS}, got {}",
            config.request_timeout_ms
        ));
    } else if config.request_timeout_ms > LARGE_TIMEOUT_THRESHOLD_MS {
        warnings.push(ConfigWarning::LargeTimeout {
            field: "request_timeout_ms".to_string(),
            ms: config.request_timeout_ms,
        });
    }

    if !reasons.is_empty() {
        return Err(ConfigError::ValidationError { reasons });
    }
    Ok(warnings)
}

/// Merge two configs: every scalar field set in `overlay` wins over `base`;
/// unset overlay fields fall back to `base`. Used to layer CLI flags on top
/// of a file-loaded config.
#[must_use]
pub fn merge_configs(base: AppConfig, overlay: AppConfig) -> AppConfig {
    AppConfig {
        bot_token: overlay.bot_token.or(base.bot_token),
        signing_secret: overlay.signing_secret.or(base.signing_secret),
        app_token: overlay.app_token.or(base.app_token),
        use_custom_authorize: overlay.use_custom_authorize || base.use_custom_authorize,
        log_level: overlay.log_level.or(base.log_level),
        port: if overlay.port == default_port() {
            base.port
        } else {
            overlay.port
        },
        request_timeout_ms: if overlay.request_timeout_ms == default_request_timeout_ms() {
            base.request_timeout_ms
        } else {
            overlay.request_timeout_ms
        },
    }
}
