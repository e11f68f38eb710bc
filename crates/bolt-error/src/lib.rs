// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error taxonomy for the Slack Bolt core.
//!
//! Every error the core can raise is one of the named [`BoltError`] variants.
//! Each variant carries a stable [`ErrorCode`] (via [`BoltError::code`]), a
//! human-readable message, and — where one exists — a boxed cause accessible
//! through the standard [`std::error::Error::source`] chain. Arbitrary
//! structured context can be attached via [`ErrorContext`] for diagnostics
//! without changing the variant shape.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCode / ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// App construction / registration problems.
    Initialization,
    /// Authorization resolution failures.
    Authorization,
    /// A handler required context that wasn't present for this payload.
    Context,
    /// Receiver-level transport/authenticity problems.
    Receiver,
    /// Payload classification failures.
    Parse,
    /// Catch-all for non-coded errors.
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialization => "initialization",
            Self::Authorization => "authorization",
            Self::Context => "context",
            Self::Receiver => "receiver",
            Self::Parse => "parse",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Machine-readable, stable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad app configuration (missing signing secret, token XOR authorize violated, ...).
    AppInitialization,
    /// The authorization resolver failed or returned no credentials.
    Authorization,
    /// A handler required a context field absent in this payload.
    ContextMissingProperty,
    /// Signature/timestamp verification failed.
    ReceiverAuthenticity,
    /// A second `ack` invocation was observed for one event.
    ReceiverMultipleAck,
    /// The HTTP receiver could not route the inbound request.
    HttpReceiverDeferredRequest,
    /// The raw body could not be classified into a known payload shape.
    Parse,
    /// Wrapper for a non-coded error (including recovered panics).
    Unknown,
}

impl ErrorCode {
    /// Broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AppInitialization => ErrorCategory::Initialization,
            Self::Authorization => ErrorCategory::Authorization,
            Self::ContextMissingProperty => ErrorCategory::Context,
            Self::ReceiverAuthenticity
            | Self::ReceiverMultipleAck
            | Self::HttpReceiverDeferredRequest => ErrorCategory::Receiver,
            Self::Parse => ErrorCategory::Parse,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }

    /// Stable `&'static str` representation (e.g. `"AUTHORIZATION"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppInitialization => "APP_INITIALIZATION",
            Self::Authorization => "AUTHORIZATION",
            Self::ContextMissingProperty => "CONTEXT_MISSING_PROPERTY",
            Self::ReceiverAuthenticity => "RECEIVER_AUTHENTICITY",
            Self::ReceiverMultipleAck => "RECEIVER_MULTIPLE_ACK",
            Self::HttpReceiverDeferredRequest => "HTTP_RECEIVER_DEFERRED_REQUEST",
            Self::Parse => "PARSE_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BoltError
// ---------------------------------------------------------------------------

/// The unified error type raised anywhere in the Bolt core.
///
/// Named variants follow the error taxonomy exactly; `source` on each
/// variant preserves the original cause rather than swallowing it.
#[derive(Debug, thiserror::Error)]
pub enum BoltError {
    /// Bad configuration: missing signing secret, `token` XOR `authorize`
    /// violated, an invalid registration (e.g. a dotted compound event name).
    #[error("app initialization failed: {message}")]
    AppInitializationError {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The authorization resolver failed or returned no credentials.
    #[error("authorization failed: {message}")]
    AuthorizationError {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A handler required a context field absent for this payload (e.g.
    /// `bot_user_id` for `directMention`, `function_execution_id` for
    /// `complete`/`fail`).
    #[error("context is missing required property `{property}`")]
    ContextMissingPropertyError {
        /// Name of the missing property.
        property: String,
    },

    /// Signature or timestamp verification failed for an inbound request.
    #[error("receiver authenticity check failed: {message}")]
    ReceiverAuthenticityError {
        /// Human-readable description.
        message: String,
    },

    /// A second `ack` invocation was observed for the same event.
    #[error("ack was already called for this event")]
    ReceiverMultipleAckError,

    /// The HTTP receiver could not route the inbound request to a handler.
    #[error("http receiver could not handle the request: {message}")]
    HttpReceiverDeferredRequestError {
        /// Human-readable description.
        message: String,
    },

    /// The raw body could not be classified into a known payload shape.
    #[error("failed to parse request body: {message}")]
    ParseError {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Wrapper for a non-coded error, including a recovered panic.
    #[error("unknown error: {message}")]
    UnknownError {
        /// Human-readable description.
        message: String,
        /// The original error, preserved for inspection.
        #[source]
        original: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BoltError {
    /// Stable [`ErrorCode`] for this variant.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AppInitializationError { .. } => ErrorCode::AppInitialization,
            Self::AuthorizationError { .. } => ErrorCode::Authorization,
            Self::ContextMissingPropertyError { .. } => ErrorCode::ContextMissingProperty,
            Self::ReceiverAuthenticityError { .. } => ErrorCode::ReceiverAuthenticity,
            Self::ReceiverMultipleAckError => ErrorCode::ReceiverMultipleAck,
            Self::HttpReceiverDeferredRequestError { .. } => {
                ErrorCode::HttpReceiverDeferredRequest
            }
            Self::ParseError { .. } => ErrorCode::Parse,
            Self::UnknownError { .. } => ErrorCode::Unknown,
        }
    }

    /// Shorthand for `self.code().category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    /// Construct a [`BoltError::AppInitializationError`] with no cause.
    #[must_use]
    pub fn app_init(message: impl Into<String>) -> Self {
        Self::AppInitializationError {
            message: message.into(),
            source: None,
        }
    }

    /// Construct a [`BoltError::AppInitializationError`] wrapping a cause.
    #[must_use]
    pub fn app_init_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AppInitializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Construct a [`BoltError::AuthorizationError`] with no cause.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::AuthorizationError {
            message: message.into(),
            source: None,
        }
    }

    /// Construct a [`BoltError::AuthorizationError`] wrapping a cause.
    #[must_use]
    pub fn authorization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AuthorizationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Construct a [`BoltError::ContextMissingPropertyError`].
    #[must_use]
    pub fn missing_context(property: impl Into<String>) -> Self {
        Self::ContextMissingPropertyError {
            property: property.into(),
        }
    }

    /// Construct a [`BoltError::ParseError`] with no cause.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            source: None,
        }
    }

    /// Construct a [`BoltError::ParseError`] wrapping a cause.
    #[must_use]
    pub fn parse_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ParseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap an arbitrary error as [`BoltError::UnknownError`].
    #[must_use]
    pub fn unknown(original: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = original.to_string();
        Self::UnknownError {
            message,
            original: Box::new(original),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured context (attached alongside a BoltError, not part of the enum
// itself, to keep `#[source]` plumbing simple).
// ---------------------------------------------------------------------------

/// Arbitrary structured context describing the circumstances of a
/// [`BoltError`], keyed by name, for logging and diagnostics.
///
/// ```
/// use bolt_error::ErrorContext;
///
/// let ctx = ErrorContext::new()
///     .with("team_id", "T1")
///     .with("retry_num", 2);
/// assert_eq!(ctx.get("team_id"), Some(&serde_json::json!("T1")));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorContext {
    fields: BTreeMap<String, serde_json::Value>,
}

impl ErrorContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a key-value pair. Values that fail to serialize are skipped.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Look up a previously attached value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Whether any context has been attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
