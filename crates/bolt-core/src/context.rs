// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-event authorization and enrichment state threaded through the
//! middleware chain and handed to every listener.

use bolt_error::BoltError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authorization and routing state derived for one inbound event.
///
/// Built by the authorization resolver (`bolt-auth`) before the middleware
/// chain runs, then enriched in place by built-in and user middleware (e.g.
/// the auto-`directMention` middleware reads `bot_user_id`). Fields that are
/// only sometimes present (because authorization can return a bot token, a
/// user token, or both; because enterprise installs carry an
/// `enterprise_id`; ...) are `Option` rather than defaulted, so a listener
/// that actually needs one must ask for it explicitly via
/// [`Context::require_bot_user_id`] or [`Context::require_function_execution_id`]
/// and get a named [`BoltError`] instead of silently operating on a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    /// Workspace the event belongs to.
    pub team_id: Option<String>,
    /// Enterprise Grid organization ID, present only for enterprise installs.
    pub enterprise_id: Option<String>,
    /// User who triggered the event, when applicable.
    pub user_id: Option<String>,
    /// Channel the event occurred in, when applicable.
    pub channel_id: Option<String>,
    /// `channel_type` as reported by the payload (`"im"` for DMs); used by
    /// the assistant/DM detection built-ins, which key strictly off
    /// `channel_type == "im"`.
    pub channel_type: Option<String>,
    /// App/bot identity as resolved by authorization.
    pub bot_id: Option<String>,
    /// Bot user ID, required by the auto-`directMention` middleware and by
    /// the auto-ignoreSelf middleware.
    pub bot_user_id: Option<String>,
    /// Bot token returned by authorization, if the app was installed with
    /// one.
    pub bot_token: Option<String>,
    /// User token returned by authorization, if the app was installed with
    /// one (token-per-user installs).
    pub user_token: Option<String>,
    /// Whether this event's installation is an Enterprise Grid org install.
    pub is_enterprise_install: bool,
    /// Function execution ID for a custom-function event; required by
    /// `complete`/`fail` argument helpers.
    pub function_execution_id: Option<String>,
    /// Free-form properties contributed by middleware, ordered
    /// deterministically for reproducible logging/snapshots.
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Context {
    /// Construct an empty context; authorization fills in the rest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `bot_user_id`, or a named [`BoltError::ContextMissingPropertyError`]
    /// if authorization never resolved one (e.g. a token-only install with no
    /// bot scope).
    pub fn require_bot_user_id(&self) -> Result<&str, BoltError> {
        self.bot_user_id
            .as_deref()
            .ok_or_else(|| BoltError::missing_context("bot_user_id"))
    }

    /// `function_execution_id`, or a named
    /// [`BoltError::ContextMissingPropertyError`] if this event isn't a
    /// custom-function invocation.
    pub fn require_function_execution_id(&self) -> Result<&str, BoltError> {
        self.function_execution_id
            .as_deref()
            .ok_or_else(|| BoltError::missing_context("function_execution_id"))
    }

    /// Whether `channel_type == "im"` — the sole criterion for DM/assistant
    /// detection.
    #[must_use]
    pub fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }

    /// The token a listener should use to call back out: bot token if one
    /// was resolved, otherwise the user token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.bot_token.as_deref().or(self.user_token.as_deref())
    }

    /// Attach a custom property, overwriting any existing value for `key`.
    pub fn set_custom(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.custom.insert(key.into(), v);
        }
    }
}
