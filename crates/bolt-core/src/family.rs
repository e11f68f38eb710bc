// SPDX-License-Identifier: MIT OR Apache-2.0
//! Top-level payload family classification.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an inbound payload.
///
/// `CustomFunctionExecuted` and `AssistantThread` are derived refinements of
/// `Event` (an `Event` whose `event.type` matches a recognized subtype); they
/// are still surfaced as distinct `Family` values so the router can give them
/// their own auto-ack defaults without every `Event` listener having to
/// special-case them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// `event_callback` envelope.
    Event,
    /// Slash command (`command` field present).
    Command,
    /// `block_actions` / `interactive_message` / `attachment_action` / `dialog_submission`.
    Action,
    /// `shortcut` (global) or `message_action` (message-scoped).
    Shortcut,
    /// `view_submission` / `view_closed`.
    ViewAction,
    /// `block_suggestion`, or any payload carrying a top-level `name` field.
    Options,
    /// `Event` whose `event.type == "function_executed"`.
    CustomFunctionExecuted,
    /// `Event` whose subtype is one of the assistant-thread events.
    AssistantThread,
    /// The body didn't match any recognized shape.
    Unknown,
}

impl Family {
    /// Whether this family auto-acknowledges immediately upon successful
    /// classification by default.
    ///
    /// `Command` / `Action` / `Shortcut` / `ViewAction` / `Options` require an
    /// explicit `ack` within the deadline instead.
    #[must_use]
    pub fn auto_acknowledges_by_default(&self) -> bool {
        matches!(
            self,
            Self::Event | Self::CustomFunctionExecuted | Self::AssistantThread
        )
    }

    /// Whether this family has a bounded ack deadline (as opposed to the
    /// fire-and-forget default for events).
    #[must_use]
    pub fn requires_bounded_ack(&self) -> bool {
        matches!(
            self,
            Self::Command | Self::Action | Self::Shortcut | Self::ViewAction | Self::Options
        )
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Event => "event",
            Self::Command => "command",
            Self::Action => "action",
            Self::Shortcut => "shortcut",
            Self::ViewAction => "view",
            Self::Options => "options",
            Self::CustomFunctionExecuted => "function_executed",
            Self::AssistantThread => "assistant_thread",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
