// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared domain types for the Slack Bolt core.
//!
//! If you only take one dependency beyond [`bolt-error`], take this one: it
//! defines the vocabulary every other crate in the workspace speaks —
//! [`Family`], [`ReceiverEvent`], [`Context`], and the [`Pattern`] primitive
//! used to build `ListenerConstraint`s.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Per-event authorization and enrichment state threaded through the chain.
pub mod context;
/// Inbound event shape delivered by a transport, and its ack capability.
pub mod event;
/// Top-level payload family classification.
pub mod family;
/// String/regex matching primitive used to build listener constraints.
pub mod pattern;

pub use context::Context;
pub use event::{AckFn, AckResponse, ReceiverEvent, RespondFn, SayFn};
pub use family::Family;
pub use pattern::Pattern;

/// Current wire-contract version exposed for diagnostics and `/health`-style
/// endpoints.
pub const CONTRACT_VERSION: &str = "bolt-core/v0.1";

/// Event (sub)types that bypass authorization entirely.
pub const AUTHORIZATION_SKIP_EVENT_TYPES: &[&str] = &["app_uninstalled", "tokens_revoked"];

/// Event types that are exempt from the auto-ignoreSelf built-in middleware
/// — apps need to observe these even for their own membership changes.
pub const IGNORE_SELF_EXEMPT_EVENT_TYPES: &[&str] =
    &["member_joined_channel", "member_left_channel"];

/// `event.type` values classified as [`Family::AssistantThread`] rather than
/// plain [`Family::Event`].
pub const ASSISTANT_THREAD_EVENT_TYPES: &[&str] =
    &["assistant_thread_started", "assistant_thread_context_changed"];

/// `event.type` value classified as [`Family::CustomFunctionExecuted`]
/// rather than plain [`Family::Event`].
pub const FUNCTION_EXECUTED_EVENT_TYPE: &str = "function_executed";
