// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inbound event shape delivered by a transport, and its ack capability.

use bolt_error::BoltError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Body of an `ack` response.
///
/// Slash commands, actions, and options requests may need to reply with a
/// specific HTTP body (a message, or a JSON view payload); plain events
/// never carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckResponse {
    /// No body — the bare 200 acknowledgment.
    Empty,
    /// A plain-text response body.
    Text(String),
    /// A JSON response body (e.g. an updated view, or `response_action`).
    Json(serde_json::Value),
}

impl Default for AckResponse {
    fn default() -> Self {
        Self::Empty
    }
}

impl From<&str> for AckResponse {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AckResponse {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for AckResponse {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// The ack capability handed to a listener: calling it exactly once
/// satisfies the acknowledgment coordinator. A second call is a
/// [`BoltError::ReceiverMultipleAckError`], surfaced to the caller rather
/// than silently swallowed.
///
/// Boxed so it can be cloned into every listener's argument bundle while
/// wrapping whatever the concrete receiver's transport needs to do.
pub type AckFn =
    Arc<dyn Fn(AckResponse) -> BoxFuture<'static, Result<(), BoltError>> + Send + Sync>;

/// Posts a message to the conversation the event arrived in, using whatever
/// token [`crate::Context::token`] resolves. `say` resolves the channel from
/// context rather than from an explicit argument.
pub type SayFn =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, BoltError>> + Send + Sync>;

/// Replies to the surface that produced the event (the `response_url`
/// embedded in the inbound payload for actions/commands, or `say` for events
/// that have none).
pub type RespondFn =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<(), BoltError>> + Send + Sync>;

/// An inbound payload plus everything a receiver knows about its delivery:
/// raw headers, retry metadata, and the ack/say/respond capabilities.
#[derive(Clone)]
pub struct ReceiverEvent {
    /// Parsed JSON body. Payload classification (`bolt-payload`) reads this;
    /// it is kept as a raw [`serde_json::Value`] here because the shape
    /// varies by [`crate::Family`].
    pub body: serde_json::Value,
    /// Transport-level headers, lower-cased keys, for receivers that expose
    /// HTTP-flavored metadata (e.g. `x-slack-retry-num`). Empty for
    /// transports with no header concept.
    pub headers: BTreeMap<String, String>,
    /// Ack capability for this event. `None` for delivery shapes with no ack
    /// concept (there currently are none in the reference receivers, but the
    /// field stays optional so a future receiver can omit it honestly rather
    /// than installing a no-op).
    pub ack: Option<AckFn>,
    /// `say` capability, present when the receiver was constructed with an
    /// API client able to post to the originating conversation. `None` for
    /// receivers with no client wired in — listeners must treat `say` as
    /// optional.
    pub say: Option<SayFn>,
    /// `respond` capability, present when the inbound payload carried a
    /// `response_url` and the receiver has a client able to POST to it.
    pub respond: Option<RespondFn>,
    /// Parsed `x-slack-retry-num`, if present and numeric.
    pub retry_num: Option<u32>,
    /// Parsed `x-slack-retry-reason`, if present.
    pub retry_reason: Option<String>,
    /// Receiver-specific properties that don't fit the common shape above
    /// (e.g. a Lambda request ID, or a Socket Mode envelope ID).
    pub custom_properties: BTreeMap<String, serde_json::Value>,
}

impl ReceiverEvent {
    /// Construct a bare event with no headers, no ack/say/respond, and no
    /// retry metadata — the shape an in-process fake transport builds
    /// directly.
    #[must_use]
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            headers: BTreeMap::new(),
            ack: None,
            say: None,
            respond: None,
            retry_num: None,
            retry_reason: None,
            custom_properties: BTreeMap::new(),
        }
    }

    /// Attach an ack capability.
    #[must_use]
    pub fn with_ack(mut self, ack: AckFn) -> Self {
        self.ack = Some(ack);
        self
    }

    /// Attach a `say` capability.
    #[must_use]
    pub fn with_say(mut self, say: SayFn) -> Self {
        self.say = Some(say);
        self
    }

    /// Attach a `respond` capability.
    #[must_use]
    pub fn with_respond(mut self, respond: RespondFn) -> Self {
        self.respond = Some(respond);
        self
    }

    /// Attach headers, deriving `retry_num` / `retry_reason` from the
    /// conventional `x-slack-retry-num` / `x-slack-retry-reason` keys if
    /// present. When a header repeats, the first value wins — callers build
    /// `headers` from their transport's header map, and an
    /// `axum::http::HeaderMap::get` lookup already yields the first value,
    /// so that behavior just falls out of this taking a single `String` per
    /// key rather than a `Vec`.
    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.retry_num = headers
            .get("x-slack-retry-num")
            .and_then(|v| v.parse().ok());
        self.retry_reason = headers.get("x-slack-retry-reason").cloned();
        self.headers = headers;
        self
    }

    /// Whether this delivery is a retry (as opposed to the first attempt).
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.retry_num.is_some()
    }
}

impl fmt::Debug for ReceiverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverEvent")
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("ack", &self.ack.is_some())
            .field("say", &self.say.is_some())
            .field("respond", &self.respond.is_some())
            .field("retry_num", &self.retry_num)
            .field("retry_reason", &self.retry_reason)
            .field("custom_properties", &self.custom_properties)
            .finish()
    }
}
