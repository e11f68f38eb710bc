// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payload classification: raw body bytes and a content-type header turn
//! into a [`ClassifiedPayload`] carrying [`Family`] plus the envelope fields
//! the router and authorization resolver need next.
//!
//! Classification never panics and never fails on an unrecognized shape —
//! only a structurally broken body (neither valid urlencoded-with-JSON nor
//! valid JSON) produces a [`BoltError::ParseError`]. An unrecognized-but-
//! well-formed body classifies as [`Family::Unknown`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use bolt_core::{Family, ASSISTANT_THREAD_EVENT_TYPES, FUNCTION_EXECUTED_EVENT_TYPE};
use bolt_error::BoltError;
use serde_json::{Map, Value};

/// Result of classifying one inbound body.
#[derive(Debug, Clone)]
pub struct ClassifiedPayload {
    /// Top-level family this body was classified as.
    pub family: Family,
    /// `event.type` for the `Event` family and its derivatives; the envelope
    /// `type` for every other family.
    pub event_type: Option<String>,
    /// Conversation/channel the payload pertains to, extracted per the
    /// family-specific rule below.
    pub conversation_id: Option<String>,
    /// Resolved `is_enterprise_install` flag, accepting the boolean or
    /// stringified-boolean wire representations.
    pub is_enterprise_install: bool,
    /// The parsed JSON body, kept for downstream constraint matching and
    /// user introspection.
    pub body: Value,
}

fn as_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn parse_enterprise_install(v: &Value) -> bool {
    match v.get("is_enterprise_install") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Decode `raw_body`: form-urlencoded bodies
/// decode to a map, then a `payload` field (if present) is JSON-parsed as
/// the real body; everything else is JSON-parsed directly.
///
/// Exposed for receivers that need the parsed [`Value`] to build a
/// [`bolt_core::ReceiverEvent`] before [`classify_value`] runs again inside
/// `App::process_event`.
pub fn decode_body(raw_body: &[u8], content_type: Option<&str>) -> Result<Value, BoltError> {
    let is_form = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        let form: Vec<(String, String)> = serde_urlencoded::from_bytes(raw_body)
            .map_err(|e| BoltError::parse_with_source("invalid form-urlencoded body", e))?;

        if let Some((_, payload)) = form.iter().find(|(k, _)| k == "payload") {
            return serde_json::from_str(payload)
                .map_err(|e| BoltError::parse_with_source("invalid `payload` field JSON", e));
        }

        let mut map = Map::new();
        for (k, v) in form {
            map.insert(k, Value::String(v));
        }
        return Ok(Value::Object(map));
    }

    serde_json::from_slice(raw_body)
        .map_err(|e| BoltError::parse_with_source("invalid JSON body", e))
}

/// Classify a raw inbound body. Never panics; only a malformed body (not an
/// unrecognized one) returns `Err`.
pub fn classify(raw_body: &[u8], content_type: Option<&str>) -> Result<ClassifiedPayload, BoltError> {
    let body = decode_body(raw_body, content_type)?;
    Ok(classify_value(body))
}

/// Classify an already-parsed body, e.g. one a receiver decoded itself.
#[must_use]
pub fn classify_value(body: Value) -> ClassifiedPayload {
    let is_enterprise_install = parse_enterprise_install(&body);
    let envelope_type = as_str(&body, "type").map(str::to_string);

    if body.get("command").is_some() {
        return ClassifiedPayload {
            family: Family::Command,
            event_type: envelope_type,
            conversation_id: as_str(&body, "channel_id").map(str::to_string),
            is_enterprise_install,
            body,
        };
    }

    if envelope_type.as_deref() == Some("event_callback") {
        if let Some(event) = body.get("event") {
            let event_type = as_str(event, "type").map(str::to_string);
            let family = match event_type.as_deref() {
                Some(FUNCTION_EXECUTED_EVENT_TYPE) => Family::CustomFunctionExecuted,
                Some(t) if ASSISTANT_THREAD_EVENT_TYPES.contains(&t) => Family::AssistantThread,
                _ => Family::Event,
            };
            let conversation_id = as_str(event, "channel")
                .or_else(|| event.pointer("/item/channel").and_then(Value::as_str))
                .map(str::to_string);
            return ClassifiedPayload {
                family,
                event_type,
                conversation_id,
                is_enterprise_install,
                body,
            };
        }
        return ClassifiedPayload {
            family: Family::Unknown,
            event_type: envelope_type,
            conversation_id: None,
            is_enterprise_install,
            body,
        };
    }

    const ACTION_TYPES: &[&str] = &[
        "block_actions",
        "interactive_message",
        "attachment_action",
        "dialog_submission",
    ];
    if envelope_type
        .as_deref()
        .map(|t| ACTION_TYPES.contains(&t))
        .unwrap_or(false)
    {
        return ClassifiedPayload {
            family: Family::Action,
            event_type: envelope_type,
            conversation_id: body.pointer("/channel/id").and_then(Value::as_str).map(str::to_string),
            is_enterprise_install,
            body,
        };
    }

    if matches!(envelope_type.as_deref(), Some("shortcut") | Some("message_action")) {
        return ClassifiedPayload {
            family: Family::Shortcut,
            event_type: envelope_type,
            conversation_id: body.pointer("/channel/id").and_then(Value::as_str).map(str::to_string),
            is_enterprise_install,
            body,
        };
    }

    if matches!(envelope_type.as_deref(), Some("view_submission") | Some("view_closed")) {
        return ClassifiedPayload {
            family: Family::ViewAction,
            event_type: envelope_type,
            conversation_id: body.pointer("/channel/id").and_then(Value::as_str).map(str::to_string),
            is_enterprise_install,
            body,
        };
    }

    if envelope_type.as_deref() == Some("block_suggestion") || body.get("name").is_some() {
        return ClassifiedPayload {
            family: Family::Options,
            event_type: envelope_type,
            conversation_id: body.pointer("/channel/id").and_then(Value::as_str).map(str::to_string),
            is_enterprise_install,
            body,
        };
    }

    ClassifiedPayload {
        family: Family::Unknown,
        event_type: envelope_type,
        conversation_id: None,
        is_enterprise_install,
        body,
    }
}
