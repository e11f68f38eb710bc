// SPDX-License-Identifier: MIT OR Apache-2.0
//! Listener router: per-family constraint tables and the built-in
//! middlewares every dispatch composes around them.
//!
//! Constraint evaluation is a small interpreter over the parsed payload
//! rather than bespoke matching code per listener kind: each
//! [`ListenerConstraint`] variant names the fields it reads and how
//! (exact-equality `String` vs. find/substring `Regex`, per [`Pattern`]),
//! and [`ListenerConstraint::matches`] is the one place that interprets them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bolt_core::{
    AckFn, AckResponse, Context, Family, Pattern, RespondFn, SayFn, IGNORE_SELF_EXEMPT_EVENT_TYPES,
};
use bolt_error::BoltError;
use bolt_payload::ClassifiedPayload;
use bolt_pipeline::{AggregateError, Chain, Middleware, MiddlewareResult, Next};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Everything threaded through one dispatch's middleware chain: the shared
/// [`Context`], the classified body, and the ack capability. This is the `S`
/// that `bolt-pipeline`'s `Middleware<S>` is instantiated with at the router
/// layer.
pub struct DispatchState {
    /// Authorization/routing context, mutable by every stage.
    pub context: Context,
    /// Classified family.
    pub family: Family,
    /// `event.type` / envelope `type`, as resolved by the classifier.
    pub event_type: Option<String>,
    /// The parsed body.
    pub body: Value,
    /// Ack capability for this event, if the receiver supplied one.
    pub ack: Option<AckFn>,
    /// `say` capability for this event, if the receiver was built with a
    /// client able to post to the originating conversation.
    pub say: Option<SayFn>,
    /// `respond` capability for this event, if the inbound payload carried a
    /// `response_url` and the receiver can POST to it.
    pub respond: Option<RespondFn>,
    /// Per-event tracing span; listeners should `.enter()` it or instrument
    /// their own spans as children of it rather than logging at the
    /// ambient span.
    pub logger: tracing::Span,
}

impl DispatchState {
    /// Call `ack` with an empty response if an ack capability is present and
    /// hasn't already fired; a no-op otherwise (the acknowledgment
    /// coordinator, not the router, is responsible for rejecting a second
    /// call).
    pub async fn ack_empty(&self) -> Result<(), BoltError> {
        if let Some(ack) = &self.ack {
            ack(AckResponse::Empty).await
        } else {
            Ok(())
        }
    }
}

/// Two flavors of `Shortcut`: global `shortcut` vs. message-scoped
/// `message_action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKind {
    /// Global shortcut.
    Global,
    /// Message-scoped shortcut (message action).
    Message,
}

/// Two flavors of `ViewAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewActionKind {
    /// `view_submission`.
    Submission,
    /// `view_closed`.
    Closed,
}

/// `Message` listeners treat a `String` pattern as a substring match against
/// `text` (case-sensitive), not exact-equality — the one documented
/// exception to the generic [`Pattern`] rule.
#[derive(Clone)]
pub enum MessagePattern {
    /// Substring match against `text`.
    Substring(String),
    /// Regex match (find semantics) against `text`; captures are recorded.
    Regex(Regex),
    /// Matches any message with a `text` field at all — the `message`
    /// listener with no pattern constraint, and the base of the
    /// `directMention` sugar.
    Any,
}

/// A declarative predicate describing how an incoming event matches a
/// listener.
#[derive(Clone)]
pub enum ListenerConstraint {
    /// `Action` family: `block_actions` / `interactive_message` /
    /// `attachment_action` / `dialog_submission`.
    Action {
        /// Optional exact envelope-type gate (e.g. only `block_actions`).
        action_type: Option<String>,
        /// Match against `actions[0].action_id`.
        action_id: Option<Pattern>,
        /// Match against `actions[0].block_id`.
        block_id: Option<Pattern>,
        /// Match against the top-level `callback_id`.
        callback_id: Option<Pattern>,
    },
    /// `Shortcut` family.
    Shortcut {
        /// Global vs. message-scoped.
        kind: ShortcutKind,
        /// Match against the top-level `callback_id`.
        callback_id: Option<Pattern>,
    },
    /// `ViewAction` family.
    View {
        /// Submission vs. closed.
        kind: ViewActionKind,
        /// Match against `view.callback_id`.
        callback_id: Option<Pattern>,
    },
    /// `Options` family.
    Options {
        /// Match against `action_id`.
        action_id: Option<Pattern>,
        /// Match against `block_id`.
        block_id: Option<Pattern>,
    },
    /// `message` event sugar.
    Message {
        /// Substring-or-regex pattern against `event.text`.
        pattern: MessagePattern,
    },
    /// `Command` family.
    Command {
        /// Match against the `command` field.
        pattern: Pattern,
    },
    /// Custom-function listeners, matched by exact `callback_id`.
    Function {
        /// Exact (non-regex) match against `event.function.callback_id`.
        callback_id: String,
    },
    /// Generic `Event` family.
    Event {
        /// Match against `event.type`.
        pattern: Pattern,
    },
}

fn as_str<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer).and_then(Value::as_str)
}

impl ListenerConstraint {
    /// Evaluate this constraint against an already-family-gated event.
    /// Returns `Some(captures)` on a match (empty when the constraint has no
    /// regex groups), `None` otherwise.
    #[must_use]
    pub fn matches(&self, event_type: Option<&str>, body: &Value) -> Option<BTreeMap<String, String>> {
        match self {
            Self::Action {
                action_type,
                action_id,
                block_id,
                callback_id,
            } => {
                if let Some(expected) = action_type {
                    if event_type != Some(expected.as_str()) {
                        return None;
                    }
                }
                let mut captures = BTreeMap::new();
                if !match_optional(action_id, as_str(body, "/actions/0/action_id"), &mut captures) {
                    return None;
                }
                if !match_optional(block_id, as_str(body, "/actions/0/block_id"), &mut captures) {
                    return None;
                }
                if !match_optional(callback_id, as_str(body, "/callback_id"), &mut captures) {
                    return None;
                }
                Some(captures)
            }
            Self::Shortcut { kind, callback_id } => {
                let expected_type = match kind {
                    ShortcutKind::Global => "shortcut",
                    ShortcutKind::Message => "message_action",
                };
                if event_type != Some(expected_type) {
                    return None;
                }
                let mut captures = BTreeMap::new();
                if !match_optional(callback_id, as_str(body, "/callback_id"), &mut captures) {
                    return None;
                }
                Some(captures)
            }
            Self::View { kind, callback_id } => {
                let expected_type = match kind {
                    ViewActionKind::Submission => "view_submission",
                    ViewActionKind::Closed => "view_closed",
                };
                if event_type != Some(expected_type) {
                    return None;
                }
                let mut captures = BTreeMap::new();
                if !match_optional(callback_id, as_str(body, "/view/callback_id"), &mut captures) {
                    return None;
                }
                Some(captures)
            }
            Self::Options { action_id, block_id } => {
                let mut captures = BTreeMap::new();
                if !match_optional(action_id, as_str(body, "/action_id"), &mut captures) {
                    return None;
                }
                if !match_optional(block_id, as_str(body, "/block_id"), &mut captures) {
                    return None;
                }
                Some(captures)
            }
            Self::Message { pattern } => {
                let text = as_str(body, "/event/text")?;
                match pattern {
                    MessagePattern::Any => Some(BTreeMap::new()),
                    MessagePattern::Substring(needle) => text.contains(needle.as_str()).then(BTreeMap::new),
                    MessagePattern::Regex(re) => {
                        let caps = re.captures(text)?;
                        Some(captures_to_map(&caps))
                    }
                }
            }
            Self::Command { pattern } => {
                let command = as_str(body, "/command")?;
                pattern.matches(command).map(|caps| indexed_captures(&caps))
            }
            Self::Function { callback_id } => {
                let actual = as_str(body, "/event/function/callback_id")?;
                (actual == callback_id).then(BTreeMap::new)
            }
            Self::Event { pattern } => {
                let actual = event_type?;
                pattern.matches(actual).map(|caps| indexed_captures(&caps))
            }
        }
    }

    /// Reject invalid compound event names at registration time: a dotted
    /// event-type string like `message.channels` would silently never match
    /// anything, since the classifier never produces dotted `event.type`
    /// values.
    pub fn validate(&self) -> Result<(), BoltError> {
        if let Self::Event {
            pattern: Pattern::Exact(name),
        } = self
        {
            if name.contains('.') {
                return Err(BoltError::app_init(format!(
                    "invalid compound event name `{name}`: dotted event-type subscriptions are not supported"
                )));
            }
        }
        Ok(())
    }
}

/// Matches `actual` against `pattern` (a no-op match if `pattern` is
/// `None`), merging any captures into `captures` by plain group index —
/// index `0` is the whole match, same as `matches[0]` elsewhere in this
/// workspace's wire vocabulary.
fn match_optional(pattern: &Option<Pattern>, actual: Option<&str>, captures: &mut BTreeMap<String, String>) -> bool {
    match pattern {
        None => true,
        Some(p) => match actual.and_then(|a| p.matches(a)) {
            Some(caps) => {
                merge_indexed_captures(captures, caps);
                true
            }
            None => false,
        },
    }
}

fn merge_indexed_captures(captures: &mut BTreeMap<String, String>, caps: Vec<Option<String>>) {
    for (i, value) in caps.into_iter().enumerate() {
        if let Some(value) = value {
            captures.insert(i.to_string(), value);
        }
    }
}

fn captures_to_map(caps: &regex::Captures<'_>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (i, m) in caps.iter().enumerate() {
        if let Some(m) = m {
            map.insert(i.to_string(), m.as_str().to_string());
        }
    }
    map
}

fn indexed_captures(caps: &[Option<String>]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (i, c) in caps.iter().enumerate() {
        if let Some(c) = c {
            map.insert(i.to_string(), c.clone());
        }
    }
    map
}

/// One registered `(constraint, listener)` pair.
pub struct ListenerEntry {
    constraint: ListenerConstraint,
    handler: Arc<dyn Middleware<DispatchState>>,
}

/// The final stage of a dispatch chain: fans out to every listener that
/// matches the incoming event's family and constraint, running each to
/// completion independently and aggregating failures — one listener's error
/// does not prevent peers from running.
struct ListenerFanOut {
    entries: Arc<Vec<ListenerEntry>>,
}

#[async_trait]
impl Middleware<DispatchState> for ListenerFanOut {
    async fn call(&self, state: &mut DispatchState, _next: Next<'_, DispatchState>) -> MiddlewareResult {
        let mut errors = Vec::new();
        let mut any_matched = false;
        for entry in self.entries.iter() {
            let Some(captures) = entry.constraint.matches(state.event_type.as_deref(), &state.body) else {
                continue;
            };
            any_matched = true;
            if !captures.is_empty() {
                state.context.set_custom("matches", captures);
            }
            let chain = Chain::new().stage_arc(entry.handler.clone());
            if let Err(e) = chain.run(state).await {
                errors.push(e);
            }
        }
        if !any_matched {
            warn!(target: "bolt.router", family = %state.family, "no listener matched");
        }
        match AggregateError::from_errors(errors) {
            Some(agg) => Err(BoltError::unknown(agg)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "listener_fan_out"
    }
}

/// Drops `Event`-family dispatches whose `bot_id` equals our own resolved
/// identity — except `member_joined_channel` / `member_left_channel`, which
/// apps need to observe even for their own membership changes.
struct AutoIgnoreSelf;

#[async_trait]
impl Middleware<DispatchState> for AutoIgnoreSelf {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        let event_type = state.event_type.as_deref();
        let is_exempt = event_type
            .map(|t| IGNORE_SELF_EXEMPT_EVENT_TYPES.contains(&t))
            .unwrap_or(false);
        let own_bot_id = as_str(&state.body, "/event/bot_id").map(str::to_string);
        if !is_exempt {
            if let (Some(own), Some(context_bot_id)) = (own_bot_id, state.context.bot_id.as_deref()) {
                if own == context_bot_id {
                    return Ok(());
                }
            }
        }
        next.run(state).await
    }

    fn name(&self) -> &str {
        "auto_ignore_self"
    }
}

/// Wraps a handler so it only runs for `message` events whose text begins
/// with a direct mention of our bot user id — the `message.directMention`
/// sugar, applied per listener at registration time rather than inserted as
/// a blanket stage in every dispatch.
struct DirectMentionGate(Arc<dyn Middleware<DispatchState>>);

#[async_trait]
impl Middleware<DispatchState> for DirectMentionGate {
    async fn call(&self, state: &mut DispatchState, _next: Next<'_, DispatchState>) -> MiddlewareResult {
        let Ok(bot_user_id) = state.context.require_bot_user_id().map(str::to_string) else {
            return Ok(());
        };
        let Some(text) = as_str(&state.body, "/event/text") else {
            return Ok(());
        };
        let mention = format!("<@{bot_user_id}>");
        if !text.trim_start().starts_with(&mention) {
            return Ok(());
        }
        Chain::new().stage_arc(self.0.clone()).run(state).await
    }

    fn name(&self) -> &str {
        "message_direct_mention"
    }
}

/// Wrap `handler` with the `message.directMention` gate: register the result
/// for [`Family::Event`] with an [`ListenerConstraint::Message`] constraint
/// exactly as a plain message listener would be.
#[must_use]
pub fn direct_mention_gate(handler: Arc<dyn Middleware<DispatchState>>) -> Arc<dyn Middleware<DispatchState>> {
    Arc::new(DirectMentionGate(handler))
}

/// Calls `ack` with an empty response before running the rest of the chain,
/// for families whose `autoAcknowledge` is enabled. `processBeforeResponse`
/// ordering is the acknowledgment coordinator's concern (`bolt-ack`), not the
/// router's; this stage only supplies the empty response body when nothing
/// more specific was already acked.
struct AutoAck;

#[async_trait]
impl Middleware<DispatchState> for AutoAck {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        state.ack_empty().await?;
        next.run(state).await
    }

    fn name(&self) -> &str {
        "auto_ack"
    }
}

/// Per-family listener table plus configuration for the built-ins composed
/// around it.
struct FamilyTable {
    entries: Vec<ListenerEntry>,
    auto_acknowledge: bool,
}

/// The listener router: holds global middlewares and a per-family listener
/// table, and composes the dispatch chain.
pub struct Router {
    global: Vec<Arc<dyn Middleware<DispatchState>>>,
    tables: HashMap<Family, FamilyTable>,
    ignore_self_enabled: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// An empty router: no global middlewares, no listeners, auto-ignoreSelf
    /// on by default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            tables: HashMap::new(),
            ignore_self_enabled: true,
        }
    }

    /// Disable the auto-ignoreSelf built-in.
    pub fn disable_ignore_self(&mut self) {
        self.ignore_self_enabled = false;
    }

    /// Register a global middleware, run before every built-in and listener
    /// — global middlewares run first, in registration order.
    pub fn use_middleware<M: Middleware<DispatchState> + 'static>(&mut self, middleware: M) {
        self.global.push(Arc::new(middleware));
    }

    /// Register a listener for `family` guarded by `constraint`. Rejects an
    /// invalid compound event name at registration time rather than letting
    /// it silently never match.
    pub fn register(
        &mut self,
        family: Family,
        constraint: ListenerConstraint,
        handler: Arc<dyn Middleware<DispatchState>>,
    ) -> Result<(), BoltError> {
        constraint.validate()?;
        let table = self.tables.entry(family).or_insert_with(|| FamilyTable {
            entries: Vec::new(),
            auto_acknowledge: family.auto_acknowledges_by_default(),
        });
        table.entries.push(ListenerEntry { constraint, handler });
        Ok(())
    }

    /// Override whether `family` auto-acknowledges.
    pub fn set_auto_acknowledge(&mut self, family: Family, enabled: bool) {
        let table = self.tables.entry(family).or_insert_with(|| FamilyTable {
            entries: Vec::new(),
            auto_acknowledge: family.auto_acknowledges_by_default(),
        });
        table.auto_acknowledge = enabled;
    }

    /// Dispatch one classified event: compose global middlewares, built-ins,
    /// and every matching listener into a chain, and run it.
    pub async fn dispatch(
        &self,
        classified: &ClassifiedPayload,
        context: Context,
        ack: Option<AckFn>,
        say: Option<SayFn>,
        respond: Option<RespondFn>,
    ) -> MiddlewareResult {
        let mut state = DispatchState {
            context,
            family: classified.family,
            event_type: classified.event_type.clone(),
            body: classified.body.clone(),
            ack,
            say,
            respond,
            logger: tracing::Span::current(),
        };

        // A missing table means no listener was ever registered for this
        // family, not that the family should be skipped: events still
        // auto-ack on classification success even with an empty fan-out.
        let auto_acknowledge = self
            .tables
            .get(&classified.family)
            .map_or_else(|| classified.family.auto_acknowledges_by_default(), |t| t.auto_acknowledge);
        let entries: Vec<ListenerEntry> = self.tables.get(&classified.family).map_or_else(Vec::new, |t| {
            t.entries
                .iter()
                .map(|e| ListenerEntry {
                    constraint: e.constraint.clone(),
                    handler: e.handler.clone(),
                })
                .collect()
        });

        let mut chain: Chain<DispatchState> = Chain::new();
        for mw in &self.global {
            chain = chain.stage_arc(mw.clone());
        }
        if auto_acknowledge {
            chain = chain.stage(AutoAck);
        }
        if classified.family == Family::Event && self.ignore_self_enabled {
            chain = chain.stage(AutoIgnoreSelf);
        }
        chain = chain.stage(ListenerFanOut {
            entries: Arc::new(entries),
        });

        chain.run(&mut state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt_payload::classify_value;
    use serde_json::json;

    struct RecordingHandler {
        flag: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Middleware<DispatchState> for RecordingHandler {
        async fn call(&self, _state: &mut DispatchState, _next: Next<'_, DispatchState>) -> MiddlewareResult {
            self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn handler(flag: Arc<std::sync::atomic::AtomicBool>) -> Arc<dyn Middleware<DispatchState>> {
        Arc::new(RecordingHandler { flag })
    }

    #[tokio::test]
    async fn message_listener_matches_on_exact_event_type() {
        let mut router = Router::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("message"),
                },
                handler(flag.clone()),
            )
            .unwrap();

        let body = json!({"type": "event_callback", "event": {"type": "message", "text": "hi"}});
        let classified = classify_value(body);
        router.dispatch(&classified, Context::new(), None, None, None).await.unwrap();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn non_matching_event_type_does_not_fire() {
        let mut router = Router::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("reaction_added"),
                },
                handler(flag.clone()),
            )
            .unwrap();

        let body = json!({"type": "event_callback", "event": {"type": "message", "text": "hi"}});
        let classified = classify_value(body);
        router.dispatch(&classified, Context::new(), None, None, None).await.unwrap();
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dotted_event_name_is_rejected_at_registration() {
        let mut router = Router::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let err = router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("message.channels"),
                },
                handler(flag),
            )
            .unwrap_err();
        assert_eq!(err.code(), bolt_error::ErrorCode::AppInitialization);
    }

    #[tokio::test]
    async fn ignore_self_drops_own_bot_events() {
        let mut router = Router::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("message"),
                },
                handler(flag.clone()),
            )
            .unwrap();

        let body = json!({"type": "event_callback", "event": {"type": "message", "bot_id": "B1", "text": "hi"}});
        let classified = classify_value(body);
        let mut context = Context::new();
        context.bot_id = Some("B1".to_string());
        router.dispatch(&classified, context, None, None, None).await.unwrap();
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn ignore_self_exempts_member_joined_channel() {
        let mut router = Router::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("member_joined_channel"),
                },
                handler(flag.clone()),
            )
            .unwrap();

        let body = json!({"type": "event_callback", "event": {"type": "member_joined_channel", "bot_id": "B1"}});
        let classified = classify_value(body);
        let mut context = Context::new();
        context.bot_id = Some("B1".to_string());
        router.dispatch(&classified, context, None, None, None).await.unwrap();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn message_pattern_is_substring_not_exact() {
        let mut router = Router::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        router
            .register(
                Family::Event,
                ListenerConstraint::Message {
                    pattern: MessagePattern::Substring("deploy".to_string()),
                },
                handler(flag.clone()),
            )
            .unwrap();

        let body = json!({"type": "event_callback", "event": {"type": "message", "text": "please deploy now"}});
        let classified = classify_value(body);
        router.dispatch(&classified, Context::new(), None, None, None).await.unwrap();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn multiple_matching_listeners_all_run_and_errors_aggregate() {
        struct Always(Arc<std::sync::atomic::AtomicUsize>, bool);

        #[async_trait]
        impl Middleware<DispatchState> for Always {
            async fn call(&self, _s: &mut DispatchState, _n: Next<'_, DispatchState>) -> MiddlewareResult {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if self.1 {
                    Err(BoltError::unknown(std::io::Error::other("boom")))
                } else {
                    Ok(())
                }
            }
        }

        let mut router = Router::new();
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("message"),
                },
                Arc::new(Always(counter.clone(), false)),
            )
            .unwrap();
        router
            .register(
                Family::Event,
                ListenerConstraint::Event {
                    pattern: Pattern::exact("message"),
                },
                Arc::new(Always(counter.clone(), true)),
            )
            .unwrap();

        let body = json!({"type": "event_callback", "event": {"type": "message", "text": "hi"}});
        let classified = classify_value(body);
        let err = router.dispatch(&classified, Context::new(), None, None, None).await.unwrap_err();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(err.code(), bolt_error::ErrorCode::Unknown);
    }

    #[tokio::test]
    async fn unknown_family_with_no_table_is_a_noop() {
        let router = Router::new();
        let classified = classify_value(json!({"nonsense": true}));
        router.dispatch(&classified, Context::new(), None, None, None).await.unwrap();
    }

    #[test]
    fn action_regex_capture_populates_whole_match_at_index_zero() {
        let constraint = ListenerConstraint::Action {
            action_type: None,
            action_id: Some(Pattern::regex(Regex::new("^btn_").unwrap())),
            block_id: None,
            callback_id: None,
        };
        let body = json!({
            "actions": [{"action_id": "btn_ok", "block_id": "b1", "type": "button"}]
        });
        let captures = constraint.matches(None, &body).unwrap();
        assert_eq!(captures.get("0").map(String::as_str), Some("btn_ok"));
    }

    #[tokio::test]
    async fn action_listener_capture_lands_in_context_custom_matches() {
        struct CapturingHandler {
            seen: Arc<std::sync::Mutex<Option<BTreeMap<String, String>>>>,
        }

        #[async_trait]
        impl Middleware<DispatchState> for CapturingHandler {
            async fn call(&self, state: &mut DispatchState, _next: Next<'_, DispatchState>) -> MiddlewareResult {
                *self.seen.lock().unwrap() =
                    state.context.custom.get("matches").and_then(|v| serde_json::from_value(v.clone()).ok());
                Ok(())
            }
        }

        let mut router = Router::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        router
            .register(
                Family::Action,
                ListenerConstraint::Action {
                    action_type: None,
                    action_id: Some(Pattern::regex(Regex::new("^btn_").unwrap())),
                    block_id: None,
                    callback_id: None,
                },
                Arc::new(CapturingHandler { seen: seen.clone() }),
            )
            .unwrap();

        let body = json!({
            "type": "block_actions",
            "actions": [{"action_id": "btn_ok", "block_id": "b1", "type": "button"}]
        });
        let classified = classify_value(body);
        router.dispatch(&classified, Context::new(), None, None, None).await.unwrap();

        let captured = seen.lock().unwrap().clone().expect("listener never observed matches");
        assert_eq!(captured.get("0").map(String::as_str), Some("btn_ok"));
    }
}
