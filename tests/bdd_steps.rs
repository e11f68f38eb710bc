// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios for dispatch ordering, acknowledgment, and
//! authorization, driven against the real `App`/router rather than any
//! single crate's unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use cucumber::{World as _, given, then, when};
use http_body_util::BodyExt;
use regex::Regex;
use serde_json::{Value, json};
use tower::ServiceExt;

use bolt_ack::AckCoordinator;
use bolt_app::App;
use bolt_auth::{Authorize, AuthorizeArgs, AuthorizeResult};
use bolt_core::{AckResponse, Family, Pattern, ReceiverEvent};
use bolt_error::{BoltError, ErrorCode};
use bolt_pipeline::{Middleware, MiddlewareResult, Next};
use bolt_receiver::http::{CorsConfig, build_router};
use bolt_router::{DispatchState, ListenerConstraint};

struct AppHandle(Arc<App>);

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("App")
    }
}

struct RouterHandle(axum::Router);

impl std::fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Router")
    }
}

#[derive(Debug, Default, cucumber::World)]
struct BoltWorld {
    app: Option<AppHandle>,
    router: Option<RouterHandle>,
    hits: Arc<AtomicUsize>,
    authorize_calls: Arc<AtomicUsize>,
    captured_text: Arc<Mutex<Option<String>>>,
    captured_matches: Arc<Mutex<Option<BTreeMap<String, String>>>>,
    isolation_observations: Arc<Mutex<Vec<bool>>>,
    first_ack_ok: Arc<Mutex<Option<bool>>>,
    second_ack_code: Arc<Mutex<Option<ErrorCode>>>,
    dispatch_ok: bool,
    dispatch_error_code: Option<ErrorCode>,
    ack_status: Option<u16>,
    ack_body: Option<AckResponse>,
    http_status: Option<u16>,
    http_body: Option<String>,
}

// ---------------------------------------------------------------------------
// Authorize resolvers
// ---------------------------------------------------------------------------

struct FixedAuthorize;

#[async_trait]
impl Authorize for FixedAuthorize {
    async fn authorize(&self, _args: &AuthorizeArgs) -> Result<AuthorizeResult, BoltError> {
        Ok(AuthorizeResult {
            bot_token: Some("xoxb-test".into()),
            user_token: None,
            bot_id: Some("B1".into()),
            bot_user_id: Some("U_BOT".into()),
        })
    }
}

struct FailingAuthorize(Arc<AtomicUsize>);

#[async_trait]
impl Authorize for FailingAuthorize {
    async fn authorize(&self, _args: &AuthorizeArgs) -> Result<AuthorizeResult, BoltError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(BoltError::authorization("no credentials"))
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

struct AckingListener(Arc<AtomicUsize>);

#[async_trait]
impl Middleware<DispatchState> for AckingListener {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        state.ack_empty().await?;
        next.run(state).await
    }
}

struct CommandListener(Arc<AtomicUsize>, Arc<Mutex<Option<String>>>);

#[async_trait]
impl Middleware<DispatchState> for CommandListener {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        *self.1.lock().unwrap() = state.body.get("text").and_then(Value::as_str).map(str::to_string);
        state.ack_empty().await?;
        next.run(state).await
    }
}

struct ActionListener(Arc<AtomicUsize>, Arc<Mutex<Option<BTreeMap<String, String>>>>);

#[async_trait]
impl Middleware<DispatchState> for ActionListener {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        *self.1.lock().unwrap() = state
            .context
            .custom
            .get("matches")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        state.ack_empty().await?;
        next.run(state).await
    }
}

struct DoubleAckListener(Arc<AtomicUsize>, Arc<Mutex<Option<bool>>>, Arc<Mutex<Option<ErrorCode>>>);

#[async_trait]
impl Middleware<DispatchState> for DoubleAckListener {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        let first = state.ack_empty().await;
        *self.1.lock().unwrap() = Some(first.is_ok());
        let second = state.ack_empty().await;
        *self.2.lock().unwrap() = second.err().map(|e| e.code());
        next.run(state).await
    }
}

struct StampListener(Arc<AtomicUsize>, Arc<Mutex<Vec<bool>>>);

#[async_trait]
impl Middleware<DispatchState> for StampListener {
    async fn call(&self, state: &mut DispatchState, next: Next<'_, DispatchState>) -> MiddlewareResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        let saw_previous = state.context.custom.contains_key("stamp");
        self.1.lock().unwrap().push(saw_previous);
        state.context.set_custom("stamp", true);
        state.ack_empty().await?;
        next.run(state).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn event_callback_body(event_type: &str, text: &str) -> Value {
    json!({
        "type": "event_callback",
        "team_id": "T1",
        "event": {"type": event_type, "text": text, "channel": "C1", "user": "U1"}
    })
}

async fn dispatch(w: &mut BoltWorld, body: Value) {
    let app = w.app.as_ref().expect("no app set up by a prior Given step").0.clone();
    let (coordinator, rx) = AckCoordinator::new();
    let event = ReceiverEvent::new(body).with_ack(coordinator.ack_fn());
    let result = app.process_event(event).await;
    match &result {
        Ok(()) => {
            w.dispatch_ok = true;
            w.dispatch_error_code = None;
        }
        Err(err) => {
            w.dispatch_ok = false;
            w.dispatch_error_code = Some(err.code());
        }
    }
    let signal = AckCoordinator::wait(rx, Some(Duration::from_millis(100))).await;
    w.ack_status = Some(signal.status);
    w.ack_body = Some(signal.body);
}

async fn post(w: &mut BoltWorld, headers: Vec<(&str, String)>, body: String, content_type: &str) {
    let router = w.router.as_ref().expect("no http receiver set up by a prior Given step").0.clone();
    let mut builder = Request::post("/slack/events").header("content-type", content_type);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    let request = builder.body(Body::from(body)).unwrap();
    let response = router.oneshot(request).await.unwrap();
    w.http_status = Some(response.status().as_u16());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    w.http_body = Some(String::from_utf8_lossy(&bytes).into_owned());
}

// ---------------------------------------------------------------------------
// Given
// ---------------------------------------------------------------------------

#[given(expr = "an app with an event listener registered for {string}")]
async fn given_event_listener(w: &mut BoltWorld, event_type: String) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Event,
        ListenerConstraint::Event {
            pattern: Pattern::exact(event_type),
        },
        Arc::new(AckingListener(w.hits.clone())),
    )
    .unwrap();
    app.start().unwrap();
    w.app = Some(AppHandle(Arc::new(app)));
}

#[given(expr = "an app with a command listener registered for {string}")]
async fn given_command_listener(w: &mut BoltWorld, command: String) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Command,
        ListenerConstraint::Command {
            pattern: Pattern::exact(command),
        },
        Arc::new(CommandListener(w.hits.clone(), w.captured_text.clone())),
    )
    .unwrap();
    app.start().unwrap();
    w.app = Some(AppHandle(Arc::new(app)));
}

#[given(expr = "an app with an action listener matching action_id pattern {string}")]
async fn given_action_listener(w: &mut BoltWorld, pattern: String) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Action,
        ListenerConstraint::Action {
            action_type: None,
            action_id: Some(Pattern::regex(Regex::new(&pattern).unwrap())),
            block_id: None,
            callback_id: None,
        },
        Arc::new(ActionListener(w.hits.clone(), w.captured_matches.clone())),
    )
    .unwrap();
    app.start().unwrap();
    w.app = Some(AppHandle(Arc::new(app)));
}

#[given("an app with an event listener that acks twice")]
async fn given_double_ack_listener(w: &mut BoltWorld) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Event,
        ListenerConstraint::Event {
            pattern: Pattern::exact("app_mention"),
        },
        Arc::new(DoubleAckListener(
            w.hits.clone(),
            w.first_ack_ok.clone(),
            w.second_ack_code.clone(),
        )),
    )
    .unwrap();
    app.start().unwrap();
    w.app = Some(AppHandle(Arc::new(app)));
}

#[given("an app whose authorize callback always fails")]
async fn given_failing_authorize_app(w: &mut BoltWorld) {
    let mut app = App::new(Arc::new(FailingAuthorize(w.authorize_calls.clone())));
    app.register(
        Family::Event,
        ListenerConstraint::Event {
            pattern: Pattern::exact("app_mention"),
        },
        Arc::new(AckingListener(w.hits.clone())),
    )
    .unwrap();
    app.start().unwrap();
    w.app = Some(AppHandle(Arc::new(app)));
}

#[given("an app with a listener that stamps a custom context property")]
async fn given_stamp_listener(w: &mut BoltWorld) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Event,
        ListenerConstraint::Event {
            pattern: Pattern::exact("app_mention"),
        },
        Arc::new(StampListener(w.hits.clone(), w.isolation_observations.clone())),
    )
    .unwrap();
    app.start().unwrap();
    w.app = Some(AppHandle(Arc::new(app)));
}

#[given("a running http receiver with no signing secret")]
async fn given_http_receiver(w: &mut BoltWorld) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Event,
        ListenerConstraint::Event {
            pattern: Pattern::exact("app_mention"),
        },
        Arc::new(AckingListener(w.hits.clone())),
    )
    .unwrap();
    app.start().unwrap();
    let router = build_router(Arc::new(app), None, &CorsConfig::default());
    w.router = Some(RouterHandle(router));
}

#[given(expr = "a running http receiver signing with secret {string}")]
async fn given_http_receiver_signed(w: &mut BoltWorld, secret: String) {
    let mut app = App::new(Arc::new(FixedAuthorize));
    app.register(
        Family::Event,
        ListenerConstraint::Event {
            pattern: Pattern::exact("app_mention"),
        },
        Arc::new(AckingListener(w.hits.clone())),
    )
    .unwrap();
    app.start().unwrap();
    let router = build_router(Arc::new(app), Some(secret), &CorsConfig::default());
    w.router = Some(RouterHandle(router));
}

#[given("a running http receiver with no signing secret whose authorize callback always fails")]
async fn given_http_receiver_failing_authorize(w: &mut BoltWorld) {
    let app = App::new(Arc::new(FailingAuthorize(w.authorize_calls.clone())));
    app.start().unwrap();
    let router = build_router(Arc::new(app), None, &CorsConfig::default());
    w.router = Some(RouterHandle(router));
}

// ---------------------------------------------------------------------------
// When
// ---------------------------------------------------------------------------

#[when(expr = "an event_callback payload for {string} with text {string} is dispatched")]
async fn when_event_dispatched(w: &mut BoltWorld, event_type: String, text: String) {
    dispatch(w, event_callback_body(&event_type, &text)).await;
}

#[when(expr = "another event_callback payload for {string} with text {string} is dispatched")]
async fn when_another_event_dispatched(w: &mut BoltWorld, event_type: String, text: String) {
    dispatch(w, event_callback_body(&event_type, &text)).await;
}

#[when(expr = "a command payload {string} with text {string} is dispatched")]
async fn when_command_dispatched(w: &mut BoltWorld, command: String, text: String) {
    let body = json!({
        "command": command,
        "text": text,
        "user_id": "U1",
        "channel_id": "C1",
        "team_id": "T1",
    });
    dispatch(w, body).await;
}

#[when(expr = "a block_actions payload with action_id {string} is dispatched")]
async fn when_action_dispatched(w: &mut BoltWorld, action_id: String) {
    let body = json!({
        "type": "block_actions",
        "team": {"id": "T1"},
        "user": {"id": "U1"},
        "channel": {"id": "C1"},
        "actions": [{"action_id": action_id, "block_id": "b1", "type": "button"}]
    });
    dispatch(w, body).await;
}

#[when("an app_uninstalled event payload is dispatched")]
async fn when_app_uninstalled_dispatched(w: &mut BoltWorld) {
    let body = json!({
        "type": "event_callback",
        "team_id": "T1",
        "event": {"type": "app_uninstalled"}
    });
    dispatch(w, body).await;
}

#[when(expr = "a url_verification payload with challenge {string} is posted to the http receiver")]
async fn when_url_verification_posted(w: &mut BoltWorld, challenge: String) {
    let body = json!({"type": "url_verification", "challenge": challenge}).to_string();
    post(w, vec![], body, "application/json").await;
}

#[when(expr = "a payload is posted to the http receiver with a timestamp {int} seconds in the past")]
async fn when_stale_payload_posted(w: &mut BoltWorld, seconds: i64) {
    let body = "{}".to_string();
    let timestamp = (chrono::Utc::now().timestamp() - seconds).to_string();
    post(
        w,
        vec![
            ("x-slack-request-timestamp", timestamp),
            ("x-slack-signature", "v0=deadbeef".to_string()),
        ],
        body,
        "application/json",
    )
    .await;
}

#[when(expr = "an event_callback payload for {string} with text {string} is posted to the http receiver")]
async fn when_event_posted(w: &mut BoltWorld, event_type: String, text: String) {
    let body = event_callback_body(&event_type, &text).to_string();
    post(w, vec![], body, "application/json").await;
}

// ---------------------------------------------------------------------------
// Then
// ---------------------------------------------------------------------------

#[then(expr = "the listener is invoked exactly {int} time")]
async fn then_listener_invoked(w: &mut BoltWorld, times: usize) {
    assert_eq!(w.hits.load(Ordering::SeqCst), times);
}

#[then("no listener is invoked")]
async fn then_no_listener_invoked(w: &mut BoltWorld) {
    assert_eq!(w.hits.load(Ordering::SeqCst), 0);
}

#[then("the dispatch succeeds")]
async fn then_dispatch_succeeds(w: &mut BoltWorld) {
    assert!(
        w.dispatch_ok,
        "expected dispatch to succeed, got error code {:?}",
        w.dispatch_error_code
    );
}

#[then("the dispatch fails with an authorization error")]
async fn then_dispatch_fails_with_authorization(w: &mut BoltWorld) {
    assert!(!w.dispatch_ok);
    assert_eq!(w.dispatch_error_code, Some(ErrorCode::Authorization));
}

#[then("the event is acknowledged with an empty body")]
async fn then_acked_empty(w: &mut BoltWorld) {
    assert_eq!(w.ack_status, Some(200));
    assert_eq!(w.ack_body, Some(AckResponse::Empty));
}

#[then(expr = "the listener observed command text {string}")]
async fn then_command_text(w: &mut BoltWorld, text: String) {
    assert_eq!(*w.captured_text.lock().unwrap(), Some(text));
}

#[then(expr = "the regex capture for {string} is {string}")]
async fn then_regex_capture(w: &mut BoltWorld, key: String, value: String) {
    let matches = w.captured_matches.lock().unwrap();
    let matches = matches.as_ref().expect("no regex captures were recorded");
    assert_eq!(matches.get(&key).map(String::as_str), Some(value.as_str()));
}

#[then("the first ack succeeds")]
async fn then_first_ack_succeeds(w: &mut BoltWorld) {
    assert_eq!(*w.first_ack_ok.lock().unwrap(), Some(true));
}

#[then("the second ack fails with a multiple-ack error")]
async fn then_second_ack_fails(w: &mut BoltWorld) {
    assert_eq!(*w.second_ack_code.lock().unwrap(), Some(ErrorCode::ReceiverMultipleAck));
}

#[then(expr = "the http response status is {int}")]
async fn then_http_status(w: &mut BoltWorld, status: u16) {
    assert_eq!(w.http_status, Some(status));
}

#[then(expr = "the http response body is {string}")]
async fn then_http_body(w: &mut BoltWorld, body: String) {
    assert_eq!(w.http_body.as_deref(), Some(body.as_str()));
}

#[then("the second event's context never saw the first event's custom property")]
async fn then_isolation_holds(w: &mut BoltWorld) {
    let observations = w.isolation_observations.lock().unwrap();
    assert_eq!(
        observations.as_slice(),
        &[false, false],
        "a later event's context must never observe an earlier event's custom property"
    );
}

#[then("the authorize callback was never invoked")]
async fn then_authorize_never_invoked(w: &mut BoltWorld) {
    assert_eq!(w.authorize_calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    BoltWorld::run("tests/features").await;
}
