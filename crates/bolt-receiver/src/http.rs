//! Reference HTTP receiver.
//!
//! Every family is posted to the single `/slack/events` route and
//! distinguished downstream by [`bolt_payload::classify_value`] — the same
//! shape Slack's own HTTP endpoints use. Request-id tagging, structured
//! request logging, and CORS follow the same layered-middleware shape as
//! the rest of this workspace's control-plane APIs.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bolt_ack::{AckCoordinator, AckSignal};
use bolt_app::App;
use bolt_core::{AckResponse, ReceiverEvent};
use bolt_error::BoltError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// How long the HTTP receiver waits for `ack()` before answering with the
/// unhandled-request fallback. Matches the ack SLA interactive Slack
/// payloads are held to.
const ACK_DEADLINE: Duration = Duration::from_secs(3);

/// Signature timestamps older or newer than this are rejected outright, to
/// guard against replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// CORS policy for the HTTP receiver's router.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Allowed origins. Empty means permissive (any origin) — the common
    /// case for a receiver that only ever talks to Slack's servers, which
    /// don't send `Origin` headers subject to browser CORS at all; this
    /// only matters for apps that also expose the endpoint to browser code.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Build the `tower_http` layer this config describes.
    #[must_use]
    pub fn to_cors_layer(&self) -> CorsLayer {
        if self.allowed_origins.is_empty() {
            return CorsLayer::permissive();
        }
        let origins: Vec<_> = self
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

#[derive(Clone)]
struct HttpReceiverState {
    app: Arc<App>,
    signing_secret: Option<Arc<String>>,
}

fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), BoltError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| BoltError::ReceiverAuthenticityError {
            message: "x-slack-request-timestamp is not a valid integer".to_string(),
        })?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(BoltError::ReceiverAuthenticityError {
            message: "request timestamp is outside the tolerance window".to_string(),
        });
    }

    let base = format!("v0:{timestamp}:{}", String::from_utf8_lossy(body));
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    mac.update(base.as_bytes());
    let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
        Ok(())
    } else {
        Err(BoltError::ReceiverAuthenticityError {
            message: "signature mismatch".to_string(),
        })
    }
}

fn lowercase_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn signal_to_response(signal: AckSignal) -> Response {
    let status = StatusCode::from_u16(signal.status).unwrap_or(StatusCode::OK);
    match signal.body {
        AckResponse::Empty => status.into_response(),
        AckResponse::Text(text) => (status, text).into_response(),
        AckResponse::Json(value) => (status, Json(value)).into_response(),
    }
}

async fn handle_event(
    State(state): State<HttpReceiverState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.signing_secret {
        let timestamp = headers
            .get("x-slack-request-timestamp")
            .and_then(|v| v.to_str().ok());
        let signature = headers.get("x-slack-signature").and_then(|v| v.to_str().ok());
        match (timestamp, signature) {
            (Some(timestamp), Some(signature)) => {
                if let Err(err) = verify_signature(secret, timestamp, &body, signature) {
                    warn!(target: "bolt.receiver", %err, "rejecting unauthenticated request");
                    return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
                }
            }
            _ => {
                return (StatusCode::UNAUTHORIZED, "missing signature headers").into_response();
            }
        }
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let value = match bolt_payload::decode_body(&body, content_type) {
        Ok(v) => v,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    if value.get("ssl_check").is_some() {
        return StatusCode::OK.into_response();
    }

    if value.get("type").and_then(|t| t.as_str()) == Some("url_verification") {
        let challenge = value
            .get("challenge")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        return (StatusCode::OK, challenge).into_response();
    }

    let is_event_family = bolt_payload::classify_value(value.clone())
        .family
        .auto_acknowledges_by_default();

    let (coordinator, rx) = AckCoordinator::new();
    let event = ReceiverEvent::new(value)
        .with_ack(coordinator.ack_fn())
        .with_headers(lowercase_headers(&headers));

    let app = state.app.clone();
    let dispatch = tokio::spawn(async move { app.process_event(event).await });

    // `biased` so a genuine ack always wins over the dispatch task simply
    // finishing — a listener acking and then doing more work afterward
    // (processBeforeResponse=false) must not race with its own completion.
    // Dropping the losing `dispatch` branch doesn't cancel it: the task
    // keeps running in the background after the response is sent.
    tokio::select! {
        biased;
        signal = AckCoordinator::wait(rx, Some(ACK_DEADLINE)) => signal_to_response(signal),
        joined = dispatch => match joined {
            Ok(Err(err)) => {
                warn!(target: "bolt.receiver", %err, "dispatch failed before any ack");
                (status_from_error(&err, is_event_family), err.to_string()).into_response()
            }
            _ => StatusCode::NOT_FOUND.into_response(),
        },
    }
}

/// Maps a dispatch failure to the HTTP status the receiver answers with.
/// Authorization failures are `401` for event payloads but `500` for
/// interactive ones (commands/actions/etc.), matching how those families
/// otherwise report errors through their own ack contract rather than the
/// bare HTTP status.
fn status_from_error(err: &BoltError, is_event_family: bool) -> StatusCode {
    match err.category() {
        bolt_error::ErrorCategory::Authorization if is_event_family => StatusCode::UNAUTHORIZED,
        bolt_error::ErrorCategory::Authorization => StatusCode::INTERNAL_SERVER_ERROR,
        bolt_error::ErrorCategory::Parse => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Clone, Copy)]
struct RequestId(Uuid);

async fn request_id_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let id = Uuid::new_v4();
    req.extensions_mut().insert(RequestId(id));
    let mut response = next.run(req).await;
    if let Ok(value) = id.to_string().parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

async fn request_logger_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    info!(
        target: "bolt.receiver",
        http.method = %method,
        http.path = %path,
        http.status = response.status().as_u16(),
        http.duration_ms = start.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

/// Build the axum router for a receiver backed by `app`, independent of
/// binding a socket — used directly by [`HttpReceiver`] and by tests driving
/// the router with `tower::ServiceExt::oneshot`.
#[must_use]
pub fn build_router(app: Arc<App>, signing_secret: Option<String>, cors: &CorsConfig) -> Router {
    let state = HttpReceiverState {
        app,
        signing_secret: signing_secret.map(Arc::new),
    };
    Router::new()
        .route("/slack/events", post(handle_event))
        .with_state(state)
        .layer(middleware::from_fn(request_logger_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors.to_cors_layer())
}

/// Binds `/slack/events` over HTTP: signature verification, the
/// `url_verification`/`ssl_check` short-circuits, and bridging every other
/// inbound request into [`App::process_event`].
pub struct HttpReceiver {
    bind_addr: String,
    signing_secret: Option<String>,
    cors: CorsConfig,
    app: Option<Arc<App>>,
    server: Option<JoinHandle<()>>,
}

impl HttpReceiver {
    /// Create a receiver that will bind `bind_addr` (e.g. `"0.0.0.0:3000"`)
    /// once started. Signature verification is skipped until
    /// [`HttpReceiver::with_signing_secret`] is set.
    #[must_use]
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            signing_secret: None,
            cors: CorsConfig::default(),
            app: None,
            server: None,
        }
    }

    /// Enable signature verification with the given signing secret.
    #[must_use]
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    /// Override the default permissive CORS policy.
    #[must_use]
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    /// Build the router this receiver would serve, for use in tests without
    /// binding a real socket. Returns `None` until [`Receiver::init`] runs.
    #[must_use]
    pub fn router(&self) -> Option<Router> {
        self.app
            .clone()
            .map(|app| build_router(app, self.signing_secret.clone(), &self.cors))
    }
}

#[async_trait]
impl crate::Receiver for HttpReceiver {
    fn init(&mut self, app: Arc<App>) {
        self.app = Some(app);
    }

    async fn start(&mut self) -> Result<(), BoltError> {
        let app = self
            .app
            .clone()
            .ok_or_else(|| BoltError::app_init("HttpReceiver::start called before init"))?;
        let router = build_router(app, self.signing_secret.clone(), &self.cors);
        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|e| BoltError::app_init_with_source(format!("bind {}", self.bind_addr), e))?;
        info!(bind = %self.bind_addr, "http receiver listening");

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(target: "bolt.receiver", %err, "http receiver server error");
            }
        });
        self.server = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), BoltError> {
        if let Some(handle) = self.server.take() {
            handle.abort();
        }
        Ok(())
    }
}
