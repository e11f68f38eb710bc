// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `App`: wires the payload classifier, authorization resolver, and
//! listener router into one [`App::process_event`] entry point, and enforces
//! that registration only happens before [`App::start`] — global
//! middlewares, listener tables, and configuration are immutable once the
//! app is running.
//!
//! Lifecycle enforcement here is a restricted, two-state instance of a
//! register-then-run shape: registration is only legal in the `Building`
//! state, and `start()` is the one-way transition into `Running`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bolt_auth::Authorize;
use bolt_core::{Family, ReceiverEvent};
use bolt_error::BoltError;
use bolt_payload::classify_value;
use bolt_pipeline::Middleware;
use bolt_router::{DispatchState, ListenerConstraint, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

pub use bolt_core::{RespondFn, SayFn};

/// Receives every error that escapes a dispatch (chain failures,
/// authorization failures) that the chain itself didn't recover from — a
/// single, app-wide error handler.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Observe an error. Cannot itself fail; log and move on.
    async fn handle(&self, error: &BoltError);
}

/// Default error handler: logs at `error` level via `tracing` and nothing
/// else, matching the "observability is ambient, not optional" posture the
/// rest of this workspace takes.
#[derive(Debug, Default)]
pub struct LoggingErrorHandler;

#[async_trait]
impl ErrorHandler for LoggingErrorHandler {
    async fn handle(&self, error: &BoltError) {
        error!(target: "bolt.app", code = %error.code(), %error, "dispatch failed");
    }
}

/// Two-state registration/run lifecycle: listener and middleware
/// registration are rejected once the app has started.
struct Lifecycle {
    started: AtomicBool,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }

    fn require_building(&self) -> Result<(), BoltError> {
        if self.started.load(Ordering::SeqCst) {
            Err(BoltError::app_init(
                "cannot register middleware or listeners after the app has started",
            ))
        } else {
            Ok(())
        }
    }

    fn start(&self) -> Result<(), BoltError> {
        if self.started.swap(true, Ordering::SeqCst) {
            Err(BoltError::app_init("app has already started"))
        } else {
            Ok(())
        }
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// Ties the payload classifier, authorization resolver, and listener router
/// together — classify, authorize, and dispatch, composed end to end.
pub struct App {
    authorize: Arc<dyn Authorize>,
    router: Router,
    error_handler: RwLock<Arc<dyn ErrorHandler>>,
    lifecycle: Lifecycle,
}

impl App {
    /// Construct an app around an already-built [`Authorize`] resolver
    /// (single-workspace static tokens, a callback, or an installation
    /// store).
    #[must_use]
    pub fn new(authorize: Arc<dyn Authorize>) -> Self {
        Self {
            authorize,
            router: Router::new(),
            error_handler: RwLock::new(Arc::new(LoggingErrorHandler)),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Register a global middleware. Rejected once the app has started.
    pub fn use_middleware<M: Middleware<DispatchState> + 'static>(
        &mut self,
        middleware: M,
    ) -> Result<(), BoltError> {
        self.lifecycle.require_building()?;
        self.router.use_middleware(middleware);
        Ok(())
    }

    /// Register a listener. Rejected once the app has started, and rejected
    /// at registration time if `constraint` is itself invalid (e.g. a
    /// dotted compound event name on a plain `Event` listener).
    pub fn register(
        &mut self,
        family: Family,
        constraint: ListenerConstraint,
        handler: Arc<dyn Middleware<DispatchState>>,
    ) -> Result<(), BoltError> {
        self.lifecycle.require_building()?;
        self.router.register(family, constraint, handler)
    }

    /// Override whether `family` auto-acknowledges. Rejected once started.
    pub fn set_auto_acknowledge(&mut self, family: Family, enabled: bool) -> Result<(), BoltError> {
        self.lifecycle.require_building()?;
        self.router.set_auto_acknowledge(family, enabled);
        Ok(())
    }

    /// Disable the auto-ignoreSelf built-in. Rejected once started.
    pub fn disable_ignore_self(&mut self) -> Result<(), BoltError> {
        self.lifecycle.require_building()?;
        self.router.disable_ignore_self();
        Ok(())
    }

    /// Replace the app-wide error handler. Rejected once started.
    pub async fn set_error_handler(&mut self, handler: Arc<dyn ErrorHandler>) -> Result<(), BoltError> {
        self.lifecycle.require_building()?;
        *self.error_handler.write().await = handler;
        Ok(())
    }

    /// Transition out of the registration window. Idempotent calls fail
    /// with [`BoltError::AppInitializationError`].
    pub fn start(&self) -> Result<(), BoltError> {
        self.lifecycle.start()
    }

    /// Whether [`App::start`] has already run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    /// Classify, authorize, and dispatch one inbound event end to end. Any
    /// error is reported to the configured [`ErrorHandler`] before being
    /// returned to the caller — the receiver decides what status that
    /// becomes.
    pub async fn process_event(&self, event: ReceiverEvent) -> Result<(), BoltError> {
        if !self.is_started() {
            let err = BoltError::app_init("process_event called before App::start");
            self.report(&err).await;
            return Err(err);
        }

        let classified = classify_value(event.body.clone());
        let span = tracing::info_span!(
            "bolt.dispatch",
            family = %classified.family,
            event_type = classified.event_type.as_deref().unwrap_or("none"),
        );
        let _entered = span.enter();

        let mut context = match bolt_auth::resolve_context(&classified, self.authorize.as_ref()).await {
            Ok(context) => context,
            Err(err) => {
                self.report(&err).await;
                return Err(err);
            }
        };
        if let Some(retry_num) = event.retry_num {
            context.set_custom("retry_num", retry_num);
        }
        if let Some(retry_reason) = &event.retry_reason {
            context.set_custom("retry_reason", retry_reason);
        }

        let result = self
            .router
            .dispatch(&classified, context, event.ack.clone(), event.say.clone(), event.respond.clone())
            .await;
        if let Err(err) = &result {
            self.report(err).await;
        }
        result
    }

    async fn report(&self, err: &BoltError) {
        self.error_handler.read().await.handle(err).await;
    }
}
