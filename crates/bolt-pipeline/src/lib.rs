// SPDX-License-Identifier: MIT OR Apache-2.0
//! Middleware chain, generic over the state threaded through it.
//!
//! A [`Middleware<S>`] is handed `&mut S` and a [`Next`] capability that
//! advances the chain exactly once. `S` is the router's dispatch bundle (the
//! shared `Context` plus the inbound body and ack capability) rather than a
//! fixed type here, so the same chain machinery composes global
//! middlewares, built-ins, and listeners without this crate knowing their
//! shape. Not calling `next` is a legitimate way to terminate the chain with
//! no error — it simply means later stages never run. A panic anywhere in
//! the chain is recovered and converted into a [`BoltError::UnknownError`]
//! rather than ever reaching the transport.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bolt_error::BoltError;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of running one middleware stage.
pub type MiddlewareResult = Result<(), BoltError>;

/// A single stage in the chain over dispatch state `S`.
///
/// Global middlewares, built-ins (auto-ack, auto-ignoreSelf,
/// auto-directMention), and matched listeners are all modeled as
/// `Middleware` so the router can compose one flat chain per dispatch.
#[async_trait]
pub trait Middleware<S: Send>: Send + Sync {
    /// Run this stage. Call `next.run(state).await` to advance the chain;
    /// returning without calling it stops the chain with no error.
    async fn call(&self, state: &mut S, next: Next<'_, S>) -> MiddlewareResult;

    /// Human-readable name used in tracing output.
    fn name(&self) -> &str {
        "middleware"
    }
}

/// The capability to advance to the remainder of the chain. Borrowed for the
/// lifetime of one [`Middleware::call`] invocation so it can only be driven
/// forward, never replayed after being consumed.
pub struct Next<'a, S> {
    remaining: &'a [Arc<dyn Middleware<S>>],
}

impl<'a, S: Send> Next<'a, S> {
    fn new(remaining: &'a [Arc<dyn Middleware<S>>]) -> Self {
        Self { remaining }
    }

    /// Advance to the next stage, or terminate the chain successfully if
    /// none remain. Recovers a panic raised anywhere below this point.
    pub async fn run(self, state: &mut S) -> MiddlewareResult {
        let Some((stage, rest)) = self.remaining.split_first() else {
            return Ok(());
        };
        debug!(target: "bolt.pipeline", stage = stage.name(), "invoking");
        let next = Next::new(rest);
        let outcome = std::panic::AssertUnwindSafe(stage.call(state, next))
            .catch_unwind()
            .await;
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(BoltError::unknown(ChainPanic(panic_message(payload)))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "middleware panicked with a non-string payload".to_string()
    }
}

#[derive(Debug)]
struct ChainPanic(String);

impl fmt::Display for ChainPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recovered panic: {}", self.0)
    }
}

impl std::error::Error for ChainPanic {}

/// An ordered, immutable chain of [`Middleware<S>`] stages. Built once and
/// shared across every concurrently processed event; composing a fresh
/// [`Chain`] per dispatch is cheap because stages are reference-counted, not
/// cloned.
pub struct Chain<S> {
    stages: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<S> Default for Chain<S> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<S: Send + 'static> Chain<S> {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage (builder pattern).
    #[must_use]
    pub fn stage<M: Middleware<S> + 'static>(mut self, stage: M) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append an already-shared stage, for composing chains out of stages
    /// registered elsewhere (the router builds one chain per dispatch out of
    /// shared `Arc<dyn Middleware<S>>` listener entries).
    #[must_use]
    pub fn stage_arc(mut self, stage: Arc<dyn Middleware<S>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run the full chain against `state`.
    pub async fn run(&self, state: &mut S) -> MiddlewareResult {
        Next::new(&self.stages).run(state).await
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// A composite error combining the independent failures of multiple
/// listeners matched for the same event: errors from each are aggregated
/// into a composite error surfaced to the app-level error handler, but one
/// listener's error does NOT prevent peers from running.
#[derive(Debug)]
pub struct AggregateError(pub Vec<BoltError>);

impl AggregateError {
    /// Wrap a non-empty set of listener failures. Returns `None` if `errors`
    /// is empty — callers should treat zero failures as success, not as an
    /// empty aggregate.
    #[must_use]
    pub fn from_errors(errors: Vec<BoltError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} listener(s) failed: ", self.0.len())?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.first().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
