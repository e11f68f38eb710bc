// SPDX-License-Identifier: MIT OR Apache-2.0
//! Acknowledgment coordinator.
//!
//! Per-event state — `acked`, the stored response, and the deadline timer —
//! is confined to one [`AckCoordinator`] and never shared across events.
//! `ack()` may be called by exactly one listener or middleware; a second
//! call fails with [`BoltError::ReceiverMultipleAckError`] without ever
//! touching the transport signal a second time.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use bolt_core::{AckFn, AckResponse};
use bolt_error::BoltError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::warn;

/// What the transport should do once the chain's verdict is known: an HTTP
/// status and a body. Transports with no status concept (Socket Mode) only
/// read `.body`.
#[derive(Debug, Clone)]
pub struct AckSignal {
    /// HTTP status code the receiver should answer with.
    pub status: u16,
    /// Response body.
    pub body: AckResponse,
}

impl AckSignal {
    /// A plain `200` with the given body.
    #[must_use]
    pub fn ok(body: AckResponse) -> Self {
        Self { status: 200, body }
    }

    /// The default unhandled-request fallback: `404` with an empty body.
    #[must_use]
    pub fn unhandled() -> Self {
        Self {
            status: 404,
            body: AckResponse::Empty,
        }
    }
}

/// Coordinates the at-most-once `ack()` contract for a single inbound
/// event.
///
/// Construct one per dispatched event, obtain the [`AckFn`] capability via
/// [`AckCoordinator::ack_fn`] to hand to the router/listeners, and await the
/// outcome via [`AckCoordinator::wait`].
pub struct AckCoordinator {
    acked: AtomicBool,
    tx: std::sync::Mutex<Option<oneshot::Sender<AckSignal>>>,
}

impl AckCoordinator {
    /// Create a coordinator with no ack observed yet.
    #[must_use]
    pub fn new() -> (Arc<Self>, oneshot::Receiver<AckSignal>) {
        let (tx, rx) = oneshot::channel();
        let coordinator = Arc::new(Self {
            acked: AtomicBool::new(false),
            tx: std::sync::Mutex::new(Some(tx)),
        });
        (coordinator, rx)
    }

    /// Whether `ack` has already fired for this event.
    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }

    /// Build the [`AckFn`] capability to hand to a listener's argument
    /// bundle. Calling it a second time returns
    /// [`BoltError::ReceiverMultipleAckError`] and never re-signals the
    /// transport.
    #[must_use]
    pub fn ack_fn(self: &Arc<Self>) -> AckFn {
        let coordinator = self.clone();
        Arc::new(move |response: AckResponse| {
            let coordinator = coordinator.clone();
            Box::pin(async move { coordinator.ack(response).await })
        })
    }

    /// Acknowledge directly (used by the router's `autoAck` built-in and by
    /// tests that don't go through the [`AckFn`] wrapper).
    pub async fn ack(&self, response: AckResponse) -> Result<(), BoltError> {
        if self.acked.swap(true, Ordering::SeqCst) {
            warn!(target: "bolt.ack", "multiple ack observed for one event");
            return Err(BoltError::ReceiverMultipleAckError);
        }
        let sender = self.tx.lock().expect("ack coordinator mutex poisoned").take();
        if let Some(sender) = sender {
            let _ = sender.send(AckSignal::ok(response));
        }
        Ok(())
    }

    /// Wait for `ack()` to fire, or for `deadline` to elapse. `None`
    /// deadline waits indefinitely (Socket Mode's unbounded default).
    ///
    /// Consumes the receiver half produced alongside this coordinator;
    /// intended to be called once, after the dispatch future (for
    /// `processBeforeResponse=true`) or concurrently with it (for the
    /// default `processBeforeResponse=false`).
    pub async fn wait(rx: oneshot::Receiver<AckSignal>, deadline: Option<Duration>) -> AckSignal {
        match deadline {
            None => rx.await.unwrap_or_else(|_| AckSignal::unhandled()),
            Some(deadline) => tokio::select! {
                biased;
                signal = rx => signal.unwrap_or_else(|_| AckSignal::unhandled()),
                () = tokio::time::sleep(deadline) => AckSignal::unhandled(),
            },
        }
    }
}
