// SPDX-License-Identifier: MIT OR Apache-2.0
//! The receiver contract and a reference HTTP receiver.
//!
//! A [`Receiver`] owns a transport's lifecycle and translates whatever it
//! hears into [`bolt_core::ReceiverEvent`]s handed to [`bolt_app::App`].
//! [`http::HttpReceiver`] is the only receiver actually wired to a socket in
//! this workspace; [`socket::SocketModeReceiver`] is declared so the trait
//! boundary is visible but deliberately unimplemented (see its docs).

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// AWS Lambda request adapter.
pub mod lambda;
/// Socket Mode receiver (unimplemented stub).
pub mod socket;
/// Reference HTTP receiver: axum router, signature verification, middleware.
pub mod http;

use async_trait::async_trait;
use bolt_app::App;
use bolt_error::BoltError;
use std::sync::Arc;

pub use http::{CorsConfig, HttpReceiver};
pub use socket::SocketModeReceiver;

/// A transport that feeds inbound events to an [`App`].
///
/// `init` is called once, before `start`; `start` begins listening and
/// normally runs until `stop` is called or the process exits. Implementors
/// own their own concurrency — `start` may spawn tasks and return once the
/// transport is accepting traffic, or it may run the listen loop inline and
/// only return on shutdown, matching whatever the underlying transport
/// naturally does.
#[async_trait]
pub trait Receiver: Send {
    /// Attach the app this receiver will dispatch events to. Called once,
    /// before [`Receiver::start`].
    fn init(&mut self, app: Arc<App>);

    /// Begin accepting traffic.
    async fn start(&mut self) -> Result<(), BoltError>;

    /// Stop accepting traffic. Idempotent: stopping a receiver that isn't
    /// running is not an error.
    async fn stop(&mut self) -> Result<(), BoltError>;
}
