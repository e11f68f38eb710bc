//! Socket Mode receiver — declared, not implemented.

use crate::Receiver;
use async_trait::async_trait;
use bolt_app::App;
use bolt_error::BoltError;
use std::sync::Arc;

/// A Socket Mode receiver would open a websocket to Slack's Socket Mode
/// gateway, ack envelopes over that same socket, and never bind a local
/// port. That transport isn't implemented here: it needs a websocket client
/// and an app-level token exchange this workspace doesn't otherwise touch.
/// The type exists so the [`Receiver`] boundary has a second, honestly
/// unimplemented member rather than only ever being exercised by
/// [`crate::HttpReceiver`].
#[derive(Debug, Default)]
pub struct SocketModeReceiver;

impl SocketModeReceiver {
    /// Build a Socket Mode receiver. Takes no app-level token today since
    /// `start`/`stop` don't yet open a websocket to consume it — a real
    /// implementation would add one here.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Receiver for SocketModeReceiver {
    fn init(&mut self, _app: Arc<App>) {}

    async fn start(&mut self) -> Result<(), BoltError> {
        Err(BoltError::unknown(SocketModeUnimplemented))
    }

    async fn stop(&mut self) -> Result<(), BoltError> {
        Err(BoltError::unknown(SocketModeUnimplemented))
    }
}

#[derive(Debug)]
struct SocketModeUnimplemented;

impl std::fmt::Display for SocketModeUnimplemented {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Socket Mode receiver is not implemented; use HttpReceiver or bring your own websocket transport"
        )
    }
}

impl std::error::Error for SocketModeUnimplemented {}
