//! AWS Lambda request adapter.
//!
//! Shapes an API Gateway / Lambda Function URL request payload into a
//! [`ReceiverEvent`]. Wiring an actual `lambda_runtime` handler around this
//! conversion is left to the embedder — this crate only owns the shape of
//! the translation, not the Lambda bootstrap itself.

use bolt_core::ReceiverEvent;
use std::collections::BTreeMap;

/// A Lambda-style inbound request: headers with possibly-mixed case, and a
/// body that may be base64-encoded (API Gateway does this for binary or
/// `isBase64Encoded: true` payloads).
#[derive(Debug, Clone)]
pub struct LambdaRequest {
    /// Raw header map as delivered by the Lambda event, case as received.
    pub headers: BTreeMap<String, String>,
    /// Request body, exactly as delivered (still base64-encoded if
    /// `is_base64_encoded` is set).
    pub body: String,
    /// Whether `body` is base64-encoded.
    pub is_base64_encoded: bool,
}

/// Failure decoding a [`LambdaRequest`] into a [`ReceiverEvent`].
#[derive(Debug, thiserror::Error)]
pub enum LambdaConversionError {
    /// `is_base64_encoded` was set but `body` isn't valid base64.
    #[error("lambda request body is not valid base64")]
    InvalidBase64,
    /// The body couldn't be decoded into a JSON value (includes bodies that
    /// aren't valid UTF-8, which `decode_body` rejects as a parse failure).
    #[error("lambda request body could not be parsed: {0}")]
    Parse(#[from] bolt_error::BoltError),
}

impl LambdaRequest {
    /// Decode this request's body and normalize its headers to lower-case
    /// keys, matching the shape every other receiver hands to
    /// [`bolt_app::App::process_event`].
    pub fn into_receiver_event(self) -> Result<ReceiverEvent, LambdaConversionError> {
        let raw = if self.is_base64_encoded {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(self.body.as_bytes())
                .map_err(|_| LambdaConversionError::InvalidBase64)?
        } else {
            self.body.into_bytes()
        };

        let headers: BTreeMap<String, String> = self
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let content_type = headers.get("content-type").map(String::as_str);

        let value = bolt_payload::decode_body(&raw, content_type)?;
        Ok(ReceiverEvent::new(value).with_headers(headers))
    }
}
