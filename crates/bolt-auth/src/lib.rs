// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authorization resolver: turns a classified payload into a fully
//! populated [`Context`], or a typed failure that always wraps its cause.
//!
//! An app is configured with exactly one [`Authorize`] implementation —
//! [`StaticTokenAuthorize`] for a single-workspace static token,
//! [`CallbackAuthorize`] for a user-supplied callback, or
//! [`InstallationStoreAuthorize`] for a multi-workspace [`InstallationStore`].
//! `bolt-config` enforces the token-XOR-authorize invariant at construction
//! time; this crate only ever sees the one resolver that was configured.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bolt_core::AUTHORIZATION_SKIP_EVENT_TYPES;
use bolt_error::BoltError;
use bolt_payload::ClassifiedPayload;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Identifiers extracted from a classified payload and handed to an
/// [`Authorize`] implementation.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeArgs {
    /// Workspace ID, if extractable from the body.
    pub team_id: Option<String>,
    /// Enterprise Grid organization ID, if extractable.
    pub enterprise_id: Option<String>,
    /// Triggering user ID, if extractable.
    pub user_id: Option<String>,
    /// Conversation/channel ID, as classified by `bolt-payload`.
    pub conversation_id: Option<String>,
    /// Resolved enterprise-install flag.
    pub is_enterprise_install: bool,
    /// The original parsed body, for resolvers that need more than the
    /// extracted identifiers.
    pub body: Value,
}

impl AuthorizeArgs {
    /// Build the identifier bundle from a classified payload.
    #[must_use]
    pub fn from_classified(c: &ClassifiedPayload) -> Self {
        Self {
            team_id: c.body.get("team_id").and_then(Value::as_str).map(str::to_string),
            enterprise_id: c
                .body
                .get("enterprise_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            user_id: c.body.get("user_id").and_then(Value::as_str).map(str::to_string),
            conversation_id: c.conversation_id.clone(),
            is_enterprise_install: c.is_enterprise_install,
            body: c.body.clone(),
        }
    }
}

/// Credentials resolved for one inbound event.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeResult {
    /// Bot token, if this install has one.
    pub bot_token: Option<String>,
    /// User token, if this install has one.
    pub user_token: Option<String>,
    /// App/bot identity.
    pub bot_id: Option<String>,
    /// Bot user ID.
    pub bot_user_id: Option<String>,
}

/// An authorization resolver: identifiers in, credentials out.
#[async_trait]
pub trait Authorize: Send + Sync {
    /// Resolve credentials for one event. Must wrap the underlying cause
    /// rather than swallow it.
    async fn authorize(&self, args: &AuthorizeArgs) -> Result<AuthorizeResult, BoltError>;
}

/// The platform's `auth.test`-shaped identity check, abstracted so
/// [`StaticTokenAuthorize`] doesn't hard-depend on a concrete HTTP client.
#[async_trait]
pub trait AuthTestClient: Send + Sync {
    /// Verify `token` and return its resolved identity.
    async fn auth_test(&self, token: &str) -> Result<AuthorizeResult, BoltError>;
}

/// Resolver backed by a single statically configured token.
///
/// The resolved identity is cached after the first successful `auth.test`
/// call, unless token verification is disabled, in which case the token is
/// returned unverified on every call.
pub struct StaticTokenAuthorize {
    token: String,
    client: Option<Arc<dyn AuthTestClient>>,
    cached: RwLock<Option<AuthorizeResult>>,
}

impl StaticTokenAuthorize {
    /// Build a resolver that verifies the token via `client` once and caches
    /// the identity.
    #[must_use]
    pub fn new(token: impl Into<String>, client: Arc<dyn AuthTestClient>) -> Self {
        Self {
            token: token.into(),
            client: Some(client),
            cached: RwLock::new(None),
        }
    }

    /// Build a resolver that skips token verification entirely. The returned
    /// identity carries the token as `bot_token` with no `bot_id`/`bot_user_id`.
    #[must_use]
    pub fn without_verification(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: None,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl Authorize for StaticTokenAuthorize {
    async fn authorize(&self, _args: &AuthorizeArgs) -> Result<AuthorizeResult, BoltError> {
        let Some(client) = &self.client else {
            return Ok(AuthorizeResult {
                bot_token: Some(self.token.clone()),
                ..AuthorizeResult::default()
            });
        };

        if let Some(cached) = self.cached.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let mut guard = self.cached.write().await;
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.clone());
        }
        let identity = client.auth_test(&self.token).await?;
        let resolved = AuthorizeResult {
            bot_token: Some(self.token.clone()),
            ..identity
        };
        *guard = Some(resolved.clone());
        Ok(resolved)
    }
}

/// Resolver backed by a user-supplied async callback. Fails with
/// [`BoltError::AuthorizationError`] if the callback returns an error or
/// `None`.
pub struct CallbackAuthorize<F> {
    callback: F,
}

impl<F> CallbackAuthorize<F>
where
    F: Fn(
            AuthorizeArgs,
        ) -> futures::future::BoxFuture<'static, Result<Option<AuthorizeResult>, BoltError>>
        + Send
        + Sync,
{
    /// Wrap a callback as an [`Authorize`] resolver.
    #[must_use]
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> Authorize for CallbackAuthorize<F>
where
    F: Fn(
            AuthorizeArgs,
        ) -> futures::future::BoxFuture<'static, Result<Option<AuthorizeResult>, BoltError>>
        + Send
        + Sync,
{
    async fn authorize(&self, args: &AuthorizeArgs) -> Result<AuthorizeResult, BoltError> {
        match (self.callback)(args.clone()).await {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(BoltError::authorization(
                "authorize callback returned no credentials",
            )),
            Err(e) => Err(BoltError::authorization_with_source(
                "authorize callback failed",
                e,
            )),
        }
    }
}

/// A durable record of one workspace's installation, as returned by an
/// [`InstallationStore`].
#[derive(Debug, Clone, Default)]
pub struct Installation {
    /// Bot token for this install, if any.
    pub bot_token: Option<String>,
    /// User token for this install, if any.
    pub user_token: Option<String>,
    /// App/bot identity.
    pub bot_id: Option<String>,
    /// Bot user ID.
    pub bot_user_id: Option<String>,
}

/// A store of per-workspace installations, queried by the resolved
/// identifiers.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    /// Look up the installation for the given identifiers.
    async fn find(&self, args: &AuthorizeArgs) -> Result<Option<Installation>, BoltError>;
}

/// Resolver backed by an [`InstallationStore`].
pub struct InstallationStoreAuthorize {
    store: Arc<dyn InstallationStore>,
}

impl InstallationStoreAuthorize {
    /// Wrap a store as an [`Authorize`] resolver.
    #[must_use]
    pub fn new(store: Arc<dyn InstallationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authorize for InstallationStoreAuthorize {
    async fn authorize(&self, args: &AuthorizeArgs) -> Result<AuthorizeResult, BoltError> {
        match self.store.find(args).await {
            Ok(Some(install)) => Ok(AuthorizeResult {
                bot_token: install.bot_token,
                user_token: install.user_token,
                bot_id: install.bot_id,
                bot_user_id: install.bot_user_id,
            }),
            Ok(None) => Err(BoltError::authorization(format!(
                "no installation found for team_id={:?} enterprise_id={:?}",
                args.team_id, args.enterprise_id
            ))),
            Err(e) => Err(BoltError::authorization_with_source(
                "installation store lookup failed",
                e,
            )),
        }
    }
}

/// An in-memory [`InstallationStore`] reference implementation, keyed by
/// `team_id` (falling back to `enterprise_id` for org-wide installs).
#[derive(Default)]
pub struct MemoryInstallationStore {
    by_team: RwLock<std::collections::BTreeMap<String, Installation>>,
}

impl MemoryInstallationStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the installation for `key` (a `team_id` or
    /// `enterprise_id`).
    pub async fn put(&self, key: impl Into<String>, installation: Installation) {
        self.by_team.write().await.insert(key.into(), installation);
    }
}

#[async_trait]
impl InstallationStore for MemoryInstallationStore {
    async fn find(&self, args: &AuthorizeArgs) -> Result<Option<Installation>, BoltError> {
        let map = self.by_team.read().await;
        if let Some(team_id) = &args.team_id {
            if let Some(install) = map.get(team_id) {
                return Ok(Some(install.clone()));
            }
        }
        if let Some(enterprise_id) = &args.enterprise_id {
            if let Some(install) = map.get(enterprise_id) {
                return Ok(Some(install.clone()));
            }
        }
        Ok(None)
    }
}

/// Resolve a fully populated [`Context`] for a classified payload.
///
/// Events whose `event_type` is in [`AUTHORIZATION_SKIP_EVENT_TYPES`] bypass
/// the resolver entirely and return an otherwise-empty `Context` with only
/// `is_enterprise_install` copied from the body.
pub async fn resolve_context(
    classified: &ClassifiedPayload,
    resolver: &dyn Authorize,
) -> Result<bolt_core::Context, BoltError> {
    let mut context = bolt_core::Context::new();
    context.is_enterprise_install = classified.is_enterprise_install;
    context.channel_id = classified.conversation_id.clone();
    context.channel_type = classified
        .body
        .pointer("/event/channel_type")
        .and_then(Value::as_str)
        .map(str::to_string);

    if classified
        .event_type
        .as_deref()
        .map(|t| AUTHORIZATION_SKIP_EVENT_TYPES.contains(&t))
        .unwrap_or(false)
    {
        return Ok(context);
    }

    let args = AuthorizeArgs::from_classified(classified);
    let result = resolver.authorize(&args).await?;

    context.team_id = args.team_id;
    context.enterprise_id = args.enterprise_id;
    context.user_id = args.user_id;
    context.bot_token = result.bot_token;
    context.user_token = result.user_token;
    context.bot_id = result.bot_id;
    context.bot_user_id = result.bot_user_id;
    context.function_execution_id = classified
        .body
        .pointer("/event/function_execution_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(context)
}
