// SPDX-License-Identifier: MIT OR Apache-2.0
//! Minimal CLI bootstrap: load an [`bolt_config::AppConfig`], wire up a
//! [`bolt_receiver::HttpReceiver`], and run until interrupted.
//!
//! This binary exists to prove the crates compose end to end; a real app
//! embeds `bolt-app`/`bolt-receiver` directly and registers its own
//! listeners instead of running this bare command.

use anyhow::{Context, Result};
use bolt_app::App;
use bolt_auth::StaticTokenAuthorize;
use bolt_config::AppConfig;
use bolt_receiver::{HttpReceiver, Receiver};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bolt", version, about = "Slack Bolt (Rust) reference bootstrap")]
struct Args {
    /// Path to a TOML config file. Falls back to defaults plus environment
    /// overrides when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for the reference HTTP receiver.
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("bolt=debug")
    } else {
        EnvFilter::new("bolt=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = bolt_config::load_config(args.config.as_deref())
        .with_context(|| "loading configuration")?;
    bolt_config::apply_env_overrides(&mut config);
    for warning in bolt_config::validate_config(&config).with_context(|| "validating configuration")? {
        tracing::warn!(target: "bolt.cli", %warning, "configuration warning");
    }
    let config = config.finalize().with_context(|| "validating credential configuration")?;

    let authorize = match &config.bot_token {
        Some(token) => Arc::new(StaticTokenAuthorize::without_verification(token.clone())),
        None => anyhow::bail!("no bot_token configured and no custom authorize resolver wired in"),
    };

    let mut app = App::new(authorize);
    app.start().with_context(|| "starting app")?;
    let app = Arc::new(app);

    let mut receiver = HttpReceiver::new(args.bind.clone());
    if let Some(secret) = &config.signing_secret {
        receiver = receiver.with_signing_secret(secret.clone());
    }
    receiver.init(app);
    receiver.start().await.with_context(|| "starting http receiver")?;

    tracing::info!(target: "bolt.cli", bind = %args.bind, "bolt is running");
    tokio::signal::ctrl_c().await.with_context(|| "waiting for shutdown signal")?;
    receiver.stop().await.with_context(|| "stopping http receiver")?;
    Ok(())
}
