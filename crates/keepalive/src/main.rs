// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Soak runner: keeps one WOPI session alive against a real refresh
//! endpoint and prints lifecycle events as JSON lines.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use wopi_keepalive::config::SessionConfig;
use wopi_keepalive::host::LoggingHost;
use wopi_keepalive::token::WopiTokenClient;

#[derive(Debug, Parser)]
#[command(name = "wopi-keepalive", about = "Keep an embedded WOPI editing session alive")]
struct Cli {
    #[command(flatten)]
    config: SessionConfig,

    /// Initial session URL, as the embedded frame would carry it. When it
    /// holds an `access_token_ttl` hint the first refresh is deferred.
    #[arg(long, env = "WOPI_KEEPALIVE_INITIAL_URL")]
    initial_url: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let host = Arc::new(LoggingHost::new(cli.initial_url));
    let tokens = Arc::new(WopiTokenClient::new(cli.config.api_base.clone()));
    let session = wopi_keepalive::start(cli.config, host, tokens);
    let mut events = session.subscribe();

    info!("keepalive session running, ctrl-c to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.destroy();
}
