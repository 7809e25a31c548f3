/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anikai_relay::{build_app, config::load_config, upstream::HttpUpstream, AppState};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().context("log directive")?),
        )
        .init();

    let cfg = load_config()?;
    let upstream = HttpUpstream::new(
        &cfg.upstream_base_url,
        Duration::from_secs(cfg.upstream_timeout_secs),
        Duration::from_secs(cfg.upstream_connect_timeout_secs),
    )?;

    let addr = cfg.bind;
    info!(upstream = %cfg.upstream_base_url, "relaying catalog api");
    if cfg.allowed_origins.is_empty() {
        info!("cors: any origin");
    } else {
        info!(origins = ?cfg.allowed_origins, "cors: allow-list");
    }
    info!(
        window_secs = cfg.rate_limit_window_secs,
        max = cfg.rate_limit_max,
        "rate limit per client address"
    );

    let state = AppState::new(cfg, Arc::new(upstream));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("anikai_relay listening on http://{addr}");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    info!("anikai_relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown requested");
}
