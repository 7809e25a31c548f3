/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::{routing::get, Router};
use std::sync::Arc;

pub mod config;
pub mod edge;
pub mod error;
pub mod routes;
pub mod upstream;

use config::RelayConfig;
use edge::RateLimiter;
use upstream::CatalogUpstream;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<RelayConfig>,
    pub upstream: Arc<dyn CatalogUpstream>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(cfg: RelayConfig, upstream: Arc<dyn CatalogUpstream>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&cfg));
        Self {
            cfg: Arc::new(cfg),
            upstream,
            limiter,
        }
    }
}

/// Full relay application: `/` plus the `/api` surface behind the edge layers.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(routes::index))
        .nest("/api", routes::api_router());
    edge::apply(router, state)
}
