/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Cross-cutting HTTP policy applied to every route: request ids, security
//! headers, CORS, per-address fixed-window rate limiting, request tracing,
//! panic capture and the 404 fallback.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::{
    any::Any,
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info_span, warn};

static REQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    let id = REQ_ID.fetch_add(1, Ordering::Relaxed);
    format!("req-{id}")
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Wraps `router` in the edge layers. The outermost layer is added last.
pub fn apply(router: Router<AppState>, state: AppState) -> Router {
    let max_body = state.cfg.max_body_bytes;
    let cors = cors_layer(&state.cfg);
    router
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::extract::DefaultBodyLimit::max(max_body))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("req");
                let correlation_id = req
                    .headers()
                    .get("x-correlation-id")
                    .and_then(|v| v.to_str().ok());
                info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                    correlation_id = ?correlation_id
                )
            }),
        )
        .layer(from_fn_with_state(state.clone(), enforce_rate_limit))
        .layer(cors)
        .layer(from_fn_with_state(state.clone(), add_security_headers))
        .layer(from_fn(ensure_request_ids))
        .with_state(state)
}

pub fn cors_layer(cfg: &RelayConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(cors::Any);
    if cfg.allowed_origins.is_empty() {
        return base.allow_origin(cors::Any);
    }
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

pub async fn not_found() -> RelayError {
    RelayError::RouteNotFound
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("handler panicked: {detail}");
    RelayError::Internal(detail).into_response()
}

async fn ensure_request_ids(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = req.headers_mut();
    if headers.get("x-request-id").is_none() {
        let request_id = next_request_id();
        headers.insert(
            "x-request-id",
            HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("req")),
        );
    }
    if headers.get("x-correlation-id").is_none() {
        if let Some(req_id) = headers.get("x-request-id").cloned() {
            headers.insert("x-correlation-id", req_id);
        }
    }
    next.run(req).await
}

async fn add_security_headers(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let request_id = req.headers().get("x-request-id").cloned();
    let correlation = req.headers().get("x-correlation-id").cloned();
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    if let Some(id) = request_id {
        headers.insert("x-request-id", id);
    }
    if let Some(correlation) = correlation {
        headers.insert("x-correlation-id", correlation);
    }
    headers.entry("x-content-type-options").or_insert(HeaderValue::from_static("nosniff"));
    headers.entry("x-frame-options").or_insert(HeaderValue::from_static("DENY"));
    headers.entry("referrer-policy").or_insert(HeaderValue::from_static("no-referrer"));
    headers
        .entry("cross-origin-opener-policy")
        .or_insert(HeaderValue::from_static("same-origin"));
    headers
        .entry("permissions-policy")
        .or_insert(HeaderValue::from_static("geolocation=(), microphone=(), camera=()"));
    if state.cfg.hsts_max_age_secs > 0 {
        let value = format!("max-age={}; includeSubDomains", state.cfg.hsts_max_age_secs);
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("max-age=0")),
        );
    }
    if let Some(csp) = &state.cfg.csp {
        headers.insert(
            "content-security-policy",
            HeaderValue::from_str(csp).unwrap_or_else(|_| HeaderValue::from_static("default-src 'none'")),
        );
    }
    resp
}

async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    // Preflight requests are answered by the CORS layer before reaching here.
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(state.cfg.trust_proxy_headers, peer, req.headers());
    match state.limiter.check(&ip).await {
        RateDecision::Limited { retry_after_secs } => {
            warn!(ip = %ip, "rate limit exceeded");
            RelayError::RateLimited { retry_after_secs }.into_response()
        }
        RateDecision::Allowed {
            limit,
            remaining,
            reset_secs,
        } => {
            let mut resp = next.run(req).await;
            let headers = resp.headers_mut();
            for (name, value) in [
                ("ratelimit-limit", limit as u64),
                ("ratelimit-remaining", remaining as u64),
                ("ratelimit-reset", reset_secs),
            ] {
                if let Ok(v) = HeaderValue::from_str(&value.to_string()) {
                    headers.insert(name, v);
                }
            }
            resp
        }
        RateDecision::Unlimited => next.run(req).await,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_secs: u64,
    },
    Limited {
        retry_after_secs: u64,
    },
    Unlimited,
}

/// Fixed-window request counter keyed by client address.
pub struct RateLimiter {
    inner: Mutex<HashMap<String, WindowCounter>>,
    window_ms: i64,
    max: u32,
}

#[derive(Clone, Copy)]
struct WindowCounter {
    window_start_ms: i64,
    count: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            window_ms: (window.as_millis() as i64).max(1),
            max,
        }
    }

    pub fn from_config(cfg: &RelayConfig) -> Self {
        Self::new(Duration::from_secs(cfg.rate_limit_window_secs), cfg.rate_limit_max)
    }

    pub async fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, now_ms()).await
    }

    pub async fn check_at(&self, key: &str, now: i64) -> RateDecision {
        if self.max == 0 {
            return RateDecision::Unlimited;
        }
        let mut map = self.inner.lock().await;

        if map.len() > 10_000 {
            let cutoff = now - self.window_ms;
            map.retain(|_, v| v.window_start_ms > cutoff);
        }

        let win = map.entry(key.to_string()).or_insert(WindowCounter {
            window_start_ms: now,
            count: 0,
        });
        if now - win.window_start_ms >= self.window_ms {
            win.window_start_ms = now;
            win.count = 0;
        }
        let reset_ms = (win.window_start_ms + self.window_ms - now).max(0);
        let reset_secs = ((reset_ms as u64) + 999) / 1000;
        if win.count >= self.max {
            return RateDecision::Limited {
                retry_after_secs: reset_secs.max(1),
            };
        }
        win.count += 1;
        RateDecision::Allowed {
            limit: self.max,
            remaining: self.max - win.count,
            reset_secs,
        }
    }
}

/// Address used as the rate-limit key. Forwarding headers are only honored
/// when a trusted reverse proxy overwrites them.
pub fn client_ip(trust_proxy_headers: bool, peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    let peer_ip = || {
        peer.map(|p| p.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };
    if !trust_proxy_headers {
        return peer_ip();
    }
    if let Some(v) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = parse_ip_str(v) {
            return ip;
        }
    }
    if let Some(v) = headers.get("forwarded").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = parse_forwarded_for_ip(v) {
            return ip;
        }
    }
    if let Some(v) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = v.split(',').map(|s| s.trim()).find_map(parse_ip_str) {
            return ip;
        }
    }
    peer_ip()
}

fn parse_ip_str(s: &str) -> Option<String> {
    let s = s.trim().trim_matches('"');
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Some(ip.to_string());
    }
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr.ip().to_string());
    }
    let s = s.trim_start_matches('[').trim_end_matches(']');
    s.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

fn parse_forwarded_for_ip(forwarded: &str) -> Option<String> {
    // Forwarded: for=...;proto=https, for=...
    for part in forwarded.split([';', ',']) {
        let part = part.trim();
        let Some((key, raw)) = part.split_once('=') else { continue };
        if !key.trim().eq_ignore_ascii_case("for") {
            continue;
        }
        return parse_ip_str(raw);
    }
    None
}
