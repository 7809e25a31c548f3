/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://anikaiser-api.vercel.app/api/v2/hianime";

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub upstream_base_url: String,
    pub upstream_timeout_secs: u64,
    pub upstream_connect_timeout_secs: u64,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub trust_proxy_headers: bool,
    pub rate_limit_window_secs: u64,
    /// 0 disables the limiter.
    pub rate_limit_max: u32,
    pub max_body_bytes: usize,
    pub hsts_max_age_secs: u64,
    pub csp: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            upstream_timeout_secs: 30,
            upstream_connect_timeout_secs: 10,
            allowed_origins: Vec::new(),
            trust_proxy_headers: false,
            rate_limit_window_secs: 15 * 60,
            rate_limit_max: 100_000,
            max_body_bytes: 1024 * 1024,
            hsts_max_age_secs: 0,
            csp: None,
        }
    }
}

pub fn load_config() -> Result<RelayConfig> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary variable lookup so tests don't touch
/// the process environment.
pub fn load_config_from<F>(get: F) -> Result<RelayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let defaults = RelayConfig::default();

    let bind = match get("ANIKAI_RELAY_BIND") {
        Some(raw) => raw
            .parse::<SocketAddr>()
            .with_context(|| format!("ANIKAI_RELAY_BIND invalid: {raw}"))?,
        None => {
            let port: u16 = parse_or("PORT", get("PORT"), defaults.bind.port())?;
            SocketAddr::from(([0, 0, 0, 0], port))
        }
    };
    let upstream_base_url = get("ANIKAI_UPSTREAM_BASE_URL")
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or(defaults.upstream_base_url);
    if !upstream_base_url.starts_with("http://") && !upstream_base_url.starts_with("https://") {
        anyhow::bail!("ANIKAI_UPSTREAM_BASE_URL must be an http(s) URL: {upstream_base_url}");
    }
    let allowed_origins = get("ANIKAI_ALLOWED_ORIGINS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty() && s != "*")
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let trust_proxy_headers = get("ANIKAI_TRUST_PROXY_HEADERS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(defaults.trust_proxy_headers);

    Ok(RelayConfig {
        bind,
        upstream_base_url,
        upstream_timeout_secs: parse_or(
            "ANIKAI_UPSTREAM_TIMEOUT_SECS",
            get("ANIKAI_UPSTREAM_TIMEOUT_SECS"),
            defaults.upstream_timeout_secs,
        )?
        .max(1),
        upstream_connect_timeout_secs: parse_or(
            "ANIKAI_UPSTREAM_CONNECT_TIMEOUT_SECS",
            get("ANIKAI_UPSTREAM_CONNECT_TIMEOUT_SECS"),
            defaults.upstream_connect_timeout_secs,
        )?
        .max(1),
        allowed_origins,
        trust_proxy_headers,
        rate_limit_window_secs: parse_or(
            "ANIKAI_RATE_LIMIT_WINDOW_SECS",
            get("ANIKAI_RATE_LIMIT_WINDOW_SECS"),
            defaults.rate_limit_window_secs,
        )?
        .max(1),
        rate_limit_max: parse_or(
            "ANIKAI_RATE_LIMIT_MAX",
            get("ANIKAI_RATE_LIMIT_MAX"),
            defaults.rate_limit_max,
        )?,
        max_body_bytes: parse_or(
            "ANIKAI_MAX_BODY_BYTES",
            get("ANIKAI_MAX_BODY_BYTES"),
            defaults.max_body_bytes,
        )?,
        hsts_max_age_secs: parse_or(
            "ANIKAI_HSTS_MAX_AGE_SECS",
            get("ANIKAI_HSTS_MAX_AGE_SECS"),
            defaults.hsts_max_age_secs,
        )?,
        csp: get("ANIKAI_CSP"),
    })
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.parse::<T>().with_context(|| format!("{key} invalid: {v}")),
        None => Ok(default),
    }
}
