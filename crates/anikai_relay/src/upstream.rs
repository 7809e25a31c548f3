/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::RelayError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header;
use std::time::Duration;
use tracing::{info, warn};

/// One upstream GET: an interpolated path plus the query pairs to send.
/// Absent values never make it into `query`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl RelayRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Skips `None` and blank values.
    pub fn param_opt(self, key: &str, value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Percent-encodes a single path segment before interpolation.
pub fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[async_trait]
pub trait CatalogUpstream: Send + Sync {
    /// Returns the upstream JSON body untouched.
    async fn fetch(&self, req: &RelayRequest) -> Result<Bytes, RelayError>;
}

pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("upstream http client init")?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CatalogUpstream for HttpUpstream {
    async fn fetch(&self, req: &RelayRequest) -> Result<Bytes, RelayError> {
        let url = self.url(&req.path);
        info!(url = %url, params = ?req.query, "fetching from upstream");

        let resp = self
            .http
            .get(&url)
            .query(&req.query)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| {
            warn!(url = %url, "upstream body read failed: {e}");
            RelayError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            let parsed = serde_json::from_slice::<serde_json::Value>(&body).ok();
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            warn!(url = %url, status = status.as_u16(), "upstream error: {message}");
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message,
                body: parsed,
            });
        }

        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(&body) {
            warn!(url = %url, "upstream returned invalid JSON: {e}");
            return Err(RelayError::Upstream {
                status: 500,
                message: format!("Invalid JSON from upstream service: {e}"),
                body: None,
            });
        }
        Ok(body)
    }
}

fn send_error(url: &str, e: reqwest::Error) -> RelayError {
    if e.is_builder() {
        warn!(url = %url, "upstream request could not be built: {e}");
        return RelayError::Internal(e.to_string());
    }
    if e.is_timeout() {
        warn!(url = %url, "upstream timed out: {e}");
    } else {
        warn!(url = %url, "upstream unreachable: {e}");
    }
    RelayError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, NO_RESPONSE_MESSAGE};
    use axum::extract::RawQuery;
    use axum::http::{StatusCode, Uri};
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, Option<String>)>>>;

    async fn spawn_upstream() -> (SocketAddr, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let app = Router::new()
            .route(
                "/api/azlist/:sort",
                get(move |uri: Uri, RawQuery(q): RawQuery| {
                    let record = record.clone();
                    async move {
                        record.lock().unwrap().push((uri.path().to_string(), q));
                        (
                            [(header::CONTENT_TYPE, "application/json")],
                            r#"{"success":true,"data":{"z":1,"a":[2,  3]}}"#,
                        )
                    }
                }),
            )
            .route(
                "/api/anime/:id",
                get(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        [(header::CONTENT_TYPE, "application/json")],
                        r#"{"status":404,"message":"Anime not found"}"#,
                    )
                }),
            )
            .route("/api/broken", get(|| async { (StatusCode::BAD_GATEWAY, "<html>bad</html>") }))
            .route("/api/html", get(|| async { "<html>ok</html>" }))
            .route(
                "/api/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "{}"
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    fn client(addr: SocketAddr, timeout: Duration) -> HttpUpstream {
        HttpUpstream::new(&format!("http://{addr}/api/"), timeout, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn param_opt_drops_blank_values() {
        let req = RelayRequest::new("/search")
            .param_opt("q", Some("naruto"))
            .param_opt("type", None)
            .param_opt("sort", Some("  "));
        assert_eq!(req.query, vec![("q".to_string(), "naruto".to_string())]);
        assert_eq!(req.query_value("q"), Some("naruto"));
        assert_eq!(req.query_value("type"), None);
    }

    #[test]
    fn segment_escapes_path_separators() {
        assert_eq!(segment("one-piece-100"), "one-piece-100");
        assert_eq!(segment("a/../b"), "a%2F..%2Fb");
    }

    #[tokio::test]
    async fn relays_body_bytes_verbatim() {
        let (addr, seen) = spawn_upstream().await;
        let up = client(addr, Duration::from_secs(5));
        let req = RelayRequest::new("/azlist/a").param("page", "2");
        let body = up.fetch(&req).await.unwrap();
        assert_eq!(&body[..], br#"{"success":true,"data":{"z":1,"a":[2,  3]}}"#);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("/api/azlist/a".to_string(), Some("page=2".to_string()))]);
    }

    #[tokio::test]
    async fn empty_query_sends_no_question_mark() {
        let (addr, seen) = spawn_upstream().await;
        let up = client(addr, Duration::from_secs(5));
        up.fetch(&RelayRequest::new("/azlist/0-9")).await.unwrap();
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen[0].1, None);
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_message() {
        let (addr, _) = spawn_upstream().await;
        let up = client(addr, Duration::from_secs(5));
        let err = up.fetch(&RelayRequest::new("/anime/missing")).await.unwrap_err();
        match err {
            RelayError::Upstream { status, message, body } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Anime not found");
                assert_eq!(body.unwrap()["status"], 404);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_gets_generic_message() {
        let (addr, _) = spawn_upstream().await;
        let up = client(addr, Duration::from_secs(5));
        let err = up.fetch(&RelayRequest::new("/broken")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.body().message, "Request failed with status code 502");
        assert!(err.body().data.is_none());
    }

    #[tokio::test]
    async fn malformed_success_body_is_an_upstream_error() {
        let (addr, _) = spawn_upstream().await;
        let up = client(addr, Duration::from_secs(5));
        let err = up.fetch(&RelayRequest::new("/html")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn timeout_is_a_transport_error() {
        let (addr, _) = spawn_upstream().await;
        let up = client(addr, Duration::from_millis(200));
        let err = up.fetch(&RelayRequest::new("/slow")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.body().message, NO_RESPONSE_MESSAGE);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let up = client(addr, Duration::from_secs(2));
        let err = up.fetch(&RelayRequest::new("/home")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
