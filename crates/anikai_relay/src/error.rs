/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anikai_protocol::ErrorBody;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub const NO_RESPONSE_MESSAGE: &str = "No response received from server";
pub const NOT_FOUND_MESSAGE: &str = "The requested endpoint does not exist.";
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";
pub const INTERNAL_MESSAGE: &str = "Something went wrong on the server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientParameter,
    Upstream,
    Transport,
    RateLimited,
    RouteNotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ClientParameter => "client_parameter",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Transport => "transport",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::RouteNotFound => "route_not_found",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    ClientParameter(String),

    #[error("upstream responded {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// Detail is kept for logs; callers always see [`NO_RESPONSE_MESSAGE`].
    #[error("no response from upstream: {0}")]
    Transport(String),

    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("route not found")]
    RouteNotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn missing_param(name: &str) -> Self {
        RelayError::ClientParameter(format!("{name} is required"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::ClientParameter(_) => ErrorKind::ClientParameter,
            RelayError::Upstream { .. } => ErrorKind::Upstream,
            RelayError::Transport(_) => ErrorKind::Transport,
            RelayError::RateLimited { .. } => ErrorKind::RateLimited,
            RelayError::RouteNotFound => ErrorKind::RouteNotFound,
            RelayError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::ClientParameter(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            RelayError::Transport(_) | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RelayError::RouteNotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let status = self.status().as_u16();
        match self {
            RelayError::ClientParameter(message) => ErrorBody::new("Bad Request", message.clone(), status),
            RelayError::Upstream { message, body, .. } => ErrorBody {
                data: body.clone(),
                ..ErrorBody::new("API Error", message.clone(), status)
            },
            RelayError::Transport(_) => ErrorBody::new("API Error", NO_RESPONSE_MESSAGE, status),
            RelayError::RateLimited { .. } => ErrorBody::new("Too Many Requests", RATE_LIMIT_MESSAGE, status),
            RelayError::RouteNotFound => ErrorBody::new("Not Found", NOT_FOUND_MESSAGE, status),
            RelayError::Internal(_) => ErrorBody::new("Internal Server Error", INTERNAL_MESSAGE, status),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let mut resp = (self.status(), Json(self.body())).into_response();
        if let RelayError::RateLimited { retry_after_secs } = &self {
            resp.headers_mut().insert(
                "retry-after",
                HeaderValue::from_str(&retry_after_secs.to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("60")),
            );
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_carried_over() {
        let err = RelayError::Upstream {
            status: 404,
            message: "Anime not found".into(),
            body: Some(serde_json::json!({"status": 404, "message": "Anime not found"})),
        };
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let body = err.body();
        assert_eq!(body.error, "API Error");
        assert_eq!(body.message, "Anime not found");
        assert_eq!(body.status, Some(404));
        assert!(body.data.is_some());
    }

    #[test]
    fn non_error_upstream_status_maps_to_500() {
        let err = RelayError::Upstream {
            status: 200,
            message: "Invalid JSON".into(),
            body: None,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transport_message_is_fixed() {
        let err = RelayError::Transport("connection refused".into());
        let body = err.body();
        assert_eq!(body.message, NO_RESPONSE_MESSAGE);
        assert_eq!(body.status, Some(500));
    }

    #[test]
    fn missing_param_is_a_client_error() {
        let err = RelayError::missing_param("animeEpisodeId");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().message, "animeEpisodeId is required");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let resp = RelayError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("retry-after").unwrap(), "42");
    }
}
