/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anikai_protocol::{
    AnimeDetailsData, AnimePage, ApiEnvelope, Category, EpisodeList, EpisodeServers, EpisodeSources, HomeData,
    Suggestion, SuggestionList,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),

    /// Non-2xx answer, or a 2xx envelope with `success: false`.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Search text plus the optional upstream filters (`type`, `status`,
/// `genres`, `sort`, ...). Blank filters are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub filters: BTreeMap<String, String>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.set_filter(key, value);
        self
    }

    /// A blank value removes the filter.
    pub fn set_filter(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.filters.remove(key);
        } else {
            self.filters.insert(key.to_string(), value.to_string());
        }
    }

    pub fn params(&self, page: u32) -> Vec<(String, String)> {
        let mut out = vec![("q".to_string(), self.q.clone()), ("page".to_string(), page.to_string())];
        out.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}

/// The relay's `/api` surface as seen by the views.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn home(&self) -> Result<HomeData, ApiError>;
    async fn azlist(&self, sort_option: &str, page: u32) -> Result<AnimePage, ApiError>;
    async fn genre(&self, name: &str, page: u32) -> Result<AnimePage, ApiError>;
    async fn category(&self, name: &str, page: u32) -> Result<AnimePage, ApiError>;
    async fn producer(&self, name: &str, page: u32) -> Result<AnimePage, ApiError>;
    async fn search(&self, query: &SearchQuery, page: u32) -> Result<AnimePage, ApiError>;
    async fn suggestions(&self, q: &str) -> Result<Vec<Suggestion>, ApiError>;
    async fn anime(&self, anime_id: &str) -> Result<AnimeDetailsData, ApiError>;
    async fn episodes(&self, anime_id: &str) -> Result<EpisodeList, ApiError>;
    async fn servers(&self, episode_id: &str) -> Result<EpisodeServers, ApiError>;
    async fn sources(
        &self,
        episode_id: &str,
        server: &str,
        category: Category,
    ) -> Result<EpisodeSources, ApiError>;
}

/// `CatalogApi` over HTTP against a running relay.
#[derive(Clone)]
pub struct RelayApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Transport(format!("http client init: {e}")))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reads `ANIKAI_API_BASE_URL`, falling back to a local relay.
    pub fn from_env() -> Result<Self, ApiError> {
        let base = std::env::var("ANIKAI_API_BASE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Self::new(&base)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<T, ApiError> {
        let url = format!("{}/api{}", self.base_url, path);
        debug!(url = %url, "catalog request");
        let resp = self.http.get(&url).query(query).send().await.map_err(|e| {
            warn!(url = %url, "catalog request failed: {e}");
            ApiError::Transport(e.to_string())
        })?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| {
            warn!(url = %url, "catalog body read failed: {e}");
            ApiError::Transport(e.to_string())
        })?;
        let out = decode_envelope(status, &body);
        if let Err(e) = &out {
            warn!(url = %url, status, "catalog request rejected: {e}");
        }
        out
    }
}

fn seg(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

fn page_param(page: u32) -> Vec<(String, String)> {
    vec![("page".to_string(), page.max(1).to_string())]
}

/// Unwraps the `{ success, data }` envelope. Error bodies produced by the
/// relay share the `message` field, so both shapes go through here.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ApiError> {
    let ok = (200..300).contains(&status);
    let env: ApiEnvelope<T> = match serde_json::from_slice(body) {
        Ok(env) => env,
        Err(e) if ok => return Err(ApiError::Decode(e.to_string())),
        Err(_) => {
            let message = serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(ApiError::Api { status, message });
        }
    };
    if !ok || !env.success {
        return Err(ApiError::Api {
            status,
            message: env.failure_message(),
        });
    }
    env.data
        .ok_or_else(|| ApiError::Decode("missing data".to_string()))
}

#[async_trait]
impl CatalogApi for RelayApiClient {
    async fn home(&self) -> Result<HomeData, ApiError> {
        self.get("/home", &[]).await
    }

    async fn azlist(&self, sort_option: &str, page: u32) -> Result<AnimePage, ApiError> {
        self.get(&format!("/azlist/{}", seg(sort_option)), &page_param(page)).await
    }

    async fn genre(&self, name: &str, page: u32) -> Result<AnimePage, ApiError> {
        self.get(&format!("/genre/{}", seg(name)), &page_param(page)).await
    }

    async fn category(&self, name: &str, page: u32) -> Result<AnimePage, ApiError> {
        self.get(&format!("/category/{}", seg(name)), &page_param(page)).await
    }

    async fn producer(&self, name: &str, page: u32) -> Result<AnimePage, ApiError> {
        self.get(&format!("/producer/{}", seg(name)), &page_param(page)).await
    }

    async fn search(&self, query: &SearchQuery, page: u32) -> Result<AnimePage, ApiError> {
        self.get("/search", &query.params(page.max(1))).await
    }

    async fn suggestions(&self, q: &str) -> Result<Vec<Suggestion>, ApiError> {
        let list: SuggestionList = self
            .get("/search/suggestion", &[("q".to_string(), q.to_string())])
            .await?;
        Ok(list.suggestions)
    }

    async fn anime(&self, anime_id: &str) -> Result<AnimeDetailsData, ApiError> {
        self.get(&format!("/anime/{}", seg(anime_id)), &[]).await
    }

    async fn episodes(&self, anime_id: &str) -> Result<EpisodeList, ApiError> {
        self.get(&format!("/anime/{}/episodes", seg(anime_id)), &[]).await
    }

    async fn servers(&self, episode_id: &str) -> Result<EpisodeServers, ApiError> {
        self.get(
            "/episode/servers",
            &[("animeEpisodeId".to_string(), episode_id.to_string())],
        )
        .await
    }

    async fn sources(
        &self,
        episode_id: &str,
        server: &str,
        category: Category,
    ) -> Result<EpisodeSources, ApiError> {
        self.get(
            "/episode/sources",
            &[
                ("animeEpisodeId".to_string(), episode_id.to_string()),
                ("server".to_string(), server.to_string()),
                ("category".to_string(), category.as_str().to_string()),
            ],
        )
        .await
    }
}
