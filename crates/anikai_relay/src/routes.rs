/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Relay endpoints. Each handler builds one [`RelayRequest`] from its path and
//! query parameters, sends it upstream and hands the JSON body back as-is.
//! The request builders are plain functions so the parameter mapping can be
//! checked without a server.

use crate::error::RelayError;
use crate::upstream::{segment, RelayRequest};
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_PAGE: &str = "1";
pub const DEFAULT_SERVER: &str = "hd-1";
pub const DEFAULT_CATEGORY: &str = "sub";

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/azlist/:sort_option", get(azlist))
        .route("/qtip/:anime_id", get(qtip))
        .route("/anime/:anime_id", get(anime_info))
        .route("/anime/:anime_id/episodes", get(anime_episodes))
        .route("/search", get(search))
        .route("/advanced-search", get(advanced_search))
        .route("/search/suggestion", get(search_suggestion))
        .route("/producer/:name", get(producer))
        .route("/genre/:name", get(genre))
        .route("/category/:category", get(category))
        .route("/schedule", get(schedule))
        .route("/episode/servers", get(episode_servers))
        .route("/episode/sources", get(episode_sources))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EpisodeServersQuery {
    #[serde(rename = "animeEpisodeId")]
    pub anime_episode_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EpisodeSourcesQuery {
    #[serde(rename = "animeEpisodeId")]
    pub anime_episode_id: Option<String>,
    pub server: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdvancedSearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
    pub genres: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort: Option<String>,
    pub season: Option<String>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub rated: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub score: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn page_or_default(page: &Option<String>) -> &str {
    present(page).unwrap_or(DEFAULT_PAGE)
}

pub fn home_request() -> RelayRequest {
    RelayRequest::new("/home")
}

pub fn azlist_request(sort_option: &str, q: &PageQuery) -> RelayRequest {
    RelayRequest::new(format!("/azlist/{}", segment(sort_option))).param("page", page_or_default(&q.page))
}

pub fn qtip_request(anime_id: &str) -> RelayRequest {
    RelayRequest::new(format!("/qtip/{}", segment(anime_id)))
}

pub fn anime_info_request(anime_id: &str) -> RelayRequest {
    RelayRequest::new(format!("/anime/{}", segment(anime_id)))
}

pub fn anime_episodes_request(anime_id: &str) -> RelayRequest {
    RelayRequest::new(format!("/anime/{}/episodes", segment(anime_id)))
}

/// Basic search forwards every filter verbatim; only `page` is defaulted.
pub fn search_request(pairs: &[(String, String)]) -> RelayRequest {
    let mut req = RelayRequest::new("/search");
    let mut saw_page = false;
    for (key, value) in pairs {
        if key == "page" {
            if saw_page {
                continue;
            }
            saw_page = true;
            let page = value.trim();
            req = req.param("page", if page.is_empty() { DEFAULT_PAGE } else { page });
            continue;
        }
        req = req.param_opt(key, Some(value));
    }
    if !saw_page {
        req = req.param("page", DEFAULT_PAGE);
    }
    req
}

pub fn split_genres(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn advanced_search_request(q: &AdvancedSearchQuery) -> RelayRequest {
    let genres = present(&q.genres).map(split_genres).unwrap_or_default();
    let genres = if genres.is_empty() { None } else { Some(genres.join(",")) };
    RelayRequest::new("/search")
        .param_opt("q", present(&q.q))
        .param("page", page_or_default(&q.page))
        .param_opt("genres", genres.as_deref())
        .param_opt("type", present(&q.kind))
        .param_opt("sort", present(&q.sort))
        .param_opt("season", present(&q.season))
        .param_opt("language", present(&q.language))
        .param_opt("status", present(&q.status))
        .param_opt("rated", present(&q.rated))
        .param_opt("start_date", present(&q.start_date))
        .param_opt("end_date", present(&q.end_date))
        .param_opt("score", present(&q.score))
}

pub fn suggestion_request(q: &SuggestionQuery) -> RelayRequest {
    RelayRequest::new("/search/suggestion").param_opt("q", present(&q.q))
}

pub fn producer_request(name: &str, q: &PageQuery) -> RelayRequest {
    RelayRequest::new(format!("/producer/{}", segment(name))).param("page", page_or_default(&q.page))
}

pub fn genre_request(name: &str, q: &PageQuery) -> RelayRequest {
    RelayRequest::new(format!("/genre/{}", segment(name))).param("page", page_or_default(&q.page))
}

pub fn category_request(category: &str, q: &PageQuery) -> RelayRequest {
    RelayRequest::new(format!("/category/{}", segment(category))).param("page", page_or_default(&q.page))
}

pub fn schedule_request(q: &ScheduleQuery) -> RelayRequest {
    RelayRequest::new("/schedule").param_opt("date", present(&q.date))
}

pub fn episode_servers_request(q: &EpisodeServersQuery) -> Result<RelayRequest, RelayError> {
    let id = present(&q.anime_episode_id).ok_or_else(|| RelayError::missing_param("animeEpisodeId"))?;
    Ok(RelayRequest::new("/episode/servers").param("animeEpisodeId", id))
}

pub fn episode_sources_request(q: &EpisodeSourcesQuery) -> Result<RelayRequest, RelayError> {
    let id = present(&q.anime_episode_id).ok_or_else(|| RelayError::missing_param("animeEpisodeId"))?;
    Ok(RelayRequest::new("/episode/sources")
        .param("animeEpisodeId", id)
        .param("server", present(&q.server).unwrap_or(DEFAULT_SERVER))
        .param("category", present(&q.category).unwrap_or(DEFAULT_CATEGORY)))
}

async fn relay(state: &AppState, req: RelayRequest) -> Result<Response, RelayError> {
    let body = state.upstream.fetch(&req).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

fn query_or_reject<T>(q: Result<Query<T>, QueryRejection>) -> Result<T, RelayError> {
    q.map(|Query(v)| v).map_err(|e| {
        warn!("rejected query string: {e}");
        RelayError::ClientParameter(e.body_text())
    })
}

async fn home(State(state): State<AppState>) -> Result<Response, RelayError> {
    relay(&state, home_request()).await
}

async fn azlist(
    State(state): State<AppState>,
    Path(sort_option): Path<String>,
    q: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, azlist_request(&sort_option, &q)).await
}

async fn qtip(State(state): State<AppState>, Path(anime_id): Path<String>) -> Result<Response, RelayError> {
    relay(&state, qtip_request(&anime_id)).await
}

async fn anime_info(State(state): State<AppState>, Path(anime_id): Path<String>) -> Result<Response, RelayError> {
    relay(&state, anime_info_request(&anime_id)).await
}

async fn anime_episodes(
    State(state): State<AppState>,
    Path(anime_id): Path<String>,
) -> Result<Response, RelayError> {
    relay(&state, anime_episodes_request(&anime_id)).await
}

async fn search(
    State(state): State<AppState>,
    q: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, RelayError> {
    let pairs = query_or_reject(q)?;
    relay(&state, search_request(&pairs)).await
}

async fn advanced_search(
    State(state): State<AppState>,
    q: Result<Query<AdvancedSearchQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, advanced_search_request(&q)).await
}

async fn search_suggestion(
    State(state): State<AppState>,
    q: Result<Query<SuggestionQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, suggestion_request(&q)).await
}

async fn producer(
    State(state): State<AppState>,
    Path(name): Path<String>,
    q: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, producer_request(&name, &q)).await
}

async fn genre(
    State(state): State<AppState>,
    Path(name): Path<String>,
    q: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, genre_request(&name, &q)).await
}

async fn category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    q: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, category_request(&category, &q)).await
}

async fn schedule(
    State(state): State<AppState>,
    q: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    relay(&state, schedule_request(&q)).await
}

async fn episode_servers(
    State(state): State<AppState>,
    q: Result<Query<EpisodeServersQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    let req = episode_servers_request(&q).inspect_err(|e| warn!("episode servers: {e}"))?;
    relay(&state, req).await
}

async fn episode_sources(
    State(state): State<AppState>,
    q: Result<Query<EpisodeSourcesQuery>, QueryRejection>,
) -> Result<Response, RelayError> {
    let q = query_or_reject(q)?;
    let req = episode_sources_request(&q).inspect_err(|e| warn!("episode sources: {e}"))?;
    relay(&state, req).await
}

/// `GET /`: describes the relay surface.
pub async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "Welcome to the Anime API. Please refer to the documentation for usage.",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "home": "/api/home",
            "azlist": "/api/azlist/:sortOption",
            "qtip": "/api/qtip/:animeId",
            "anime": "/api/anime/:animeId",
            "search": "/api/search?q=query",
            "advancedSearch": "/api/advanced-search?q=query&genres=action,comedy",
            "searchSuggestion": "/api/search/suggestion?q=query",
            "producer": "/api/producer/:name",
            "genre": "/api/genre/:name",
            "category": "/api/category/:category",
            "schedule": "/api/schedule?date=yyyy-mm-dd",
            "episodes": "/api/anime/:animeId/episodes",
            "servers": "/api/episode/servers?animeEpisodeId=id",
            "sources": "/api/episode/sources?animeEpisodeId=id&server=server&category=category"
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(req: &RelayRequest) -> Vec<(&str, &str)> {
        req.query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn azlist_forwards_page() {
        let req = azlist_request("a", &PageQuery { page: Some("2".into()) });
        assert_eq!(req.path, "/azlist/a");
        assert_eq!(pairs(&req), vec![("page", "2")]);
    }

    #[test]
    fn paged_endpoints_default_page_to_one() {
        let none = PageQuery::default();
        let blank = PageQuery { page: Some(String::new()) };
        for req in [
            azlist_request("0-9", &none),
            producer_request("studio-pierrot", &none),
            genre_request("action", &blank),
            category_request("most-popular", &none),
        ] {
            assert_eq!(req.query_value("page"), Some("1"), "{}", req.path);
        }
    }

    #[test]
    fn identifiers_are_interpolated_into_paths() {
        assert_eq!(qtip_request("one-piece-100").path, "/qtip/one-piece-100");
        assert_eq!(anime_info_request("one-piece-100").path, "/anime/one-piece-100");
        assert_eq!(anime_episodes_request("one-piece-100").path, "/anime/one-piece-100/episodes");
        assert!(anime_info_request("x").query.is_empty());
    }

    #[test]
    fn sources_apply_defaults() {
        let req = episode_sources_request(&EpisodeSourcesQuery {
            anime_episode_id: Some("steinsgate-3?ep=230".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(req.path, "/episode/sources");
        assert_eq!(
            pairs(&req),
            vec![("animeEpisodeId", "steinsgate-3?ep=230"), ("server", "hd-1"), ("category", "sub")]
        );
    }

    #[test]
    fn sources_keep_explicit_choices() {
        let req = episode_sources_request(&EpisodeSourcesQuery {
            anime_episode_id: Some("x?ep=1".into()),
            server: Some("hd-2".into()),
            category: Some("dub".into()),
        })
        .unwrap();
        assert_eq!(req.query_value("server"), Some("hd-2"));
        assert_eq!(req.query_value("category"), Some("dub"));
    }

    #[test]
    fn missing_episode_id_is_rejected() {
        let err = episode_sources_request(&EpisodeSourcesQuery::default()).unwrap_err();
        assert_eq!(err.body().message, "animeEpisodeId is required");
        let err = episode_servers_request(&EpisodeServersQuery {
            anime_episode_id: Some("  ".into()),
        })
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn advanced_search_splits_genres_and_omits_absent() {
        let req = advanced_search_request(&AdvancedSearchQuery {
            q: Some("girls".into()),
            genres: Some("action,comedy".into()),
            ..Default::default()
        });
        assert_eq!(req.path, "/search");
        assert_eq!(
            pairs(&req),
            vec![("q", "girls"), ("page", "1"), ("genres", "action,comedy")]
        );
    }

    #[test]
    fn advanced_search_keeps_upstream_names_and_drops_blanks() {
        let req = advanced_search_request(&AdvancedSearchQuery {
            page: Some("3".into()),
            genres: Some(" , ".into()),
            kind: Some("movie".into()),
            start_date: Some("2014-0-0".into()),
            score: Some("".into()),
            ..Default::default()
        });
        assert_eq!(
            pairs(&req),
            vec![("page", "3"), ("type", "movie"), ("start_date", "2014-0-0")]
        );
    }

    #[test]
    fn split_genres_trims_entries() {
        assert_eq!(split_genres("action, comedy,,drama "), vec!["action", "comedy", "drama"]);
    }

    #[test]
    fn search_forwards_filters_and_defaults_page() {
        let input = vec![
            ("q".to_string(), "naruto".to_string()),
            ("status".to_string(), "finished-airing".to_string()),
            ("rated".to_string(), "".to_string()),
        ];
        let req = search_request(&input);
        assert_eq!(
            pairs(&req),
            vec![("q", "naruto"), ("status", "finished-airing"), ("page", "1")]
        );

        let input = vec![
            ("page".to_string(), "4".to_string()),
            ("q".to_string(), "bleach".to_string()),
        ];
        assert_eq!(pairs(&search_request(&input)), vec![("page", "4"), ("q", "bleach")]);
    }

    #[test]
    fn suggestion_and_schedule_omit_absent_values() {
        assert!(suggestion_request(&SuggestionQuery::default()).query.is_empty());
        let req = schedule_request(&ScheduleQuery {
            date: Some("2024-06-09".into()),
        });
        assert_eq!(req.path, "/schedule");
        assert_eq!(pairs(&req), vec![("date", "2024-06-09")]);
    }
}
