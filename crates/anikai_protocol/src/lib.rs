/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Wire types shared by the relay server and the client views.
//!
//! The relay never decodes upstream payloads; these structs exist for the
//! client side, which only needs a few fields out of each response. Every
//! field that the upstream service may leave out is defaulted so a partial
//! payload still decodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uniform failure body produced by the relay for every error it returns,
/// whether observed locally or relayed from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            status: Some(status),
            data: None,
        }
    }
}

/// `{ success, data }` envelope as returned by the upstream service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

impl<T> ApiEnvelope<T> {
    /// Best human-readable reason for a failed envelope.
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "request failed".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Sub,
    Dub,
    Raw,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Sub, Category::Dub, Category::Raw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sub => "sub",
            Category::Dub => "dub",
            Category::Raw => "raw",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sub" => Ok(Category::Sub),
            "dub" => Ok(Category::Dub),
            "raw" => Ok(Category::Raw),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeList {
    pub total_episodes: u32,
    pub episodes: Vec<EpisodeEntry>,
}

impl EpisodeList {
    pub fn find_number(&self, number: u32) -> Option<&EpisodeEntry> {
        self.episodes.iter().find(|ep| ep.number == number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeEntry {
    pub title: Option<String>,
    pub episode_id: String,
    pub number: u32,
    pub is_filler: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeServers {
    pub episode_id: Option<String>,
    pub episode_no: Option<u32>,
    pub sub: Vec<ServerEntry>,
    pub dub: Vec<ServerEntry>,
    pub raw: Vec<ServerEntry>,
}

impl EpisodeServers {
    pub fn for_category(&self, category: Category) -> &[ServerEntry] {
        match category {
            Category::Sub => &self.sub,
            Category::Dub => &self.dub,
            Category::Raw => &self.raw,
        }
    }

    /// Server names for `category`, in upstream order.
    pub fn names(&self, category: Category) -> Vec<String> {
        self.for_category(category)
            .iter()
            .map(|s| s.server_name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerEntry {
    pub server_name: String,
    pub server_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeSources {
    pub sources: Vec<SourceEntry>,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceEntry {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "isM3U8")]
    pub is_m3u8: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackEntry {
    #[serde(alias = "url")]
    pub file: String,
    pub label: Option<String>,
    pub lang: Option<String>,
    pub kind: Option<String>,
}

/// Pagination fields carried by every paged upstream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
}

impl Default for PageInfo {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            has_next_page: false,
        }
    }
}

/// Anime summary as it appears in home rails, grids and search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimeCard {
    pub id: String,
    pub name: String,
    pub jname: Option<String>,
    pub poster: Option<String>,
    pub description: Option<String>,
    pub rank: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub episodes: Option<EpisodeCounts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeCounts {
    pub sub: Option<u32>,
    pub dub: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomeData {
    pub spotlight_animes: Vec<AnimeCard>,
    pub trending_animes: Vec<AnimeCard>,
    pub latest_episode_animes: Vec<AnimeCard>,
}

/// One page of a paged listing (A-Z, genre, category, producer, search).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimePage {
    pub animes: Vec<AnimeCard>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub jname: Option<String>,
    pub poster: Option<String>,
    pub more_info: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionList {
    pub suggestions: Vec<Suggestion>,
}

/// Payload of `/api/anime/:id`. Only the parts the detail page renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimeDetailsData {
    pub anime: AnimeProfile,
    pub seasons: Vec<SeasonEntry>,
    pub related_animes: Vec<AnimeCard>,
    pub recommended_animes: Vec<AnimeCard>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimeProfile {
    pub info: AnimeInfo,
    pub more_info: AnimeMoreInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimeInfo {
    pub id: String,
    pub name: String,
    pub poster: Option<String>,
    pub description: Option<String>,
    pub stats: AnimeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimeStats {
    pub rating: Option<String>,
    pub quality: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub duration: Option<String>,
    pub episodes: EpisodeCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimeMoreInfo {
    pub studios: Option<String>,
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub aired: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeasonEntry {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub poster: Option<String>,
    pub is_current: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("DUB".parse::<Category>().unwrap(), Category::Dub);
        assert_eq!(" raw ".parse::<Category>().unwrap(), Category::Raw);
        assert!("hardsub".parse::<Category>().is_err());
        assert_eq!(Category::default(), Category::Sub);
    }

    #[test]
    fn error_body_omits_absent_fields() {
        let body = ErrorBody {
            success: false,
            error: "Not Found".into(),
            message: "gone".into(),
            status: None,
            data: None,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v, serde_json::json!({"success": false, "error": "Not Found", "message": "gone"}));
    }

    #[test]
    fn servers_decode_with_missing_categories() {
        let raw = r#"{"episodeId":"x?ep=1","episodeNo":1,"sub":[{"serverName":"hd-1","serverId":4},{"serverName":"hd-2","serverId":1}]}"#;
        let servers: EpisodeServers = serde_json::from_str(raw).unwrap();
        assert_eq!(servers.names(Category::Sub), vec!["hd-1", "hd-2"]);
        assert!(servers.for_category(Category::Dub).is_empty());
    }

    #[test]
    fn tracks_accept_url_alias() {
        let raw = r#"{"sources":[{"url":"https://cdn/x.m3u8","type":"hls"}],"tracks":[{"url":"https://cdn/en.vtt","lang":"English"}]}"#;
        let src: EpisodeSources = serde_json::from_str(raw).unwrap();
        assert_eq!(src.sources[0].kind.as_deref(), Some("hls"));
        assert_eq!(src.tracks[0].file, "https://cdn/en.vtt");
    }

    #[test]
    fn envelope_failure_prefers_message() {
        let env: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"success":false,"error":"API Error","message":"upstream down"}"#).unwrap();
        assert!(!env.success);
        assert_eq!(env.failure_message(), "upstream down");
        assert!(env.data.is_none());
    }

    #[test]
    fn page_reads_flattened_pagination() {
        let raw = r#"{"sortOption":"a","animes":[{"id":"a-1","name":"A","type":"TV","episodes":{"sub":12,"dub":null}}],"currentPage":2,"totalPages":7,"hasNextPage":true}"#;
        let page: AnimePage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.animes[0].kind.as_deref(), Some("TV"));
        assert_eq!(page.animes[0].episodes.unwrap().sub, Some(12));
        assert_eq!(
            page.page,
            PageInfo {
                current_page: 2,
                total_pages: 7,
                has_next_page: true
            }
        );

        let empty: AnimePage = serde_json::from_str(r#"{"animes":[]}"#).unwrap();
        assert_eq!(empty.page, PageInfo::default());
    }

    #[test]
    fn home_tolerates_missing_rails() {
        let home: HomeData = serde_json::from_str(r#"{"spotlightAnimes":[{"id":"x","name":"X","rank":1}]}"#).unwrap();
        assert_eq!(home.spotlight_animes.len(), 1);
        assert!(home.trending_animes.is_empty());
    }

    #[test]
    fn details_read_nested_info() {
        let raw = r#"{"anime":{"info":{"id":"attack-on-titan-112","name":"Attack on Titan","stats":{"rating":"R","type":"TV","episodes":{"sub":25,"dub":25}}},"moreInfo":{"studios":"Wit Studio","genres":["Action","Drama"],"status":"Finished Airing"}},"seasons":[{"id":"attack-on-titan-112","title":"Season 1","isCurrent":true}]}"#;
        let details: AnimeDetailsData = serde_json::from_str(raw).unwrap();
        assert_eq!(details.anime.info.stats.kind.as_deref(), Some("TV"));
        assert_eq!(details.anime.info.stats.episodes.dub, Some(25));
        assert_eq!(details.anime.more_info.genres, vec!["Action", "Drama"]);
        assert!(details.seasons[0].is_current);
        assert!(details.related_animes.is_empty());
    }
}
