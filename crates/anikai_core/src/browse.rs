/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Home feed and paged grids. Each view owns its cursor and filters; every
//! fetch ends in either loaded data or a [`ViewError`] the UI can show.

use crate::api::{ApiError, CatalogApi, SearchQuery};
use anikai_protocol::{AnimeCard, AnimeDetailsData, AnimePage, HomeData, PageInfo};
use tracing::warn;

pub const DEFAULT_AZ_SORT: &str = "0-9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub message: String,
}

impl From<ApiError> for ViewError {
    fn from(e: ApiError) -> Self {
        Self { message: e.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    Failed(ViewError),
}

impl<T> ViewState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            ViewState::Loaded(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ViewError> {
        match self {
            ViewState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HomeFeed {
    state: ViewState<HomeData>,
}

impl HomeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&mut self, api: &dyn CatalogApi) {
        self.state = ViewState::Loading;
        self.state = match api.home().await {
            Ok(home) => ViewState::Loaded(home),
            Err(e) => {
                warn!("home feed failed: {e}");
                ViewState::Failed(e.into())
            }
        };
    }

    pub fn state(&self) -> &ViewState<HomeData> {
        &self.state
    }

    pub fn spotlight(&self) -> &[AnimeCard] {
        self.state.data().map(|h| h.spotlight_animes.as_slice()).unwrap_or(&[])
    }

    pub fn trending(&self) -> &[AnimeCard] {
        self.state.data().map(|h| h.trending_animes.as_slice()).unwrap_or(&[])
    }

    pub fn latest_episodes(&self) -> &[AnimeCard] {
        self.state
            .data()
            .map(|h| h.latest_episode_animes.as_slice())
            .unwrap_or(&[])
    }
}

/// Detail page for one anime.
#[derive(Debug)]
pub struct AnimeDetails {
    anime_id: String,
    state: ViewState<AnimeDetailsData>,
}

impl AnimeDetails {
    pub fn new(anime_id: impl Into<String>) -> Self {
        Self {
            anime_id: anime_id.into(),
            state: ViewState::Idle,
        }
    }

    pub fn anime_id(&self) -> &str {
        &self.anime_id
    }

    pub async fn load(&mut self, api: &dyn CatalogApi) {
        self.state = ViewState::Loading;
        self.state = match api.anime(&self.anime_id).await {
            Ok(details) => ViewState::Loaded(details),
            Err(e) => {
                warn!(anime_id = %self.anime_id, "anime details failed: {e}");
                ViewState::Failed(e.into())
            }
        };
    }

    pub fn state(&self) -> &ViewState<AnimeDetailsData> {
        &self.state
    }

    pub fn genres(&self) -> &[String] {
        self.state
            .data()
            .map(|d| d.anime.more_info.genres.as_slice())
            .unwrap_or(&[])
    }
}

/// What a [`PagedView`] lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    AzList { sort_option: String },
    Genre(String),
    Category(String),
    Producer(String),
    Search(SearchQuery),
}

impl Listing {
    async fn fetch(&self, api: &dyn CatalogApi, page: u32) -> Result<AnimePage, ApiError> {
        match self {
            Listing::AzList { sort_option } => api.azlist(sort_option, page).await,
            Listing::Genre(name) => api.genre(name, page).await,
            Listing::Category(name) => api.category(name, page).await,
            Listing::Producer(name) => api.producer(name, page).await,
            Listing::Search(query) => api.search(query, page).await,
        }
    }
}

#[derive(Debug)]
pub struct PagedView {
    listing: Listing,
    page: u32,
    info: PageInfo,
    items: Vec<AnimeCard>,
    loading: bool,
    error: Option<ViewError>,
}

impl PagedView {
    pub fn new(listing: Listing) -> Self {
        Self {
            listing,
            page: 1,
            info: PageInfo::default(),
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn azlist() -> Self {
        Self::new(Listing::AzList {
            sort_option: DEFAULT_AZ_SORT.to_string(),
        })
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn info(&self) -> PageInfo {
        self.info
    }

    pub fn items(&self) -> &[AnimeCard] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&ViewError> {
        self.error.as_ref()
    }

    /// Fetches the current page. A search with an empty query clears the
    /// grid without calling the relay.
    pub async fn load(&mut self, api: &dyn CatalogApi) {
        if let Listing::Search(query) = &self.listing {
            if query.q.trim().is_empty() {
                self.items.clear();
                self.info = PageInfo::default();
                self.error = None;
                self.loading = false;
                return;
            }
        }

        self.loading = true;
        self.error = None;
        match self.listing.fetch(api, self.page).await {
            Ok(page) => {
                self.items = page.animes;
                self.info = page.page;
            }
            Err(e) => {
                warn!(listing = ?self.listing, page = self.page, "listing fetch failed: {e}");
                self.items.clear();
                self.error = Some(e.into());
            }
        }
        self.loading = false;
    }

    /// Returns false when there is no next page.
    pub async fn next_page(&mut self, api: &dyn CatalogApi) -> bool {
        if !self.info.has_next_page {
            return false;
        }
        self.page += 1;
        self.load(api).await;
        true
    }

    /// Returns false on page 1.
    pub async fn prev_page(&mut self, api: &dyn CatalogApi) -> bool {
        if self.page <= 1 {
            return false;
        }
        self.page -= 1;
        self.load(api).await;
        true
    }

    pub async fn goto_page(&mut self, api: &dyn CatalogApi, page: u32) {
        self.page = page.max(1);
        self.load(api).await;
    }

    /// Changes the A-Z sort option and restarts from page 1. Ignored for
    /// other listings.
    pub async fn set_sort(&mut self, api: &dyn CatalogApi, sort: &str) -> bool {
        let Listing::AzList { sort_option } = &mut self.listing else {
            return false;
        };
        *sort_option = sort.to_string();
        self.page = 1;
        self.load(api).await;
        true
    }

    /// Sets or clears a search filter and restarts from page 1. Ignored for
    /// non-search listings.
    pub async fn set_filter(&mut self, api: &dyn CatalogApi, key: &str, value: &str) -> bool {
        let Listing::Search(query) = &mut self.listing else {
            return false;
        };
        query.set_filter(key, value);
        self.page = 1;
        self.load(api).await;
        true
    }
}
