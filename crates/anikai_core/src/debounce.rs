/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::api::CatalogApi;
use anikai_protocol::Suggestion;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const SUGGESTION_DELAY: Duration = Duration::from_millis(300);
pub const MIN_SUGGESTION_CHARS: usize = 2;

/// Runs only the most recent call, `delay` after it was made. A newer call
/// aborts the pending one, including a fetch already in flight.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Schedules `fut`, dropping any call still pending. Must be called
    /// inside a tokio runtime.
    pub fn call<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionState {
    pub query: String,
    pub items: Vec<Suggestion>,
    pub error: Option<String>,
}

/// Typeahead backing the search box.
pub struct SuggestionBox {
    api: Arc<dyn CatalogApi>,
    debouncer: Debouncer,
    state: Arc<watch::Sender<SuggestionState>>,
}

impl SuggestionBox {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        Self::with_delay(api, SUGGESTION_DELAY)
    }

    pub fn with_delay(api: Arc<dyn CatalogApi>, delay: Duration) -> Self {
        let (tx, _) = watch::channel(SuggestionState::default());
        Self {
            api,
            debouncer: Debouncer::new(delay),
            state: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    pub fn input(&mut self, text: &str) {
        let query = text.trim().to_string();
        if query.chars().count() < MIN_SUGGESTION_CHARS {
            self.debouncer.cancel();
            self.state.send_replace(SuggestionState {
                query,
                ..SuggestionState::default()
            });
            return;
        }

        let api = self.api.clone();
        let state = self.state.clone();
        self.debouncer.call(async move {
            debug!(q = %query, "fetching suggestions");
            let next = match api.suggestions(&query).await {
                Ok(items) => SuggestionState {
                    query,
                    items,
                    error: None,
                },
                Err(e) => {
                    warn!(q = %query, "suggestions failed: {e}");
                    SuggestionState {
                        query,
                        items: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            state.send_replace(next);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, SearchQuery};
    use anikai_protocol::{
        AnimeDetailsData, AnimePage, Category, EpisodeList, EpisodeServers, EpisodeSources, HomeData,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct SuggestApi {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CatalogApi for SuggestApi {
        async fn suggestions(&self, q: &str) -> Result<Vec<Suggestion>, ApiError> {
            self.queries.lock().unwrap().push(q.to_string());
            if q == "err" {
                return Err(ApiError::Transport("connection reset".into()));
            }
            Ok(vec![Suggestion {
                id: format!("{q}-1"),
                name: q.to_string(),
                ..Suggestion::default()
            }])
        }
        async fn home(&self) -> Result<HomeData, ApiError> {
            unimplemented!()
        }
        async fn azlist(&self, _: &str, _: u32) -> Result<AnimePage, ApiError> {
            unimplemented!()
        }
        async fn genre(&self, _: &str, _: u32) -> Result<AnimePage, ApiError> {
            unimplemented!()
        }
        async fn category(&self, _: &str, _: u32) -> Result<AnimePage, ApiError> {
            unimplemented!()
        }
        async fn producer(&self, _: &str, _: u32) -> Result<AnimePage, ApiError> {
            unimplemented!()
        }
        async fn search(&self, _: &SearchQuery, _: u32) -> Result<AnimePage, ApiError> {
            unimplemented!()
        }
        async fn anime(&self, _: &str) -> Result<AnimeDetailsData, ApiError> {
            unimplemented!()
        }
        async fn episodes(&self, _: &str) -> Result<EpisodeList, ApiError> {
            unimplemented!()
        }
        async fn servers(&self, _: &str) -> Result<EpisodeServers, ApiError> {
            unimplemented!()
        }
        async fn sources(&self, _: &str, _: &str, _: Category) -> Result<EpisodeSources, ApiError> {
            unimplemented!()
        }
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_last_call_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut d = Debouncer::new(Duration::from_millis(300));
        for i in 1..=3 {
            let fired = fired.clone();
            d.call(async move {
                fired.store(i, Ordering::SeqCst);
            });
            settle(100).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        settle(250).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(!d.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_call() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut d = Debouncer::new(Duration::from_millis(300));
            let f = fired.clone();
            d.call(async move {
                f.store(1, Ordering::SeqCst);
            });
        }
        settle(500).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_fetches_once_for_latest_text() {
        let api = Arc::new(SuggestApi::default());
        let mut boxed = SuggestionBox::new(api.clone());
        boxed.input("n");
        boxed.input("na");
        settle(100).await;
        boxed.input("nar");
        settle(100).await;
        boxed.input("naru");
        settle(400).await;

        assert_eq!(*api.queries.lock().unwrap(), vec!["naru".to_string()]);
        let state = boxed.current();
        assert_eq!(state.query, "naru");
        assert_eq!(state.items[0].id, "naru-1");
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_clears_without_fetch() {
        let api = Arc::new(SuggestApi::default());
        let mut boxed = SuggestionBox::new(api.clone());
        boxed.input("one");
        settle(400).await;
        assert_eq!(boxed.current().items.len(), 1);

        boxed.input("o");
        settle(400).await;
        assert!(boxed.current().items.is_empty());
        assert_eq!(api.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_kept_in_state() {
        let api = Arc::new(SuggestApi::default());
        let mut boxed = SuggestionBox::new(api);
        let mut rx = boxed.subscribe();
        boxed.input("err");
        settle(400).await;
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.items.is_empty());
        assert_eq!(state.error.as_deref(), Some("network error: connection reset"));
    }
}
