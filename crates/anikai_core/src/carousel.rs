/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const SPOTLIGHT_INTERVAL: Duration = Duration::from_secs(5);

/// Spotlight index that auto-advances and wraps. The ticker task lives as
/// long as the carousel.
pub struct Carousel {
    len: usize,
    interval: Duration,
    index: Arc<watch::Sender<usize>>,
    ticker: Option<JoinHandle<()>>,
}

impl Carousel {
    /// Must be called inside a tokio runtime when `len > 1`.
    pub fn new(len: usize) -> Self {
        Self::with_interval(len, SPOTLIGHT_INTERVAL)
    }

    pub fn with_interval(len: usize, interval: Duration) -> Self {
        let (tx, _) = watch::channel(0usize);
        let mut carousel = Self {
            len,
            interval,
            index: Arc::new(tx),
            ticker: None,
        };
        carousel.restart();
        carousel
    }

    pub fn current(&self) -> usize {
        *self.index.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.index.subscribe()
    }

    pub fn next(&mut self) {
        if self.len == 0 {
            return;
        }
        let len = self.len;
        self.index.send_modify(|i| *i = (*i + 1) % len);
        self.restart();
    }

    pub fn prev(&mut self) {
        if self.len == 0 {
            return;
        }
        let len = self.len;
        self.index.send_modify(|i| *i = if *i == 0 { len - 1 } else { *i - 1 });
        self.restart();
    }

    fn restart(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        if self.len < 2 {
            return;
        }
        let len = self.len;
        let interval = self.interval;
        let index = self.index.clone();
        self.ticker = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                index.send_modify(|i| *i = (*i + 1) % len);
            }
        }));
    }
}

impl Drop for Carousel {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}
