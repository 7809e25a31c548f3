/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - ANIKAI Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Client-side view logic for the relay: the typed API client, the browse
//! grids, debounced suggestions, the spotlight carousel and the playback
//! state machine. Nothing here renders; views expose state for a UI shell.

pub mod api;
pub mod browse;
pub mod carousel;
pub mod debounce;
pub mod playback;

pub use api::{ApiError, CatalogApi, RelayApiClient, SearchQuery};
