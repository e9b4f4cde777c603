// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Outbound HTTP: the fetcher seam, a reqwest-backed implementation and a
//! caching layer with explicit stale fallback.

mod cache;
mod fetcher;
mod remote;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CachingFetcher, FetchOutcome};
pub use fetcher::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse};
pub use remote::RemoteFetcher;
