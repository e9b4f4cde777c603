// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fetcher::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse};
use crate::config::CacheConfig;
use crate::errors::FetchError;
use crate::observability::messages::fetch::{CacheHit, StaleFallback};
use crate::observability::messages::StructuredLog;

/// Where a response came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Fetched from the origin just now.
    Fresh(HttpResponse),
    /// Served from an unexpired cache entry.
    Cached(HttpResponse),
    /// The origin failed and an expired entry was served instead.
    Stale {
        response: HttpResponse,
        error: FetchError,
    },
}

impl FetchOutcome {
    pub fn response(&self) -> &HttpResponse {
        match self {
            FetchOutcome::Fresh(response) | FetchOutcome::Cached(response) => response,
            FetchOutcome::Stale { response, .. } => response,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        match self {
            FetchOutcome::Fresh(response) | FetchOutcome::Cached(response) => response,
            FetchOutcome::Stale { response, .. } => response,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, FetchOutcome::Stale { .. })
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    response: HttpResponse,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// GET-response cache in front of another fetcher.
///
/// Entries outlive their TTL (bounded only by capacity) so that an origin
/// failure can fall back to them. Error statuses are cached for the shorter
/// negative TTL. Lookups are check-then-act: concurrent misses for the same
/// URL each go to the origin.
pub struct CachingFetcher {
    inner: Arc<dyn HttpFetcher>,
    cache: Cache<String, CachedEntry>,
    ttl: Duration,
    negative_ttl: Duration,
}

impl CachingFetcher {
    pub fn new(inner: Arc<dyn HttpFetcher>, config: &CacheConfig) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(config.capacity).build(),
            ttl: config.ttl(),
            negative_ttl: config.negative_ttl(),
        }
    }

    pub async fn fetch_with_fallback(&self, request: &HttpRequest) -> Result<FetchOutcome, FetchError> {
        if request.method != HttpMethod::Get {
            return self.inner.fetch(request).await.map(FetchOutcome::Fresh);
        }

        let key = request.url.to_string();
        let cached = self.cache.get(&key);
        if !request.ignore_cache {
            if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh()) {
                CacheHit { url: &key }.log();
                return Ok(FetchOutcome::Cached(entry.response.clone()));
            }
        }

        match self.inner.fetch(request).await {
            Ok(response) => {
                let ttl = if response.is_ok() {
                    self.ttl
                } else {
                    self.negative_ttl
                };
                if !ttl.is_zero() {
                    self.cache.insert(
                        key,
                        CachedEntry {
                            response: response.clone(),
                            stored_at: Instant::now(),
                            ttl,
                        },
                    );
                }
                Ok(FetchOutcome::Fresh(response))
            }
            Err(error) => match cached {
                Some(entry) if entry.response.is_ok() => {
                    StaleFallback {
                        url: &key,
                        reason: &error.to_string(),
                    }
                    .log();
                    Ok(FetchOutcome::Stale {
                        response: entry.response,
                        error,
                    })
                }
                _ => Err(error),
            },
        }
    }
}

#[async_trait]
impl HttpFetcher for CachingFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.fetch_with_fallback(request)
            .await
            .map(FetchOutcome::into_response)
    }
}
