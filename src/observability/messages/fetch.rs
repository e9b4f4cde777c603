// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for outbound fetches and cache fallbacks.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A background fetch failed; the affected resource is left alone.
///
/// # Log Level
/// `warn!`
pub struct BackgroundFetchFailed<'a> {
    pub url: &'a str,
    pub reason: &'a str,
}

impl Display for BackgroundFetchFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Background fetch of {} failed, leaving it untouched: {}", self.url, self.reason)
    }
}

impl StructuredLog for BackgroundFetchFailed<'_> {
    fn log(&self) {
        tracing::warn!(url = self.url, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("background_fetch", span_name = name, url = self.url)
    }
}

/// A fetch failed and an expired cache entry was served instead.
///
/// # Log Level
/// `warn!`
pub struct StaleFallback<'a> {
    pub url: &'a str,
    pub reason: &'a str,
}

impl Display for StaleFallback<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Serving stale cache entry for {}: {}", self.url, self.reason)
    }
}

impl StructuredLog for StaleFallback<'_> {
    fn log(&self) {
        tracing::warn!(url = self.url, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("stale_fallback", span_name = name, url = self.url)
    }
}

/// # Log Level
/// `trace!`
pub struct CacheHit<'a> {
    pub url: &'a str,
}

impl Display for CacheHit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cache hit for {}", self.url)
    }
}

impl StructuredLog for CacheHit<'_> {
    fn log(&self) {
        tracing::trace!(url = self.url, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("cache_hit", span_name = name, url = self.url)
    }
}
