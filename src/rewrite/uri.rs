// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use url::Url;

use super::feature::ContentRewriterFeature;
use crate::config::RewriteConfig;
use crate::gadget::append_query;

/// Schemes that never point at a fetchable resource.
const SKIPPED_PREFIXES: &[&str] = &["data:", "javascript:", "about:", "mailto:", "#"];

/// Per-gadget state shared by the rewriting visitors: the rules, the
/// gadget's URL for resolving relative references, and the proxy/concat
/// endpoints.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    feature: ContentRewriterFeature,
    gadget_url: Url,
    proxy_base: String,
    concat_base: String,
    ignore_cache: bool,
}

impl RewriteContext {
    pub fn new(feature: ContentRewriterFeature, gadget_url: Url, config: &RewriteConfig, ignore_cache: bool) -> Self {
        Self {
            feature,
            gadget_url,
            proxy_base: config.proxy_base.clone(),
            concat_base: config.concat_base.clone(),
            ignore_cache,
        }
    }

    pub fn feature(&self) -> &ContentRewriterFeature {
        &self.feature
    }

    pub fn gadget_url(&self) -> &Url {
        &self.gadget_url
    }

    fn already_rewritten(&self, value: &str) -> bool {
        value.starts_with(&self.proxy_base) || value.starts_with(&self.concat_base)
    }

    /// Resolves a reference found in content to an absolute http(s) URL,
    /// skipping non-resource schemes and URLs that were already rewritten.
    pub fn resolve(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        if raw.is_empty() || SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) || self.already_rewritten(raw) {
            return None;
        }
        let resolved = self.gadget_url.join(raw).ok()?;
        if !matches!(resolved.scheme(), "http" | "https") || self.already_rewritten(resolved.as_str()) {
            return None;
        }
        Some(resolved)
    }

    /// [`resolve`](Self::resolve) filtered by the include/exclude rules.
    pub fn rewritable(&self, raw: &str) -> Option<Url> {
        self.resolve(raw)
            .filter(|url| self.feature.should_rewrite_url(url.as_str()))
    }

    /// `<proxy>?url=<resource>&gadget=<gadget>&fp=<fingerprint>`, plus
    /// `nocache=1` when caching is bypassed and `refresh=<secs>` when the
    /// rewrite rules set an expiry.
    pub fn proxy_url(&self, resource: &Url) -> String {
        self.proxy_url_with(resource, &[])
    }

    /// [`proxy_url`](Self::proxy_url) with extra trailing parameters.
    pub fn proxy_url_with(&self, resource: &Url, extra: &[(&str, &str)]) -> String {
        let fingerprint = self.feature.fingerprint().to_string();
        let refresh = self.refresh();
        let mut pairs = vec![
            ("url", resource.as_str()),
            ("gadget", self.gadget_url.as_str()),
            ("fp", fingerprint.as_str()),
        ];
        self.push_cache_params(&mut pairs, refresh.as_deref());
        pairs.extend_from_slice(extra);
        append_query(&self.proxy_base, &pairs)
    }

    /// `<concat>?gadget=<gadget>&fp=<fingerprint>&1=<first>&2=<second>...`.
    pub fn concat_url(&self, resources: &[Url]) -> String {
        let fingerprint = self.feature.fingerprint().to_string();
        let indexes: Vec<String> = (1..=resources.len()).map(|i| i.to_string()).collect();
        let refresh = self.refresh();
        let mut pairs = vec![
            ("gadget", self.gadget_url.as_str()),
            ("fp", fingerprint.as_str()),
        ];
        self.push_cache_params(&mut pairs, refresh.as_deref());
        pairs.extend(indexes.iter().map(String::as_str).zip(resources.iter().map(Url::as_str)));
        append_query(&self.concat_base, &pairs)
    }

    fn refresh(&self) -> Option<String> {
        self.feature.expires().map(|secs| secs.to_string())
    }

    fn push_cache_params<'a>(&self, pairs: &mut Vec<(&'a str, &'a str)>, refresh: Option<&'a str>) {
        if self.ignore_cache {
            pairs.push(("nocache", "1"));
        }
        if let Some(refresh) = refresh {
            pairs.push(("refresh", refresh));
        }
    }

    pub fn concat_base(&self) -> &str {
        &self.concat_base
    }
}
