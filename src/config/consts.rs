// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Container used when a request names none, and the root of every inheritance chain
pub const DEFAULT_CONTAINER: &str = "default";
/// View used when a request names none or the named view has no content
pub const DEFAULT_VIEW: &str = "default";
/// Query-string budget for a single concatenated resource URL
pub const CONCAT_LENGTH_BUDGET: usize = 1500;
/// Cache lifetime advertised for proxied resources (one day)
pub const DEFAULT_EXPIRES_SECONDS: u64 = 86_400;
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
/// Lifetime of cached error responses
pub const DEFAULT_NEGATIVE_TTL_SECONDS: u64 = 60;
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 30;
/// Largest response body accepted from a remote server (1 MiB)
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 1024 * 1024;
pub const DEFAULT_PROXY_BASE: &str = "/gadgets/proxy";
pub const DEFAULT_CONCAT_BASE: &str = "/gadgets/concat";
pub const DEFAULT_IFRAME_BASE: &str = "/gadgets/ifr";
pub const DEFAULT_JS_BASE: &str = "/gadgets/js";
pub const DEFAULT_LOCKED_DOMAIN_SUFFIX: &str = "-a.gadgets.example.com";
pub const DEFAULT_REWRITE_TAGS: &[&str] = &["embed", "img", "link", "script", "style"];
