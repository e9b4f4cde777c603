// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use url::Url;

use super::locale::Locale;
use crate::config::consts::{DEFAULT_CONTAINER, DEFAULT_VIEW};
use crate::errors::{ErrorCode, GadgetError};

/// Prefix of query parameters carrying user preference values.
pub const USER_PREF_PREFIX: &str = "up_";

/// Which page the JS is destined for: the gadget iframe or the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderingContext {
    #[default]
    Gadget,
    Container,
}

/// Everything a single render request says about the gadget it wants.
#[derive(Debug, Clone, PartialEq)]
pub struct GadgetContext {
    pub url: Url,
    pub container: String,
    pub module_id: u64,
    /// Bypass spec, bundle and resource caches.
    pub ignore_cache: bool,
    pub version: Option<String>,
    pub locale: Locale,
    pub view: String,
    pub debug: bool,
    pub user_prefs: BTreeMap<String, String>,
    pub rendering_context: RenderingContext,
}

impl GadgetContext {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            container: DEFAULT_CONTAINER.to_string(),
            module_id: 0,
            ignore_cache: false,
            version: None,
            locale: Locale::default(),
            view: DEFAULT_VIEW.to_string(),
            debug: false,
            user_prefs: BTreeMap::new(),
            rendering_context: RenderingContext::Gadget,
        }
    }

    /// Builds a context from iframe query parameters.
    ///
    /// # Errors
    /// `MissingParameter` when `url` is absent, `InvalidParameter` when
    /// `url` is not an absolute http(s) URL or `mid` is not an integer.
    pub fn from_query<I, K, V>(pairs: I) -> Result<Self, GadgetError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let mut user_prefs = BTreeMap::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key.strip_prefix(USER_PREF_PREFIX) {
                Some(pref) if !pref.is_empty() => {
                    user_prefs.insert(pref.to_string(), value.to_string());
                }
                _ => {
                    params.insert(key.to_string(), value.to_string());
                }
            }
        }

        let raw_url = params
            .get("url")
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GadgetError::new(ErrorCode::MissingParameter, "missing url parameter"))?;
        let url = Url::parse(raw_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| {
                GadgetError::new(
                    ErrorCode::InvalidParameter,
                    format!("url parameter is not an absolute http(s) url: '{raw_url}'"),
                )
            })?;

        let mut context = Self::new(url);
        context.user_prefs = user_prefs;
        let non_empty = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.is_empty());

        if let Some(container) = non_empty("container") {
            context.container = container.to_string();
        }
        if let Some(mid) = non_empty("mid") {
            context.module_id = mid.trim().parse().map_err(|_| {
                GadgetError::new(
                    ErrorCode::InvalidParameter,
                    format!("mid parameter is not an integer: '{mid}'"),
                )
            })?;
        }
        context.ignore_cache = non_empty("nocache") == Some("1");
        context.version = non_empty("v").map(str::to_string);
        context.locale = Locale::new(
            non_empty("lang").unwrap_or("all"),
            non_empty("country").unwrap_or("ALL"),
        );
        if let Some(view) = non_empty("view") {
            context.view = view.to_string();
        }
        context.debug = matches!(non_empty("debug"), Some("1") | Some("true"));
        if non_empty("c") == Some("1") {
            context.rendering_context = RenderingContext::Container;
        }
        Ok(context)
    }

    pub fn with_container(mut self, container: &str) -> Self {
        self.container = container.to_string();
        self
    }

    pub fn with_view(mut self, view: &str) -> Self {
        self.view = view.to_string();
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_module_id(mut self, module_id: u64) -> Self {
        self.module_id = module_id;
        self
    }

    pub fn with_user_pref(mut self, name: &str, value: &str) -> Self {
        self.user_prefs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_url_given() {
        let context = GadgetContext::from_query([("url", "http://example.org/g.xml")]).unwrap();
        assert_eq!(context.container, "default");
        assert_eq!(context.module_id, 0);
        assert_eq!(context.view, "default");
        assert_eq!(context.locale, Locale::new("all", "ALL"));
        assert!(!context.ignore_cache);
        assert_eq!(context.rendering_context, RenderingContext::Gadget);
    }

    #[test]
    fn reads_every_parameter() {
        let context = GadgetContext::from_query(vec![
            ("url", "https://example.org/g.xml"),
            ("container", "social"),
            ("mid", "12"),
            ("nocache", "1"),
            ("v", "abc"),
            ("lang", "DE"),
            ("country", "at"),
            ("view", "canvas"),
            ("debug", "1"),
            ("up_color", "red"),
            ("c", "1"),
        ])
        .unwrap();
        assert_eq!(context.container, "social");
        assert_eq!(context.module_id, 12);
        assert!(context.ignore_cache);
        assert_eq!(context.version.as_deref(), Some("abc"));
        assert_eq!(context.locale, Locale::new("de", "AT"));
        assert_eq!(context.view, "canvas");
        assert!(context.debug);
        assert_eq!(context.user_prefs.get("color").map(String::as_str), Some("red"));
        assert_eq!(context.rendering_context, RenderingContext::Container);
    }

    #[test]
    fn missing_url_is_missing_parameter() {
        let err = GadgetContext::from_query([("mid", "1")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }

    #[test]
    fn bad_url_or_mid_is_invalid_parameter() {
        let err = GadgetContext::from_query([("url", "not a url")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
        let err = GadgetContext::from_query([("url", "ftp://example.org/g.xml")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
        let err = GadgetContext::from_query([("url", "http://example.org/g.xml"), ("mid", "x")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
