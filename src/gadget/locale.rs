// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures::future::join_all;
use std::fmt;

use crate::errors::GadgetError;
use crate::http::{HttpFetcher, HttpRequest};
use crate::spec::{GadgetSpec, LocaleSpec, MessageBundle};

/// A language/country pair. `all`/`ALL` act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    pub language: String,
    pub country: String,
}

impl Locale {
    pub fn new(language: &str, country: &str) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            country: country.to_ascii_uppercase(),
        }
    }

    /// Candidate locales from least to most specific.
    fn fallback_chain(&self) -> Vec<Locale> {
        let mut chain = vec![
            Locale::new("all", "ALL"),
            Locale::new("all", &self.country),
            Locale::new(&self.language, "ALL"),
            self.clone(),
        ];
        chain.dedup();
        chain
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::new("all", "ALL")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.language, self.country)
    }
}

/// Messages and text direction resolved for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMessages {
    pub bundle: MessageBundle,
    pub direction: String,
}

/// The spec's `<Locale>` entries that apply to `locale`, least specific first.
pub fn matching_locales<'a>(spec: &'a GadgetSpec, locale: &Locale) -> Vec<&'a LocaleSpec> {
    locale
        .fallback_chain()
        .iter()
        .filter_map(|candidate| {
            spec.module_prefs()
                .locales
                .iter()
                .find(|l| l.language == candidate.language && l.country == candidate.country)
        })
        .collect()
}

/// Fetches and merges the message bundles for `locale`.
///
/// Remote bundles for every matching locale are fetched in parallel, then
/// merged from least to most specific so the exact locale wins. Inline
/// `<msg>` entries are layered over their locale's remote bundle.
///
/// # Errors
/// `FailedToRetrieveContent` when any matching bundle cannot be fetched;
/// `MalformedXmlDocument` when one cannot be parsed.
pub async fn resolve_messages(
    spec: &GadgetSpec,
    locale: &Locale,
    fetcher: &dyn HttpFetcher,
    ignore_cache: bool,
) -> Result<ResolvedMessages, GadgetError> {
    let matches = matching_locales(spec, locale);

    let fetches = matches.iter().map(|locale_spec| async move {
        let Some(url) = &locale_spec.messages else {
            return Ok(MessageBundle::default());
        };
        let request = HttpRequest::get(url.clone()).with_ignore_cache(ignore_cache);
        let response = fetcher.fetch(&request).await?;
        if !response.is_ok() {
            return Err(GadgetError::retrieval(format!(
                "message bundle {url} returned status {}",
                response.status
            )));
        }
        MessageBundle::parse(&response.text())
    });
    let remote = join_all(fetches).await;

    let mut bundle = MessageBundle::default();
    for (locale_spec, fetched) in matches.iter().zip(remote) {
        bundle.merge(&fetched?);
        bundle.merge(&locale_spec.inline_messages);
    }

    let direction = matches
        .last()
        .map(|l| l.direction.clone())
        .unwrap_or_else(|| "ltr".to_string());
    Ok(ResolvedMessages { bundle, direction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::http::testing::FakeFetcher;
    use crate::http::HttpResponse;
    use url::Url;

    const SPEC: &str = r#"<Module>
  <ModulePrefs title="t">
    <Locale messages="http://example.org/ALL_ALL.xml"/>
    <Locale lang="en" messages="http://example.org/en_ALL.xml"/>
    <Locale country="US" messages="http://example.org/ALL_US.xml"/>
    <Locale lang="en" country="US" language_direction="rtl">
      <msg name="exact">inline exact</msg>
    </Locale>
  </ModulePrefs>
  <Content>x</Content>
</Module>"#;

    fn spec() -> GadgetSpec {
        GadgetSpec::parse(Url::parse("http://example.org/g.xml").unwrap(), SPEC).unwrap()
    }

    fn bundle(pairs: &[(&str, &str)]) -> HttpResponse {
        let body: String = pairs
            .iter()
            .map(|(k, v)| format!(r#"<msg name="{k}">{v}</msg>"#))
            .collect();
        HttpResponse::ok(format!("<messagebundle>{body}</messagebundle>"))
    }

    fn fetcher() -> FakeFetcher {
        FakeFetcher::new()
            .with_response(
                "http://example.org/ALL_ALL.xml",
                bundle(&[("a", "all_all"), ("b", "all_all"), ("c", "all_all"), ("exact", "all_all")]),
            )
            .with_response("http://example.org/ALL_US.xml", bundle(&[("b", "all_us"), ("c", "all_us")]))
            .with_response("http://example.org/en_ALL.xml", bundle(&[("c", "en_all")]))
    }

    #[test]
    fn matches_follow_fallback_order() {
        let spec = spec();
        let matched: Vec<String> = matching_locales(&spec, &Locale::new("en", "US"))
            .iter()
            .map(|l| format!("{}_{}", l.language, l.country))
            .collect();
        assert_eq!(matched, vec!["all_ALL", "all_US", "en_ALL", "en_US"]);
    }

    #[tokio::test]
    async fn more_specific_bundles_win() {
        let resolved = resolve_messages(&spec(), &Locale::new("en", "US"), &fetcher(), false)
            .await
            .unwrap();
        assert_eq!(resolved.bundle.get("a"), Some("all_all"));
        assert_eq!(resolved.bundle.get("b"), Some("all_us"));
        assert_eq!(resolved.bundle.get("c"), Some("en_all"));
        assert_eq!(resolved.bundle.get("exact"), Some("inline exact"));
        assert_eq!(resolved.direction, "rtl");
    }

    #[tokio::test]
    async fn unmatched_locale_uses_only_all_all() {
        let resolved = resolve_messages(&spec(), &Locale::new("fr", "FR"), &fetcher(), false)
            .await
            .unwrap();
        assert_eq!(resolved.bundle.get("c"), Some("all_all"));
        assert_eq!(resolved.direction, "ltr");
    }

    #[tokio::test]
    async fn failed_bundle_fetch_is_retrieval_error() {
        let fetcher = fetcher();
        fetcher.fail("http://example.org/en_ALL.xml");
        let err = resolve_messages(&spec(), &Locale::new("en", "GB"), &fetcher, false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FailedToRetrieveContent);
    }
}
