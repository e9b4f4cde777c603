// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::config::RewriteConfig;
use crate::errors::{ErrorCode, GadgetError};
use crate::spec::GadgetSpec;

/// Feature a gadget uses to tune rewriting of its own content.
pub const CONTENT_REWRITE_FEATURE: &str = "content-rewrite";

/// Which URLs and tags a gadget's content may have rewritten.
///
/// Server defaults apply unless the gadget requests `content-rewrite` with
/// `include-urls`, `exclude-urls`, `include-tags` or `expires` params.
#[derive(Debug, Clone)]
pub struct ContentRewriterFeature {
    include_pattern: String,
    exclude_pattern: String,
    include_urls: Option<Regex>,
    exclude_urls: Option<Regex>,
    include_tags: BTreeSet<String>,
    expires: Option<u64>,
    fingerprint: u32,
}

impl ContentRewriterFeature {
    pub fn from_spec(spec: &GadgetSpec, defaults: &RewriteConfig) -> Result<Self, GadgetError> {
        let request = spec.feature(CONTENT_REWRITE_FEATURE);
        let param = |name: &str| request.and_then(|r| r.param(name));

        let include = param("include-urls").unwrap_or(&defaults.include_urls);
        let exclude = param("exclude-urls").unwrap_or(&defaults.exclude_urls);
        let tags: BTreeSet<String> = match param("include-tags") {
            Some(list) => list
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            None => defaults.include_tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
        };
        let expires = match param("expires") {
            Some(value) if value.trim().eq_ignore_ascii_case("http") => None,
            Some(value) => Some(value.trim().parse().map_err(|_| {
                GadgetError::new(
                    ErrorCode::MalformedXmlDocument,
                    format!("content-rewrite expires is not a number: '{value}'"),
                )
            })?),
            None => Some(defaults.expires_seconds),
        };

        Self::new(include, exclude, tags, expires)
    }

    pub fn new(include: &str, exclude: &str, include_tags: BTreeSet<String>, expires: Option<u64>) -> Result<Self, GadgetError> {
        let compile = |pattern: &str| -> Result<Option<Regex>, GadgetError> {
            if pattern.trim().is_empty() {
                return Ok(None);
            }
            Regex::new(pattern).map(Some).map_err(|err| {
                GadgetError::new(
                    ErrorCode::MalformedXmlDocument,
                    format!("invalid content-rewrite pattern '{pattern}': {err}"),
                )
            })
        };
        let fingerprint = fingerprint(include, exclude, &include_tags);
        Ok(Self {
            include_urls: compile(include)?,
            exclude_urls: compile(exclude)?,
            include_pattern: include.to_string(),
            exclude_pattern: exclude.to_string(),
            include_tags,
            expires,
            fingerprint,
        })
    }

    /// Included and not excluded. An empty include pattern matches nothing.
    pub fn should_rewrite_url(&self, url: &str) -> bool {
        let included = self.include_urls.as_ref().is_some_and(|re| re.is_match(url));
        let excluded = self.exclude_urls.as_ref().is_some_and(|re| re.is_match(url));
        included && !excluded
    }

    pub fn should_rewrite_tag(&self, tag: &str) -> bool {
        self.include_tags.contains(&tag.to_ascii_lowercase())
    }

    pub fn include_tags(&self) -> &BTreeSet<String> {
        &self.include_tags
    }

    pub fn include_pattern(&self) -> &str {
        &self.include_pattern
    }

    pub fn exclude_pattern(&self) -> &str {
        &self.exclude_pattern
    }

    /// Cache lifetime for rewritten resources; `None` defers to the origin.
    pub fn expires(&self) -> Option<u64> {
        self.expires
    }

    /// Changes whenever the rules change, busting caches of rewritten URLs.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }
}

/// First four bytes of `sha256("include|exclude|tag,tag")`, big-endian.
fn fingerprint(include: &str, exclude: &str, tags: &BTreeSet<String>) -> u32 {
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    let digest = Sha256::digest(format!("{include}|{exclude}|{}", tags.join(",")).as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn spec(prefs: &str) -> GadgetSpec {
        GadgetSpec::parse(
            Url::parse("http://example.org/g.xml").unwrap(),
            &format!(r#"<Module><ModulePrefs title="t">{prefs}</ModulePrefs><Content>x</Content></Module>"#),
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply_without_feature() {
        let feature = ContentRewriterFeature::from_spec(&spec(""), &RewriteConfig::default()).unwrap();
        assert!(feature.should_rewrite_url("http://cdn.example.org/a.png"));
        assert!(feature.should_rewrite_tag("IMG"));
        assert!(!feature.should_rewrite_tag("body"));
        assert_eq!(feature.expires(), Some(86400));
    }

    #[test]
    fn gadget_params_override_defaults() {
        let feature = ContentRewriterFeature::from_spec(
            &spec(
                r#"<Optional feature="content-rewrite">
                     <Param name="include-urls">\.png$</Param>
                     <Param name="exclude-urls">private</Param>
                     <Param name="include-tags">IMG, script</Param>
                     <Param name="expires">HTTP</Param>
                   </Optional>"#,
            ),
            &RewriteConfig::default(),
        )
        .unwrap();
        assert!(feature.should_rewrite_url("http://a.example/x.png"));
        assert!(!feature.should_rewrite_url("http://a.example/private/x.png"));
        assert!(!feature.should_rewrite_url("http://a.example/x.js"));
        assert_eq!(
            feature.include_tags().iter().cloned().collect::<Vec<_>>(),
            vec!["img", "script"]
        );
        assert_eq!(feature.expires(), None);
    }

    #[test]
    fn empty_include_matches_nothing() {
        let feature = ContentRewriterFeature::new("", "", BTreeSet::new(), None).unwrap();
        assert!(!feature.should_rewrite_url("http://a.example/x.png"));
    }

    #[test]
    fn fingerprint_tracks_rules_not_tag_order() {
        let tags = |list: &[&str]| list.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>();
        let a = ContentRewriterFeature::new(".*", "", tags(&["img", "script"]), None).unwrap();
        let b = ContentRewriterFeature::new(".*", "", tags(&["script", "img"]), Some(5)).unwrap();
        let c = ContentRewriterFeature::new(".*", "x", tags(&["img", "script"]), None).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = ContentRewriterFeature::new("(", "", BTreeSet::new(), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedXmlDocument);
    }
}
