// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use regex::RegexSet;
use url::Url;

use crate::errors::ConfigError;

/// Spec URLs the server refuses to render.
#[derive(Debug, Clone)]
pub struct GadgetBlacklist {
    patterns: RegexSet,
}

impl GadgetBlacklist {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = RegexSet::new(patterns).map_err(|err| ConfigError::InvalidPattern {
            pattern: patterns.join(", "),
            reason: err.to_string(),
        })?;
        Ok(Self { patterns })
    }

    pub fn empty() -> Self {
        Self {
            patterns: RegexSet::empty(),
        }
    }

    pub fn is_blacklisted(&self, url: &Url) -> bool {
        self.patterns.is_match(url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_any_pattern() {
        let blacklist = GadgetBlacklist::new(&[
            r"^https?://evil\.example\.com/".to_string(),
            r"/forbidden\.xml$".to_string(),
        ])
        .unwrap();
        assert!(blacklist.is_blacklisted(&Url::parse("http://evil.example.com/g.xml").unwrap()));
        assert!(blacklist.is_blacklisted(&Url::parse("http://ok.example.com/forbidden.xml").unwrap()));
        assert!(!blacklist.is_blacklisted(&Url::parse("http://ok.example.com/g.xml").unwrap()));
        assert!(!GadgetBlacklist::empty().is_blacklisted(&Url::parse("http://evil.example.com/").unwrap()));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = GadgetBlacklist::new(&["(".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
