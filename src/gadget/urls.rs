// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Iframe URLs for rendering gadgets and the locked-domain policy that
//! decides which hosts may serve them.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;
use urlencoding::encode;

use super::context::{GadgetContext, USER_PREF_PREFIX};
use crate::config::LockedDomainConfig;
use crate::spec::GadgetSpec;

/// Feature a gadget requires to demand rendering on its own domain.
pub const LOCKED_DOMAIN_FEATURE: &str = "locked-domain";

/// Appends `key=value` pairs to a base that may already carry a query.
pub(crate) fn append_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = base.to_string();
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in pairs {
        out.push(separator);
        out.push_str(&encode(key));
        out.push('=');
        out.push_str(&encode(value));
        separator = '&';
    }
    out
}

/// Builds the URL a container points an iframe at.
#[derive(Debug, Clone)]
pub struct IframeUrlBuilder {
    base: String,
}

impl IframeUrlBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
        }
    }

    /// `<base>?container=&mid=&v=&lang=&country=&view=&url=` followed by an
    /// `up_` parameter for every pref the spec declares (request value, else
    /// the declared default) and `nocache=1` when caching is bypassed.
    pub fn build(&self, context: &GadgetContext, spec: &GadgetSpec) -> String {
        let mid = context.module_id.to_string();
        let mut pairs: Vec<(String, String)> = vec![
            ("container".into(), context.container.clone()),
            ("mid".into(), mid),
        ];
        if let Some(version) = &context.version {
            pairs.push(("v".into(), version.clone()));
        }
        pairs.push(("lang".into(), context.locale.language.clone()));
        pairs.push(("country".into(), context.locale.country.clone()));
        pairs.push(("view".into(), context.view.clone()));
        pairs.push(("url".into(), spec.url().to_string()));

        for pref in spec.user_prefs() {
            let value = context
                .user_prefs
                .get(&pref.name)
                .unwrap_or(&pref.default_value);
            pairs.push((format!("{USER_PREF_PREFIX}{}", pref.name), value.clone()));
        }
        if context.ignore_cache {
            pairs.push(("nocache".into(), "1".into()));
        }

        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        append_query(&self.base, &borrowed)
    }
}

/// Assigns each gadget a host of its own so that gadgets cannot script each
/// other through the same origin.
#[derive(Debug, Clone)]
pub struct LockedDomainService {
    enabled: bool,
    suffix: String,
    required_containers: HashSet<String>,
}

impl LockedDomainService {
    pub fn new(config: &LockedDomainConfig) -> Self {
        Self {
            enabled: config.enabled,
            suffix: config.suffix.clone(),
            required_containers: config.required_containers.iter().cloned().collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `hex(sha256(url))`, truncated to 32 characters, plus the suffix.
    pub fn locked_host(&self, gadget_url: &Url) -> String {
        let digest = hex::encode(Sha256::digest(gadget_url.as_str().as_bytes()));
        format!("{}{}", &digest[..32], self.suffix)
    }

    /// The host a gadget should render on, when locking is enabled.
    pub fn locked_host_for(&self, spec: &GadgetSpec) -> Option<String> {
        self.enabled.then(|| self.locked_host(spec.url()))
    }

    fn locking_required(&self, spec: &GadgetSpec, container: &str) -> bool {
        self.required_containers.contains(container) || spec.feature(LOCKED_DOMAIN_FEATURE).is_some()
    }

    /// Whether `host` may serve `spec` for `container`.
    ///
    /// The gadget's own locked host is always accepted. Another gadget's
    /// locked host never is. Any other host is accepted unless locking is
    /// required by the container or the spec.
    pub fn gadget_can_render(&self, host: &str, spec: &GadgetSpec, container: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let host = host.to_ascii_lowercase();
        if host == self.locked_host(spec.url()) {
            return true;
        }
        if host.ends_with(&self.suffix) {
            return false;
        }
        !self.locking_required(spec, container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadget::Locale;

    fn spec(extra_prefs: &str) -> GadgetSpec {
        GadgetSpec::parse(
            Url::parse("http://example.org/g.xml").unwrap(),
            &format!(
                r#"<Module><ModulePrefs title="t">{extra_prefs}</ModulePrefs>
                <UserPref name="color" default_value="blue"/><UserPref name="size"/>
                <Content>x</Content></Module>"#
            ),
        )
        .unwrap()
    }

    fn service(enabled: bool, required: &[&str]) -> LockedDomainService {
        LockedDomainService::new(&LockedDomainConfig {
            enabled,
            suffix: "-a.example.com".to_string(),
            required_containers: required.iter().map(|c| c.to_string()).collect(),
        })
    }

    #[test]
    fn iframe_url_carries_context_and_prefs() {
        let spec = spec("");
        let context = GadgetContext::new(spec.url().clone())
            .with_container("social")
            .with_module_id(3)
            .with_locale(Locale::new("en", "US"))
            .with_view("canvas")
            .with_user_pref("size", "large")
            .with_ignore_cache(true);

        let url = IframeUrlBuilder::new("/gadgets/ifr").build(&context, &spec);
        assert_eq!(
            url,
            "/gadgets/ifr?container=social&mid=3&lang=en&country=US&view=canvas\
             &url=http%3A%2F%2Fexample.org%2Fg.xml&up_color=blue&up_size=large&nocache=1"
        );
    }

    #[test]
    fn append_query_respects_existing_query() {
        assert_eq!(append_query("/p?a=1", &[("b", "x y")]), "/p?a=1&b=x%20y");
    }

    #[test]
    fn locked_host_is_stable_hash_prefix() {
        let spec = spec("");
        let host = service(true, &[]).locked_host(spec.url());
        assert!(host.ends_with("-a.example.com"));
        assert_eq!(host.len(), 32 + "-a.example.com".len());
        assert_eq!(host, service(false, &[]).locked_host(spec.url()));
    }

    #[test]
    fn render_policy() {
        let plain = spec("");
        let locked = spec(r#"<Require feature="locked-domain"/>"#);
        let svc = service(true, &["secure"]);
        let own = svc.locked_host(plain.url());

        assert!(svc.gadget_can_render(&own, &plain, "default"));
        assert!(svc.gadget_can_render("gadgets.example.com", &plain, "default"));
        assert!(!svc.gadget_can_render("gadgets.example.com", &plain, "secure"));
        assert!(!svc.gadget_can_render("gadgets.example.com", &locked, "default"));
        assert!(!svc.gadget_can_render("0123456789abcdef0123456789abcdef-a.example.com", &plain, "default"));
        assert!(service(false, &["secure"]).gadget_can_render("anything", &locked, "secure"));
    }
}
