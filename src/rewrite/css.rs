// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::sync::Arc;

use super::uri::RewriteContext;
use super::visitor::{DomVisitor, VisitStatus};
use crate::markup::{Document, NodeId};

lazy_static! {
    static ref CSS_URL: Regex =
        Regex::new(r#"url\(\s*(['"]?)([^'")]+)(['"]?)\s*\)"#).expect("css url pattern");
    static ref CSS_IMPORT: Regex =
        Regex::new(r#"@import\s+(['"])([^'"]+)(['"])"#).expect("css import pattern");
}

/// Rewrites `url(...)` and `@import "..."` references in stylesheet text
/// so they go through the proxy. Returns `None` when nothing changed.
pub fn rewrite_css(css: &str, context: &RewriteContext) -> Option<String> {
    let mut changed = false;
    let mut replace = |caps: &Captures, open: &str, close: &str| -> String {
        match context.rewritable(&caps[2]) {
            Some(url) => {
                changed = true;
                format!("{open}{}{close}", context.proxy_url(&url))
            }
            None => caps[0].to_string(),
        }
    };

    let urls_done = CSS_URL
        .replace_all(css, |caps: &Captures| replace(caps, "url(\"", "\")"))
        .into_owned();
    let imports_done = CSS_IMPORT
        .replace_all(&urls_done, |caps: &Captures| {
            let quote = caps[1].to_string();
            replace(caps, &format!("@import {quote}"), &quote)
        })
        .into_owned();

    changed.then_some(imports_done)
}

/// Applies [`rewrite_css`] to `<style>` bodies and inline `style`
/// attributes.
pub struct CssVisitor {
    context: Arc<RewriteContext>,
}

impl CssVisitor {
    pub fn new(context: Arc<RewriteContext>) -> Self {
        Self { context }
    }
}

impl DomVisitor for CssVisitor {
    fn name(&self) -> &'static str {
        "css"
    }

    fn visit(&mut self, doc: &mut Document, node: NodeId) -> VisitStatus {
        let Some(tag) = doc.name(node) else {
            return VisitStatus::Bypass;
        };
        let mut modified = false;

        if tag == "style" && self.context.feature().should_rewrite_tag("style") {
            let text = doc.text_content(node);
            if let Some(rewritten) = rewrite_css(&text, &self.context) {
                for child in doc.children(node).to_vec() {
                    doc.detach(child);
                }
                let body = doc.create_text(&rewritten);
                doc.append_child(node, body);
                modified = true;
            }
        }

        if let Some(rewritten) = doc.attr(node, "style").and_then(|style| rewrite_css(style, &self.context)) {
            doc.set_attr(node, "style", &rewritten);
            modified = true;
        }

        if modified {
            VisitStatus::Modify
        } else {
            VisitStatus::Bypass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;
    use crate::markup::{parse, ParseMode};
    use crate::rewrite::feature::ContentRewriterFeature;
    use crate::rewrite::visitor::visit_document;
    use std::collections::BTreeSet;
    use url::Url;

    fn context() -> Arc<RewriteContext> {
        let tags: BTreeSet<String> = ["style".to_string()].into_iter().collect();
        let feature = ContentRewriterFeature::new(".*", "", tags, None).unwrap();
        Arc::new(RewriteContext::new(
            feature,
            Url::parse("http://example.org/css/g.xml").unwrap(),
            &RewriteConfig::default(),
            false,
        ))
    }

    #[test]
    fn rewrites_urls_and_imports() {
        let ctx = context();
        let css = r#"@import "base.css"; div { background: url( 'bg.png' ) } p { background: url(data:x) }"#;
        let out = rewrite_css(css, &ctx).unwrap();
        assert!(out.contains(r#"@import "/gadgets/proxy?url=http%3A%2F%2Fexample.org%2Fcss%2Fbase.css"#));
        assert!(out.contains(r#"url("/gadgets/proxy?url=http%3A%2F%2Fexample.org%2Fcss%2Fbg.png"#));
        assert!(out.contains("url(data:x)"));
    }

    #[test]
    fn untouched_css_reports_no_change() {
        assert!(rewrite_css("p { color: red }", &context()).is_none());
    }

    #[tokio::test]
    async fn visits_style_elements_and_attributes() {
        let mut doc = parse(
            r#"<style>b { background: url(b.png) }</style><div style="background:url(d.png)">x</div>"#,
            ParseMode::Html,
        )
        .unwrap();
        let mut visitors: Vec<Box<dyn DomVisitor>> = vec![Box::new(CssVisitor::new(context()))];
        assert!(visit_document(&mut doc, &mut visitors).await.unwrap());
        let html = doc.serialize();
        assert!(html.contains("url(\"/gadgets/proxy?url=http%3A%2F%2Fexample.org%2Fcss%2Fb.png"));
        assert!(html.contains("url(&quot;/gadgets/proxy?url=http%3A%2F%2Fexample.org%2Fcss%2Fd.png"));
    }
}
