// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use super::uri::RewriteContext;
use super::visitor::{DomVisitor, VisitStatus};
use crate::config::consts::CONCAT_LENGTH_BUDGET;
use crate::errors::GadgetError;
use crate::markup::{Document, NodeId, NodeKind};

/// Merges runs of adjacent external scripts, or adjacent stylesheet links,
/// into a single request to the concat endpoint.
///
/// A run ends at any other element or non-blank text. Links only share a
/// run when their `media` and `title` agree. Runs are further split so no
/// concat URL grows past [`CONCAT_LENGTH_BUDGET`] characters beyond its
/// base; a reference too long to fit even alone is left as it is.
pub struct ConcatVisitor {
    context: Arc<RewriteContext>,
}

impl ConcatVisitor {
    pub fn new(context: Arc<RewriteContext>) -> Self {
        Self { context }
    }

    /// The attribute holding the resource URL, when `node` is concatenable.
    fn resource_attribute(&self, doc: &Document, node: NodeId) -> Option<&'static str> {
        let tag = doc.name(node)?;
        let feature = self.context.feature();
        match tag {
            "script" if feature.should_rewrite_tag("script") => {
                let is_js = doc
                    .attr(node, "type")
                    .map_or(true, |t| t.trim().is_empty() || t.to_ascii_lowercase().contains("javascript"));
                is_js.then_some("src")
            }
            "link" if feature.should_rewrite_tag("link") => {
                let stylesheet = doc
                    .attr(node, "rel")
                    .is_some_and(|rel| rel.to_ascii_lowercase().split_whitespace().any(|r| r == "stylesheet"));
                stylesheet.then_some("href")
            }
            _ => None,
        }
    }

    fn resource(&self, doc: &Document, node: NodeId) -> Option<Url> {
        let attribute = self.resource_attribute(doc, node)?;
        self.context.rewritable(doc.attr(node, attribute)?)
    }

    fn joins_run(&self, doc: &Document, previous: NodeId, node: NodeId) -> bool {
        if doc.name(previous) != doc.name(node) {
            return false;
        }
        if doc.name(node) == Some("link")
            && (doc.attr(previous, "media") != doc.attr(node, "media")
                || doc.attr(previous, "title") != doc.attr(node, "title"))
        {
            return false;
        }
        next_element_sibling(doc, previous) == Some(node)
    }

    fn concat_length(&self, urls: &[Url]) -> usize {
        self.context.concat_url(urls).len() - self.context.concat_base().len()
    }

    /// Points the first node of a batch at the concat URL and drops the rest.
    fn apply(&self, doc: &mut Document, batch: &[(NodeId, Url)]) -> bool {
        let Some((first, _)) = batch.first() else {
            return false;
        };
        let Some(attribute) = self.resource_attribute(doc, *first) else {
            return false;
        };
        let urls: Vec<Url> = batch.iter().map(|(_, url)| url.clone()).collect();
        doc.set_attr(*first, attribute, &self.context.concat_url(&urls));
        for (node, _) in &batch[1..] {
            doc.detach(*node);
        }
        true
    }

    fn split_run(&self, run: Vec<(NodeId, Url)>) -> Vec<Vec<(NodeId, Url)>> {
        let mut batches = Vec::new();
        let mut batch: Vec<(NodeId, Url)> = Vec::new();
        for (node, url) in run {
            if self.concat_length(std::slice::from_ref(&url)) > CONCAT_LENGTH_BUDGET {
                if !batch.is_empty() {
                    batches.push(std::mem::take(&mut batch));
                }
                continue;
            }
            let mut urls: Vec<Url> = batch.iter().map(|(_, u)| u.clone()).collect();
            urls.push(url.clone());
            if self.concat_length(&urls) > CONCAT_LENGTH_BUDGET {
                batches.push(std::mem::take(&mut batch));
            }
            batch.push((node, url));
        }
        if !batch.is_empty() {
            batches.push(batch);
        }
        batches
    }
}

/// The next element after `node`, skipping blank text and comments. Any
/// other node in between breaks adjacency.
fn next_element_sibling(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = doc.next_sibling(node)?;
    loop {
        match doc.kind(current) {
            NodeKind::Element { .. } => return Some(current),
            NodeKind::Text(text) if text.trim().is_empty() => {}
            NodeKind::Comment(_) => {}
            _ => return None,
        }
        current = doc.next_sibling(current)?;
    }
}

#[async_trait]
impl DomVisitor for ConcatVisitor {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn visit(&mut self, doc: &mut Document, node: NodeId) -> VisitStatus {
        if self.resource(doc, node).is_some() {
            VisitStatus::ReserveNode
        } else {
            VisitStatus::Bypass
        }
    }

    async fn revisit(&mut self, doc: &mut Document, nodes: Vec<NodeId>) -> Result<bool, GadgetError> {
        let mut runs: Vec<Vec<(NodeId, Url)>> = Vec::new();
        for node in nodes {
            let Some(url) = self.resource(doc, node) else {
                continue;
            };
            match runs.last_mut() {
                Some(run) if run.last().is_some_and(|(previous, _)| self.joins_run(doc, *previous, node)) => {
                    run.push((node, url));
                }
                _ => runs.push(vec![(node, url)]),
            }
        }

        let mut modified = false;
        for run in runs {
            for batch in self.split_run(run) {
                modified |= self.apply(doc, &batch);
            }
        }
        Ok(modified)
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

    fn context() -> Arc<RewriteContext> {
        let tags: BTreeSet<String> = ["script", "link"].iter().map(|t| t.to_string()).collect();
        let feature = ContentRewriterFeature::new(".*", "nocat", tags, None).unwrap();
        Arc::new(RewriteContext::new(
            feature,
            Url::parse("http://example.org/g.xml").unwrap(),
            &RewriteConfig::default(),
            false,
        ))
    }

    async fn rewrite(html: &str) -> (Document, bool) {
        let mut doc = parse(html, ParseMode::Html).unwrap();
        let mut visitors: Vec<Box<dyn DomVisitor>> = vec![Box::new(ConcatVisitor::new(context()))];
        let modified = visit_document(&mut doc, &mut visitors).await.unwrap();
        (doc, modified)
    }

    fn srcs(doc: &Document, tag: &str, attribute: &str) -> Vec<String> {
        doc.elements_by_name(tag)
            .into_iter()
            .filter(|n| doc.is_attached(*n))
            .filter_map(|n| doc.attr(n, attribute).map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn adjacent_scripts_are_merged() {
        let (doc, modified) = rewrite(
            r#"<script src="a.js"></script>
               <!-- lib -->
               <script src="http://cdn.example.org/b.js"></script>"#,
        )
        .await;
        assert!(modified);
        let srcs = srcs(&doc, "script", "src");
        assert_eq!(srcs.len(), 1);
        assert!(srcs[0].starts_with("/gadgets/concat?"));
        assert!(srcs[0].contains("&1=http%3A%2F%2Fexample.org%2Fa.js&2=http%3A%2F%2Fcdn.example.org%2Fb.js"));
    }

    #[tokio::test]
    async fn intervening_content_splits_batches() {
        let (doc, _) = rewrite(r#"<script src="a.js"></script><p>x</p><script src="b.js"></script>"#).await;
        let srcs = srcs(&doc, "script", "src");
        assert_eq!(srcs.len(), 2);
        assert!(srcs.iter().all(|s| s.starts_with("/gadgets/concat?") && s.contains("&1=")));
        assert!(srcs.iter().all(|s| !s.contains("&2=")));
    }

    #[tokio::test]
    async fn links_split_on_media() {
        let (doc, _) = rewrite(
            r#"<link rel="stylesheet" href="a.css"><link rel="stylesheet" href="b.css">
               <link rel="stylesheet" media="print" href="c.css">"#,
        )
        .await;
        let hrefs = srcs(&doc, "link", "href");
        assert_eq!(hrefs.len(), 2);
        assert!(hrefs[0].contains("&2="));
        assert!(!hrefs[1].contains("&2="));
    }

    #[tokio::test]
    async fn excluded_and_inline_scripts_are_untouched() {
        let (doc, modified) = rewrite(r#"<script src="nocat.js"></script><script>inline()</script>"#).await;
        assert!(!modified);
        assert_eq!(srcs(&doc, "script", "src"), vec!["nocat.js"]);
    }

    #[tokio::test]
    async fn batches_respect_length_budget() {
        let long = "x".repeat(400);
        let html: String = (0..6)
            .map(|i| format!(r#"<script src="http://cdn.example.org/{long}{i}.js"></script>"#))
            .collect();
        let (doc, _) = rewrite(&html).await;
        let srcs = srcs(&doc, "script", "src");
        assert!(srcs.len() > 1);
        let base = "/gadgets/concat".len();
        assert!(srcs.iter().all(|s| s.len() - base <= CONCAT_LENGTH_BUDGET));
        let total: usize = srcs.iter().map(|s| s.matches("cdn.example.org").count()).sum();
        assert_eq!(total, 6);
    }

    #[tokio::test]
    async fn oversized_reference_is_left_alone() {
        let huge = format!("http://cdn.example.org/{}.js", "y".repeat(CONCAT_LENGTH_BUDGET));
        let html = format!(r#"<script src="a.js"></script><script src="{huge}"></script><script src="b.js"></script>"#);
        let (doc, _) = rewrite(&html).await;
        let srcs = srcs(&doc, "script", "src");
        assert_eq!(srcs.len(), 3);
        assert_eq!(srcs[1], huge);
        assert!(srcs[0].starts_with("/gadgets/concat?"));
        assert!(srcs[2].starts_with("/gadgets/concat?"));
    }
}
