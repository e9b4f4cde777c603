// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use super::concat::ConcatVisitor;
use super::content::MutableContent;
use super::css::CssVisitor;
use super::feature::ContentRewriterFeature;
use super::image::{ImageAttributeVisitor, ImageResizeVisitor};
use super::proxy::ProxyingVisitor;
use super::uri::RewriteContext;
use super::visitor::{visit_document, DomVisitor};
use crate::config::RewriteConfig;
use crate::errors::GadgetError;
use crate::gadget::Gadget;
use crate::http::HttpFetcher;
use crate::observability::messages::rewrite::RewriteSkipped;
use crate::observability::messages::StructuredLog;

#[async_trait]
pub trait ContentRewriter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrites `content` in place. Returns whether anything changed.
    async fn rewrite(&self, gadget: &Gadget, content: &mut MutableContent) -> Result<bool, GadgetError>;
}

/// Runs the resource visitors over the content's HTML tree.
///
/// Visitors run in a fixed order: image attributes, image resize, concat,
/// css, proxy. The proxy pass comes last so it skips anything an earlier
/// pass already pointed at the proxy or concat endpoints.
pub struct DomRewriter {
    config: RewriteConfig,
    fetcher: Arc<dyn HttpFetcher>,
}

impl DomRewriter {
    pub fn new(config: RewriteConfig, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { config, fetcher }
    }

    fn visitors(&self, context: Arc<RewriteContext>, ignore_cache: bool) -> Vec<Box<dyn DomVisitor>> {
        let mut visitors: Vec<Box<dyn DomVisitor>> = Vec::new();
        if self.config.image_attributes {
            visitors.push(Box::new(ImageAttributeVisitor::new(
                context.clone(),
                self.fetcher.clone(),
                ignore_cache,
            )));
        }
        if self.config.image_resize {
            visitors.push(Box::new(ImageResizeVisitor::new(
                context.clone(),
                self.fetcher.clone(),
                ignore_cache,
            )));
        }
        if self.config.concat {
            visitors.push(Box::new(ConcatVisitor::new(context.clone())));
        }
        if self.config.css {
            visitors.push(Box::new(CssVisitor::new(context.clone())));
        }
        visitors.push(Box::new(ProxyingVisitor::new(context)));
        visitors
    }
}

#[async_trait]
impl ContentRewriter for DomRewriter {
    fn name(&self) -> &'static str {
        "dom"
    }

    async fn rewrite(&self, gadget: &Gadget, content: &mut MutableContent) -> Result<bool, GadgetError> {
        let feature = ContentRewriterFeature::from_spec(gadget.spec(), &self.config)?;
        let ignore_cache = gadget.context().ignore_cache;
        let context = Arc::new(RewriteContext::new(
            feature,
            gadget.spec().url().clone(),
            &self.config,
            ignore_cache,
        ));

        let mut document = content.document()?.clone();
        let mut visitors = self.visitors(context, ignore_cache);
        let modified = visit_document(&mut document, &mut visitors).await?;
        if modified {
            *content.document_mut()? = document;
        }
        Ok(modified)
    }
}

/// Ordered chain of content rewriters.
///
/// A failing rewriter is logged and its partial edits discarded; the chain
/// carries on from the content as it was before that rewriter ran.
#[derive(Default)]
pub struct ContentRewriterPipeline {
    rewriters: Vec<Box<dyn ContentRewriter>>,
}

impl ContentRewriterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rewriter(mut self, rewriter: Box<dyn ContentRewriter>) -> Self {
        self.rewriters.push(rewriter);
        self
    }

    pub fn len(&self) -> usize {
        self.rewriters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }

    pub async fn rewrite(&self, gadget: &Gadget, content: &str) -> String {
        let mut current = MutableContent::new(content);
        for rewriter in &self.rewriters {
            let snapshot = current.content().to_string();
            if let Err(err) = rewriter.rewrite(gadget, &mut current).await {
                RewriteSkipped {
                    rewriter: rewriter.name(),
                    gadget: gadget.spec().url().as_str(),
                    reason: &err.to_string(),
                }
                .log();
                current = MutableContent::new(&snapshot);
            }
        }
        current.content().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadget::GadgetContext;
    use crate::http::testing::FakeFetcher;
    use crate::spec::GadgetSpec;
    use url::Url;

    const SPEC: &str = r#"<Module>
        <ModulePrefs title="t">
            <Optional feature="content-rewrite">
                <Param name="include-tags">img,script</Param>
            </Optional>
        </ModulePrefs>
        <Content type="html"><![CDATA[<img src="a.png">]]></Content>
    </Module>"#;

    fn gadget() -> Gadget {
        let url = Url::parse("http://example.org/g.xml").unwrap();
        let spec = GadgetSpec::parse(url.clone(), SPEC).unwrap();
        Gadget::new(Arc::new(spec), GadgetContext::new(url))
    }

    struct Failing;

    #[async_trait]
    impl ContentRewriter for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn rewrite(&self, _gadget: &Gadget, content: &mut MutableContent) -> Result<bool, GadgetError> {
            content.set_content("half-done")?;
            Err(GadgetError::internal("boom"))
        }
    }

    struct Appending(&'static str);

    #[async_trait]
    impl ContentRewriter for Appending {
        fn name(&self) -> &'static str {
            "appending"
        }

        async fn rewrite(&self, _gadget: &Gadget, content: &mut MutableContent) -> Result<bool, GadgetError> {
            let next = format!("{}{}", content.content(), self.0);
            content.set_content(&next)?;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn failed_rewriter_leaves_content_unchanged() {
        let pipeline = ContentRewriterPipeline::new()
            .with_rewriter(Box::new(Appending("-a")))
            .with_rewriter(Box::new(Failing))
            .with_rewriter(Box::new(Appending("-b")));
        assert_eq!(pipeline.rewrite(&gadget(), "x").await, "x-a-b");
    }

    #[tokio::test]
    async fn dom_rewriter_honours_gadget_tags() {
        let rewriter = DomRewriter::new(RewriteConfig::default(), Arc::new(FakeFetcher::new()));
        let pipeline = ContentRewriterPipeline::new().with_rewriter(Box::new(rewriter));
        let out = pipeline
            .rewrite(&gadget(), r#"<img src="a.png"><link rel="stylesheet" href="s.css">"#)
            .await;
        assert!(out.starts_with(r#"<img src="/gadgets/proxy?url=http%3A%2F%2Fexample.org%2Fa.png"#));
        assert!(out.ends_with(r#"<link rel="stylesheet" href="s.css">"#));
    }

    #[tokio::test]
    async fn untouched_content_is_returned_verbatim() {
        let rewriter = DomRewriter::new(RewriteConfig::default(), Arc::new(FakeFetcher::new()));
        let pipeline = ContentRewriterPipeline::new().with_rewriter(Box::new(rewriter));
        let html = "<p>plain   <b>text</b></p>";
        assert_eq!(pipeline.rewrite(&gadget(), html).await, html);
    }
}
