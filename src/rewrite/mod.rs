// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Rewriting of resource references in rendered gadget content.
//!
//! Content is parsed into a [`Document`](crate::markup::Document) and walked
//! by a series of two-phase [`DomVisitor`]s that proxy, concatenate and size
//! the scripts, stylesheets and images it references.

mod concat;
mod content;
mod css;
mod feature;
mod image;
mod pipeline;
mod proxy;
mod uri;
mod visitor;

pub use concat::ConcatVisitor;
pub use content::MutableContent;
pub use css::{rewrite_css, CssVisitor};
pub use feature::{ContentRewriterFeature, CONTENT_REWRITE_FEATURE};
pub use image::{image_size, ImageAttributeVisitor, ImageResizeVisitor, ImageSize};
pub use pipeline::{ContentRewriter, ContentRewriterPipeline, DomRewriter};
pub use proxy::ProxyingVisitor;
pub use uri::RewriteContext;
pub use visitor::{visit_document, DomVisitor, VisitStatus};
