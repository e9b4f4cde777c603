// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::uri::RewriteContext;
use super::visitor::{DomVisitor, VisitStatus};
use crate::markup::{Document, NodeId};

/// Tag and attribute pairs that reference a fetchable resource.
const RESOURCE_ATTRIBUTES: &[(&str, &str)] = &[
    ("body", "background"),
    ("embed", "src"),
    ("img", "src"),
    ("input", "src"),
    ("link", "href"),
    ("script", "src"),
];

/// Points resource references at the proxy endpoint.
pub struct ProxyingVisitor {
    context: Arc<RewriteContext>,
}

impl ProxyingVisitor {
    pub fn new(context: Arc<RewriteContext>) -> Self {
        Self { context }
    }
}

impl DomVisitor for ProxyingVisitor {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn visit(&mut self, doc: &mut Document, node: NodeId) -> VisitStatus {
        let Some(tag) = doc.name(node).map(str::to_string) else {
            return VisitStatus::Bypass;
        };
        if !self.context.feature().should_rewrite_tag(&tag) {
            return VisitStatus::Bypass;
        }

        let mut modified = false;
        for (_, attribute) in RESOURCE_ATTRIBUTES.iter().filter(|(t, _)| *t == tag) {
            let Some(url) = doc.attr(node, attribute).and_then(|raw| self.context.rewritable(raw)) else {
                continue;
            };
            doc.set_attr(node, attribute, &self.context.proxy_url(&url));
            modified = true;
        }

        if modified {
            VisitStatus::Modify
        } else {
            VisitStatus::Bypass
        }
    }
}
