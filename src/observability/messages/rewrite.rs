// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for content rewriting.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A rewriter failed; content is left as it was before that rewriter.
///
/// # Log Level
/// `warn!`
pub struct RewriteSkipped<'a> {
    pub rewriter: &'a str,
    pub gadget: &'a str,
    pub reason: &'a str,
}

impl Display for RewriteSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rewriter {} skipped for {}: {}",
            self.rewriter, self.gadget, self.reason
        )
    }
}

impl StructuredLog for RewriteSkipped<'_> {
    fn log(&self) {
        tracing::warn!(
            rewriter = self.rewriter,
            gadget = self.gadget,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("rewrite_skipped", span_name = name, rewriter = self.rewriter)
    }
}

/// # Log Level
/// `debug!`
pub struct VisitorPass<'a> {
    pub visitor: &'a str,
    pub reserved: usize,
    pub modified: bool,
}

impl Display for VisitorPass<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Visitor {} reserved {} node(s), modified={}",
            self.visitor, self.reserved, self.modified
        )
    }
}

impl StructuredLog for VisitorPass<'_> {
    fn log(&self) {
        tracing::debug!(
            visitor = self.visitor,
            reserved = self.reserved,
            modified = self.modified,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("visitor_pass", span_name = name, visitor = self.visitor)
    }
}
