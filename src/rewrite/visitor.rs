// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Two-phase tree walking.
//!
//! In the first phase every node is offered to [`DomVisitor::visit`], which
//! may edit it on the spot or reserve it. Reserved nodes are handed over
//! together to [`DomVisitor::revisit`] once the walk is over, for edits that
//! need to see several nodes at once (batching siblings, fetching in
//! parallel).

use async_trait::async_trait;

use crate::errors::GadgetError;
use crate::markup::{Document, NodeId};
use crate::observability::messages::rewrite::VisitorPass;
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// Not interested.
    Bypass,
    /// Edited in place during the visit.
    Modify,
    /// Hand to `revisit`; keep walking into children.
    ReserveNode,
    /// Hand to `revisit`; skip the node's children.
    ReserveTree,
}

#[async_trait]
pub trait DomVisitor: Send {
    fn name(&self) -> &'static str;

    fn visit(&mut self, doc: &mut Document, node: NodeId) -> VisitStatus;

    /// Processes reserved nodes, in document order. Returns whether the
    /// document changed.
    async fn revisit(&mut self, _doc: &mut Document, _nodes: Vec<NodeId>) -> Result<bool, GadgetError> {
        Ok(false)
    }
}

/// Runs each visitor over the whole document in turn, one full walk and
/// revisit per visitor. Returns whether anything changed.
pub async fn visit_document(doc: &mut Document, visitors: &mut [Box<dyn DomVisitor>]) -> Result<bool, GadgetError> {
    let root = doc.root();
    let mut modified = false;
    for visitor in visitors.iter_mut() {
        let mut reserved = Vec::new();
        let mut changed = walk(doc, root, visitor.as_mut(), &mut reserved);
        let reserved_count = reserved.len();
        if !reserved.is_empty() {
            changed |= visitor.revisit(doc, reserved).await?;
        }
        VisitorPass {
            visitor: visitor.name(),
            reserved: reserved_count,
            modified: changed,
        }
        .log();
        modified |= changed;
    }
    Ok(modified)
}

fn walk(doc: &mut Document, node: NodeId, visitor: &mut dyn DomVisitor, reserved: &mut Vec<NodeId>) -> bool {
    let mut modified = false;
    let descend = match visitor.visit(doc, node) {
        VisitStatus::Bypass => true,
        VisitStatus::Modify => {
            modified = true;
            true
        }
        VisitStatus::ReserveNode => {
            reserved.push(node);
            true
        }
        VisitStatus::ReserveTree => {
            reserved.push(node);
            false
        }
    };
    if descend && (node == doc.root() || doc.parent(node).is_some()) {
        for child in doc.children(node).to_vec() {
            if doc.parent(child) == Some(node) {
                modified |= walk(doc, child, visitor, reserved);
            }
        }
    }
    modified
}
