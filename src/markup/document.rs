// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::parser::ParseMode;

/// Index of a node inside its [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    mode: ParseMode,
}

impl Document {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            mode,
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First element child of the root.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        let name = match self.mode {
            ParseMode::Html => name.to_ascii_lowercase(),
            ParseMode::Xml => name.to_string(),
        };
        self.alloc(NodeKind::Element {
            name,
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_string()))
    }

    pub(crate) fn create_doctype(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Doctype(text.to_string()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    /// Element name, `None` for non-element nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        match self.mode {
            ParseMode::Html => a.eq_ignore_ascii_case(b),
            ParseMode::Xml => a == b,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| self.names_match(&a.name, name))
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let html = self.mode == ParseMode::Html;
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            let existing = attributes.iter_mut().find(|a| {
                if html {
                    a.name.eq_ignore_ascii_case(name)
                } else {
                    a.name == name
                }
            });
            match existing {
                Some(attribute) => attribute.value = value.to_string(),
                None => attributes.push(Attribute {
                    name: if html {
                        name.to_ascii_lowercase()
                    } else {
                        name.to_string()
                    },
                    value: value.to_string(),
                }),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        let html = self.mode == ParseMode::Html;
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            attributes.retain(|a| {
                if html {
                    !a.name.eq_ignore_ascii_case(name)
                } else {
                    a.name != name
                }
            });
        }
    }

    /// Text of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let NodeKind::Text(text) | NodeKind::Comment(text) = &mut self.nodes[id.0].kind {
            *text = value.to_string();
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(text) = &self.nodes[node.0].kind {
                out.push_str(text);
            }
        }
        out
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Inserts `child` immediately before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(child);
        let position = self.position_in_parent(reference).unwrap_or(0);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(position, child);
    }

    /// Unlinks a node (and its subtree) from its parent. The id stays valid.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        self.insert_before(old, new);
        self.detach(old);
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position_in_parent(id)?;
        self.children(parent).get(position + 1).copied()
    }

    /// Pre-order traversal of `id` and everything beneath it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Element children of `id` with the given name.
    pub fn child_elements<'a>(&'a self, id: NodeId, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.name(*c).is_some_and(|n| self.names_match(n, name)))
    }

    pub fn first_child_element(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.child_elements(id, name).next()
    }

    /// All elements in the document with the given name, in document order.
    pub fn elements_by_name(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.name(*id).is_some_and(|n| self.names_match(n, name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_ids_stay_valid() {
        let mut doc = Document::new(ParseMode::Html);
        let root = doc.root();
        let a = doc.create_element("script");
        let b = doc.create_element("script");
        doc.append_child(root, a);
        doc.append_child(root, b);

        doc.detach(a);
        assert!(!doc.is_attached(a));
        assert_eq!(doc.name(a), Some("script"));
        assert_eq!(doc.children(root), &[b]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut doc = Document::new(ParseMode::Xml);
        let root = doc.root();
        let first = doc.create_element("a");
        let second = doc.create_element("b");
        let third = doc.create_element("c");
        doc.append_child(root, first);
        doc.append_child(root, second);
        doc.append_child(root, third);

        let replacement = doc.create_element("x");
        doc.replace(second, replacement);
        let names: Vec<_> = doc.children(root).iter().filter_map(|c| doc.name(*c)).collect();
        assert_eq!(names, vec!["a", "x", "c"]);
    }

    #[test]
    fn html_attributes_are_case_insensitive() {
        let mut doc = Document::new(ParseMode::Html);
        let img = doc.create_element("IMG");
        doc.set_attr(img, "SRC", "a.png");
        assert_eq!(doc.name(img), Some("img"));
        assert_eq!(doc.attr(img, "src"), Some("a.png"));
        doc.remove_attr(img, "Src");
        assert!(!doc.has_attr(img, "src"));
    }
}
