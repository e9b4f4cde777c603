// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::errors::GadgetError;
use crate::markup::{self, Document, NodeId, ParseMode};

/// Localised messages from a `<messagebundle>` document or a `<Locale>`'s
/// inline `<msg>` children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBundle {
    messages: BTreeMap<String, String>,
    direction: Option<String>,
}

impl MessageBundle {
    pub fn new(messages: BTreeMap<String, String>) -> Self {
        Self {
            messages,
            direction: None,
        }
    }

    pub fn parse(xml: &str) -> Result<Self, GadgetError> {
        let doc = markup::parse(xml, ParseMode::Xml)?;
        let root = doc
            .document_element()
            .ok_or_else(|| GadgetError::malformed("message bundle has no root element"))?;
        if doc.name(root) != Some("messagebundle") {
            return Err(GadgetError::malformed(format!(
                "expected <messagebundle>, found <{}>",
                doc.name(root).unwrap_or_default()
            )));
        }
        let mut bundle = Self::from_msg_elements(&doc, root)?;
        bundle.direction = doc.attr(root, "language_direction").map(str::to_string);
        Ok(bundle)
    }

    /// Collects `<msg name="...">` children of `parent`.
    pub(crate) fn from_msg_elements(doc: &Document, parent: NodeId) -> Result<Self, GadgetError> {
        let mut messages = BTreeMap::new();
        for msg in doc.child_elements(parent, "msg") {
            let name = doc
                .attr(msg, "name")
                .ok_or_else(|| GadgetError::malformed("<msg> is missing the name attribute"))?;
            messages.insert(name.to_string(), doc.text_content(msg).trim().to_string());
        }
        Ok(Self::new(messages))
    }

    pub fn messages(&self) -> &BTreeMap<String, String> {
        &self.messages
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.messages.get(name).map(String::as_str)
    }

    pub fn direction(&self) -> Option<&str> {
        self.direction.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Overlays `other` onto this bundle; its messages win.
    pub fn merge(&mut self, other: &MessageBundle) {
        for (name, value) in &other.messages {
            self.messages.insert(name.clone(), value.clone());
        }
        if other.direction.is_some() {
            self.direction = other.direction.clone();
        }
    }
}
