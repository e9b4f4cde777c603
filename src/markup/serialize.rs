// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::document::{Document, NodeId, NodeKind};
use super::parser::{ParseMode, VOID_ELEMENTS};

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escapes text for any HTML context: element content and either quote style.
pub fn escape_html(value: &str) -> String {
    escape_text(value).replace('"', "&quot;").replace('\'', "&#39;")
}

pub fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

impl Document {
    /// Serializes the whole document.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root(), &mut out);
        out
    }

    /// Serializes a single node including its own tag.
    pub fn outer_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serializes only the children of a node.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Root => {
                for child in self.children(id) {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Element { name, attributes } => {
                out.push('<');
                out.push_str(name);
                for attribute in attributes {
                    out.push(' ');
                    out.push_str(&attribute.name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(&attribute.value));
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() {
                    match self.mode() {
                        ParseMode::Xml => out.push_str("/>"),
                        ParseMode::Html if VOID_ELEMENTS.contains(&name.as_str()) => out.push('>'),
                        ParseMode::Html => {
                            out.push_str("></");
                            out.push_str(name);
                            out.push('>');
                        }
                    }
                    return;
                }
                out.push('>');
                for child in children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) => match self.mode() {
                ParseMode::Xml => out.push_str(&escape_text(text)),
                ParseMode::Html => out.push_str(text),
            },
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Doctype(text) => {
                out.push_str("<!");
                out.push_str(text);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::markup::{parse, ParseMode};

    #[test]
    fn html_round_trip_preserves_markup() {
        let source = r#"<!DOCTYPE html><html><head><link rel="stylesheet" href="a.css"></head><body><!-- c --><p class="x">a &amp; b</p><script>var a = 1 < 2;</script></body></html>"#;
        let doc = parse(source, ParseMode::Html).unwrap();
        assert_eq!(doc.serialize(), source);
    }

    #[test]
    fn xml_serialization_escapes_text() {
        let doc = parse("<msg name=\"a\">1 &lt; 2</msg>", ParseMode::Xml).unwrap();
        assert_eq!(doc.serialize(), "<msg name=\"a\">1 &lt; 2</msg>");
    }

    #[test]
    fn attributes_are_reescaped() {
        let doc = parse(r#"<a href="/p?a=1&amp;b=2">x</a>"#, ParseMode::Html).unwrap();
        assert_eq!(doc.serialize(), r#"<a href="/p?a=1&amp;b=2">x</a>"#);
    }
}
