// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::document::{Document, NodeId};
use crate::errors::MarkupError;

/// How strictly the input is treated.
///
/// `Xml` fails on malformed markup and decodes entities in text. `Html`
/// never fails: it lowercases names, knows void and raw-text elements, closes
/// unbalanced tags at end of input and keeps text bytes as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Xml,
    Html,
}

pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn parse(input: &str, mode: ParseMode) -> Result<Document, MarkupError> {
    let mut parser = Parser {
        input,
        pos: 0,
        mode,
        doc: Document::new(mode),
        stack: Vec::new(),
    };
    parser.stack.push(parser.doc.root());
    parser.run()?;
    Ok(parser.doc)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    mode: ParseMode,
    doc: Document,
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn strict(&self) -> bool {
        self.mode == ParseMode::Xml
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self, context: &str) -> MarkupError {
        MarkupError::UnexpectedEof {
            offset: self.pos,
            context: context.to_string(),
        }
    }

    fn run(&mut self) -> Result<(), MarkupError> {
        if self.strict() && self.input.trim().is_empty() {
            return Err(MarkupError::Empty);
        }

        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("<![CDATA[") {
                self.cdata()?;
            } else if rest.starts_with("<!") {
                self.doctype()?;
            } else if rest.starts_with("<?") {
                self.processing_instruction()?;
            } else if rest.starts_with("</") {
                self.end_tag()?;
            } else if rest.starts_with('<')
                && rest[1..].chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            {
                self.start_tag()?;
            } else {
                self.text()?;
            }
        }

        if self.strict() {
            if self.stack.len() > 1 {
                let open = self.doc.name(self.current()).unwrap_or_default().to_string();
                return Err(self.eof(&format!("unclosed <{}>", open)));
            }
            if self.doc.document_element().is_none() {
                return Err(MarkupError::NoRootElement);
            }
        }
        Ok(())
    }

    fn at_top_level(&self) -> bool {
        self.stack.len() == 1
    }

    fn append(&mut self, node: NodeId) {
        let parent = self.current();
        self.doc.append_child(parent, node);
    }

    fn comment(&mut self) -> Result<(), MarkupError> {
        let start = self.pos + 4;
        match self.input[start..].find("-->") {
            Some(len) => {
                let node = self.doc.create_comment(&self.input[start..start + len]);
                self.append(node);
                self.pos = start + len + 3;
            }
            None if self.strict() => return Err(self.eof("unterminated comment")),
            None => {
                let node = self.doc.create_comment(&self.input[start..]);
                self.append(node);
                self.pos = self.input.len();
            }
        }
        Ok(())
    }

    fn cdata(&mut self) -> Result<(), MarkupError> {
        let start = self.pos + 9;
        let Some(len) = self.input[start..].find("]]>") else {
            return Err(self.eof("unterminated CDATA section"));
        };
        if self.strict() && self.at_top_level() {
            return Err(MarkupError::TrailingContent { offset: self.pos });
        }
        let node = self.doc.create_text(&self.input[start..start + len]);
        self.append(node);
        self.pos = start + len + 3;
        Ok(())
    }

    fn doctype(&mut self) -> Result<(), MarkupError> {
        let start = self.pos + 2;
        let Some(len) = self.input[start..].find('>') else {
            return Err(self.eof("unterminated declaration"));
        };
        let node = self.doc.create_doctype(&self.input[start..start + len]);
        self.append(node);
        self.pos = start + len + 1;
        Ok(())
    }

    fn processing_instruction(&mut self) -> Result<(), MarkupError> {
        let start = self.pos + 2;
        match self.input[start..].find("?>") {
            Some(len) => self.pos = start + len + 2,
            None if self.strict() => return Err(self.eof("unterminated processing instruction")),
            None => self.pos = self.input.len(),
        }
        Ok(())
    }

    fn text(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        let skip = usize::from(self.input[start..].starts_with('<'));
        let end = self.input[start + skip..]
            .find('<')
            .map(|i| start + skip + i)
            .unwrap_or(self.input.len());
        let raw = &self.input[start..end];
        self.pos = end;

        if self.strict() {
            if self.at_top_level() {
                if raw.trim().is_empty() {
                    return Ok(());
                }
                return Err(MarkupError::TrailingContent { offset: start });
            }
            let node = self.doc.create_text(&decode_entities(raw));
            self.append(node);
        } else {
            let node = self.doc.create_text(raw);
            self.append(node);
        }
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), MarkupError> {
        let start = self.pos + 2;
        let Some(len) = self.input[start..].find('>') else {
            if self.strict() {
                return Err(self.eof("unterminated end tag"));
            }
            self.pos = self.input.len();
            return Ok(());
        };
        let name = self.input[start..start + len].trim();
        let offset = self.pos;
        self.pos = start + len + 1;

        if self.strict() {
            let expected = self.doc.name(self.current()).unwrap_or_default().to_string();
            if self.at_top_level() || expected != name {
                return Err(MarkupError::MismatchedEndTag {
                    offset,
                    expected,
                    found: name.to_string(),
                });
            }
            self.stack.pop();
            return Ok(());
        }

        let found = self
            .stack
            .iter()
            .rposition(|id| self.doc.name(*id).is_some_and(|n| n.eq_ignore_ascii_case(name)));
        if let Some(index) = found {
            self.stack.truncate(index);
        }
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), MarkupError> {
        let offset = self.pos;
        let bytes = self.input.as_bytes();
        let mut i = self.pos + 1;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
            i += 1;
        }
        let name = &self.input[self.pos + 1..i];
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                if self.strict() {
                    self.pos = i;
                    return Err(self.eof(&format!("unterminated <{}>", name)));
                }
                self.pos = bytes.len();
                return Ok(());
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' if bytes.get(i + 1) == Some(&b'>') => {
                    self_closing = true;
                    i += 2;
                    break;
                }
                b'/' => {
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let name_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            let attr_name = &self.input[name_start..i];
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }

            if bytes.get(i) != Some(&b'=') {
                if self.strict() {
                    return Err(MarkupError::MalformedTag { offset });
                }
                attributes.push((attr_name.to_string(), String::new()));
                continue;
            }
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }

            let value = match bytes.get(i) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = i + 1;
                    match self.input[value_start..].find(quote as char) {
                        Some(len) => {
                            i = value_start + len + 1;
                            &self.input[value_start..value_start + len]
                        }
                        None if self.strict() => {
                            self.pos = value_start;
                            return Err(self.eof("unterminated attribute value"));
                        }
                        None => {
                            i = bytes.len();
                            &self.input[value_start..]
                        }
                    }
                }
                _ => {
                    if self.strict() {
                        return Err(MarkupError::MalformedTag { offset });
                    }
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    &self.input[value_start..i]
                }
            };
            attributes.push((attr_name.to_string(), decode_entities(value)));
        }
        self.pos = i;

        if self.strict() && self.at_top_level() && self.doc.document_element().is_some() {
            return Err(MarkupError::TrailingContent { offset });
        }

        let element = self.doc.create_element(name);
        for (attr_name, value) in &attributes {
            self.doc.set_attr(element, attr_name, value);
        }
        self.append(element);

        if self_closing {
            return Ok(());
        }
        if self.strict() {
            self.stack.push(element);
            return Ok(());
        }

        let lower = name.to_ascii_lowercase();
        if VOID_ELEMENTS.contains(&lower.as_str()) {
            return Ok(());
        }
        if RAW_TEXT_ELEMENTS.contains(&lower.as_str()) {
            self.raw_text(element, &lower);
            return Ok(());
        }
        self.stack.push(element);
        Ok(())
    }

    /// Consumes everything up to the matching close tag as a single text node.
    fn raw_text(&mut self, element: NodeId, name: &str) {
        let closing = format!("</{}", name);
        let haystack = self.rest().to_ascii_lowercase();
        let (body_len, after) = match haystack.find(&closing) {
            Some(len) => {
                let close_end = haystack[len..]
                    .find('>')
                    .map(|e| self.pos + len + e + 1)
                    .unwrap_or(self.input.len());
                (len, close_end)
            }
            None => (haystack.len(), self.input.len()),
        };
        if body_len > 0 {
            let text = self.doc.create_text(&self.input[self.pos..self.pos + body_len]);
            self.doc.append_child(element, text);
        }
        self.pos = after;
    }
}

/// Decodes the predefined XML entities, `&nbsp;` and numeric references.
/// Unknown references are kept verbatim.
pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &candidate[1..end];
            let ch = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_xml_with_entities() {
        let doc = parse(
            r#"<?xml version="1.0"?><Module><ModulePrefs title="A &amp; B"/><Content type="html"><![CDATA[<b>hi</b>]]></Content></Module>"#,
            ParseMode::Xml,
        )
        .unwrap();
        let module = doc.document_element().unwrap();
        assert_eq!(doc.name(module), Some("Module"));
        let prefs = doc.first_child_element(module, "ModulePrefs").unwrap();
        assert_eq!(doc.attr(prefs, "title"), Some("A & B"));
        let content = doc.first_child_element(module, "Content").unwrap();
        assert_eq!(doc.text_content(content), "<b>hi</b>");
    }

    #[test]
    fn strict_mode_rejects_mismatched_tags() {
        let err = parse("<a><b></a></b>", ParseMode::Xml).unwrap_err();
        assert!(matches!(err, MarkupError::MismatchedEndTag { .. }));
    }

    #[test]
    fn strict_mode_rejects_empty_and_unclosed_input() {
        assert_eq!(parse("   ", ParseMode::Xml).unwrap_err(), MarkupError::Empty);
        assert!(matches!(
            parse("<a><b>", ParseMode::Xml).unwrap_err(),
            MarkupError::UnexpectedEof { .. }
        ));
        assert!(matches!(
            parse("<a/><b/>", ParseMode::Xml).unwrap_err(),
            MarkupError::TrailingContent { .. }
        ));
    }

    #[test]
    fn html_mode_handles_void_and_raw_text_elements() {
        let doc = parse(
            "<div><img src=a.png><script>if (a < b) { x = '</div>'; }</script><p>x</div>",
            ParseMode::Html,
        )
        .unwrap();
        let div = doc.document_element().unwrap();
        let names: Vec<_> = doc.children(div).iter().filter_map(|c| doc.name(*c)).collect();
        assert_eq!(names, vec!["img", "script", "p"]);
        let script = doc.elements_by_name("script")[0];
        assert_eq!(doc.text_content(script), "if (a < b) { x = '</div>'; }");
    }

    #[test]
    fn html_mode_ignores_stray_end_tags() {
        let doc = parse("<p>one</span>two</p>", ParseMode::Html).unwrap();
        let p = doc.document_element().unwrap();
        assert_eq!(doc.text_content(p), "onetwo");
    }

    #[test]
    fn decodes_numeric_references_and_keeps_unknown_ones() {
        assert_eq!(decode_entities("&#65;&#x42;&bogus;&"), "AB&bogus;&");
    }
}
