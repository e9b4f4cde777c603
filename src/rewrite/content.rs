// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::{ContentError, MarkupError};
use crate::markup::{self, Document, ParseMode};

/// Renderable content held as a string, a parsed tree, or both.
///
/// Each call to [`document_mut`](Self::document_mut) counts as an edit; the
/// string form is regenerated from the tree on the next read. Replacing the
/// string while tree edits are still unserialized is rejected, since one of
/// the two edits would silently be lost.
#[derive(Debug, Clone)]
pub struct MutableContent {
    content: String,
    document: Option<Document>,
    edits: u64,
    serialized_edits: u64,
}

impl MutableContent {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            document: None,
            edits: 0,
            serialized_edits: 0,
        }
    }

    fn pending_edits(&self) -> u64 {
        self.edits - self.serialized_edits
    }

    /// Current content, serializing pending tree edits first.
    pub fn content(&mut self) -> &str {
        if self.pending_edits() > 0 {
            if let Some(document) = &self.document {
                self.content = document.serialize();
            }
            self.serialized_edits = self.edits;
        }
        &self.content
    }

    /// Replaces the content and drops the parsed tree.
    ///
    /// # Errors
    /// [`ContentError::ConflictingEdit`] when tree edits have not been read
    /// back through [`content`](Self::content) yet.
    pub fn set_content(&mut self, content: &str) -> Result<(), ContentError> {
        let pending = self.pending_edits();
        if pending > 0 {
            return Err(ContentError::ConflictingEdit { pending });
        }
        self.content = content.to_string();
        self.document = None;
        Ok(())
    }

    /// The parsed tree (HTML mode), parsing on first use.
    pub fn document(&mut self) -> Result<&Document, MarkupError> {
        self.ensure_parsed()?;
        match &self.document {
            Some(document) => Ok(document),
            None => Err(MarkupError::NoRootElement),
        }
    }

    /// Mutable access to the tree; counts as one edit.
    pub fn document_mut(&mut self) -> Result<&mut Document, MarkupError> {
        self.ensure_parsed()?;
        self.edits += 1;
        match &mut self.document {
            Some(document) => Ok(document),
            None => Err(MarkupError::NoRootElement),
        }
    }

    fn ensure_parsed(&mut self) -> Result<(), MarkupError> {
        if self.document.is_none() {
            self.document = Some(markup::parse(&self.content, ParseMode::Html)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_edits_show_up_in_content() {
        let mut content = MutableContent::new(r#"<img src="a.png">"#);
        let doc = content.document_mut().unwrap();
        let img = doc.elements_by_name("img")[0];
        doc.set_attr(img, "src", "b.png");
        assert_eq!(content.content(), r#"<img src="b.png">"#);
    }

    #[test]
    fn set_content_with_pending_edits_conflicts() {
        let mut content = MutableContent::new("<p>a</p>");
        content.document_mut().unwrap();
        assert_eq!(
            content.set_content("<p>b</p>"),
            Err(ContentError::ConflictingEdit { pending: 1 })
        );

        content.content();
        content.set_content("<p>b</p>").unwrap();
        assert_eq!(content.content(), "<p>b</p>");
        let doc = content.document().unwrap();
        assert_eq!(doc.text_content(doc.root()), "b");
    }

    #[test]
    fn reading_the_tree_is_not_an_edit() {
        let mut content = MutableContent::new("<p>x</p>");
        content.document().unwrap();
        content.set_content("<p>y</p>").unwrap();
        assert_eq!(content.content(), "<p>y</p>");
    }
}
