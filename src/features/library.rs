// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::gadget::RenderingContext;
use crate::markup::escape_attribute;

/// Where a library's code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsLibraryKind {
    /// Script body written directly in the descriptor.
    Inline,
    /// A file next to the descriptor, read at load time.
    File,
    /// A remote script referenced by URL and never inlined.
    Url,
}

/// One `<script>` contributed by a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct JsLibrary {
    pub feature: String,
    pub kind: JsLibraryKind,
    pub context: RenderingContext,
    /// Script source, or the URL for [`JsLibraryKind::Url`].
    pub content: String,
}

impl JsLibrary {
    pub fn inline(feature: &str, context: RenderingContext, content: &str) -> Self {
        Self {
            feature: feature.to_string(),
            kind: JsLibraryKind::Inline,
            context,
            content: content.to_string(),
        }
    }

    pub fn url(feature: &str, context: RenderingContext, url: &str) -> Self {
        Self {
            feature: feature.to_string(),
            kind: JsLibraryKind::Url,
            context,
            content: url.to_string(),
        }
    }

    pub fn is_url(&self) -> bool {
        self.kind == JsLibraryKind::Url
    }

    /// Markup for embedding in an HTML page.
    pub fn to_script_tag(&self) -> String {
        if self.is_url() {
            format!(
                "<script src=\"{}\"></script>",
                escape_attribute(&self.content)
            )
        } else {
            format!("<script>{}</script>", self.content.replace("</script", "<\\/script"))
        }
    }

    /// Code for a standalone JS bundle. URL libraries are loaded through
    /// `document.write` so they keep their position in the sequence.
    pub fn to_bundle_code(&self) -> String {
        if self.is_url() {
            format!(
                "document.write('<script src=\"{}\"></script>');",
                self.content.replace('\\', "\\\\").replace('\'', "\\'")
            )
        } else {
            self.content.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_libraries_render_as_src_tags() {
        let lib = JsLibrary::url("analytics", RenderingContext::Gadget, "http://cdn.example.org/a.js?x=1&y=2");
        assert_eq!(
            lib.to_script_tag(),
            r#"<script src="http://cdn.example.org/a.js?x=1&amp;y=2"></script>"#
        );
        assert!(lib.to_bundle_code().starts_with("document.write('<script src=\"http://cdn"));
    }

    #[test]
    fn inline_libraries_cannot_close_their_tag() {
        let lib = JsLibrary::inline("core", RenderingContext::Gadget, "var s = '</script>';");
        assert_eq!(lib.to_script_tag(), "<script>var s = '<\\/script>';</script>");
        assert_eq!(lib.to_bundle_code(), "var s = '</script>';");
    }
}
