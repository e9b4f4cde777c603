// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Strict-mode parse failures. Lenient HTML parsing never produces these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarkupError {
    #[error("document is empty")]
    Empty,
    #[error("no root element")]
    NoRootElement,
    #[error("unexpected end of input at byte {offset}: {context}")]
    UnexpectedEof { offset: usize, context: String },
    #[error("mismatched end tag </{found}> at byte {offset}, expected </{expected}>")]
    MismatchedEndTag {
        offset: usize,
        expected: String,
        found: String,
    },
    #[error("malformed tag at byte {offset}")]
    MalformedTag { offset: usize },
    #[error("content after root element at byte {offset}")]
    TrailingContent { offset: usize },
}
