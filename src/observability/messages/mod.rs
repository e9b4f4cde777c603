// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it at its level with structured fields.

pub mod features;
pub mod fetch;
pub mod rewrite;
pub mod workflow;

use tracing::Span;

pub trait StructuredLog {
    /// Emit the message at its fixed level.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
