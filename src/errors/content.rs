// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContentError {
    /// Raw content was replaced while parse-tree edits were still unserialized.
    #[error("content set while {pending} document edit(s) were pending serialization")]
    ConflictingEdit { pending: u64 },
}
