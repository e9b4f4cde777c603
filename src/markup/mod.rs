// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A small arena-backed tree-of-nodes used for gadget XML and HTML content.
//!
//! Nodes live in a `Vec` owned by the [`Document`] and are addressed by
//! [`NodeId`]. Detaching a node never invalidates other ids, so visitors can
//! collect ids in one pass and mutate the tree in a later one.

mod document;
mod parser;
mod serialize;

pub use document::{Attribute, Document, NodeId, NodeKind};
pub use parser::{parse, ParseMode};
pub use serialize::{escape_attribute, escape_html, escape_text};
