// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // server config + container cascade
pub mod engine;     // workflow, server, renderer
pub mod errors;     // error handling
pub mod features;   // feature registry + JS libraries
pub mod gadget;     // per-request gadget state
pub mod http;       // fetching and caching
pub mod markup;     // XML/HTML tree
pub mod observability;
pub mod rewrite;    // resource URL rewriting
pub mod spec;       // gadget spec model
