// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Log text lives in message structs under [`messages`], grouped by
//! subsystem, so call sites never carry format strings of their own:
//!
//! * `messages::workflow` - per-request job scheduling
//! * `messages::features` - feature registration and resolution
//! * `messages::fetch` - outbound fetches, cache fallbacks
//! * `messages::rewrite` - content rewriting passes
//!
//! # Usage
//!
//! ```rust
//! use gadget_server::observability::messages::StructuredLog;
//! use gadget_server::observability::messages::fetch::StaleFallback;
//!
//! StaleFallback { url: "http://example.com/spec.xml", reason: "timeout" }.log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber, honouring `RUST_LOG` and falling back to
/// `default_filter`. Calling it more than once is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
