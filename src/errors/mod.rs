// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod content;
mod fetch;
mod gadget;
mod markup;
mod registry;
mod workflow;

pub use config::ConfigError;
pub use content::ContentError;
pub use fetch::FetchError;
pub use gadget::{ErrorCode, GadgetError};
pub use markup::MarkupError;
pub use registry::RegistryError;
pub use workflow::WorkflowError;
