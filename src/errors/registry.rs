// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised while building the feature registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("feature '{feature}' is already registered")]
    DuplicateFeature { feature: String },
    #[error("feature '{feature}' depends on '{missing_dependency}' which is not registered")]
    UnresolvedDependency {
        feature: String,
        missing_dependency: String,
    },
    #[error("cyclic feature dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
    #[error("failed to load feature descriptor {source_name}: {reason}")]
    InvalidDescriptor { source_name: String, reason: String },
}
