// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for feature registration and resolution.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// # Log Level
/// `debug!`
pub struct FeatureRegistered<'a> {
    pub feature: &'a str,
    pub dependencies: &'a [String],
    pub core: bool,
}

impl Display for FeatureRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered feature '{}' (core={}) depending on [{}]",
            self.feature,
            self.core,
            self.dependencies.join(", ")
        )
    }
}

impl StructuredLog for FeatureRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            feature = self.feature,
            core = self.core,
            dependency_count = self.dependencies.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("feature_registered", span_name = name, feature = self.feature)
    }
}

/// Features a gadget asked for that the registry does not know.
///
/// # Log Level
/// `info!` for optional features, the caller decides for required ones.
pub struct FeaturesMissing<'a> {
    pub gadget: &'a str,
    pub missing: &'a [String],
    pub required: bool,
}

impl Display for FeaturesMissing<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let kind = if self.required { "required" } else { "optional" };
        write!(
            f,
            "Gadget {} requests unknown {} feature(s): {}",
            self.gadget,
            kind,
            self.missing.join(", ")
        )
    }
}

impl StructuredLog for FeaturesMissing<'_> {
    fn log(&self) {
        if self.required {
            tracing::warn!(gadget = self.gadget, missing = self.missing.len(), "{}", self);
        } else {
            tracing::info!(gadget = self.gadget, missing = self.missing.len(), "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("features_missing", span_name = name, gadget = self.gadget)
    }
}

/// Feature descriptors that could not be ordered for registration.
///
/// # Log Level
/// `error!`
pub struct DescriptorsUnresolved<'a> {
    pub features: &'a [String],
}

impl Display for DescriptorsUnresolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Feature descriptors with unknown or cyclic dependencies: {}",
            self.features.join(", ")
        )
    }
}

impl StructuredLog for DescriptorsUnresolved<'_> {
    fn log(&self) {
        tracing::error!(count = self.features.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("descriptors_unresolved", span_name = name)
    }
}
