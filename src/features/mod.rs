// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Gadget features: named, dependency-ordered units of JS and per-request
//! behaviour that a gadget pulls in with `<Require>`/`<Optional>`.

mod feature;
mod library;
mod loader;
mod registry;
mod substituters;
mod validation;

pub use feature::{FeatureParams, GadgetFeature, GadgetFeatureFactory, JsLibraryFeature, JsLibraryFeatureFactory};
pub use library::{JsLibrary, JsLibraryKind};
pub use loader::{load_feature_directories, load_features, register_descriptors, FeatureDescriptor};
pub use registry::{is_core_feature, FeatureRegistry, IncludedFeatures, RegisteredFeature};
pub use substituters::{
    register_core_features, BIDI_FEATURE, MESSAGE_BUNDLE_FEATURE, MODULE_FEATURE, USER_PREF_FEATURE,
};
