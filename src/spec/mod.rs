// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Immutable models of gadget XML definitions and message bundles.

mod gadget_spec;
mod message_bundle;

pub use gadget_spec::{
    ContentType, EnumValue, FeatureRequest, GadgetSpec, LocaleSpec, ModulePrefs, UserPref,
    UserPrefDataType, View,
};
pub use message_bundle::MessageBundle;
