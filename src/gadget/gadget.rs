// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::GadgetContext;
use super::substitutions::Substitutions;
use crate::features::JsLibrary;
use crate::spec::{GadgetSpec, MessageBundle};

/// Per-request state for one gadget render: the shared immutable spec plus
/// everything features accumulate while processing it.
#[derive(Debug, Clone)]
pub struct Gadget {
    spec: Arc<GadgetSpec>,
    context: GadgetContext,
    substitutions: Substitutions,
    js_libraries: Vec<JsLibrary>,
    message_bundle: MessageBundle,
    direction: String,
    features: Vec<String>,
    preloads: BTreeMap<String, String>,
}

impl Gadget {
    pub fn new(spec: Arc<GadgetSpec>, context: GadgetContext) -> Self {
        Self {
            spec,
            context,
            substitutions: Substitutions::new(),
            js_libraries: Vec::new(),
            message_bundle: MessageBundle::default(),
            direction: "ltr".to_string(),
            features: Vec::new(),
            preloads: BTreeMap::new(),
        }
    }

    pub fn spec(&self) -> &GadgetSpec {
        &self.spec
    }

    pub fn shared_spec(&self) -> Arc<GadgetSpec> {
        Arc::clone(&self.spec)
    }

    pub fn context(&self) -> &GadgetContext {
        &self.context
    }

    pub fn substitutions(&self) -> &Substitutions {
        &self.substitutions
    }

    pub fn substitutions_mut(&mut self) -> &mut Substitutions {
        &mut self.substitutions
    }

    /// The spec with every accumulated substitution applied.
    pub fn substituted_spec(&self) -> GadgetSpec {
        self.spec.substitute(&self.substitutions)
    }

    pub fn js_libraries(&self) -> &[JsLibrary] {
        &self.js_libraries
    }

    pub fn add_js_library(&mut self, library: JsLibrary) {
        self.js_libraries.push(library);
    }

    pub fn message_bundle(&self) -> &MessageBundle {
        &self.message_bundle
    }

    pub fn set_message_bundle(&mut self, bundle: MessageBundle) {
        self.message_bundle = bundle;
    }

    pub fn direction(&self) -> &str {
        &self.direction
    }

    pub fn set_direction(&mut self, direction: &str) {
        self.direction = direction.to_string();
    }

    /// Features included for this request, dependencies first.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn set_features(&mut self, features: Vec<String>) {
        self.features = features;
    }

    /// Bodies of the spec's `<Preload>` resources that were fetched, keyed
    /// by URL.
    pub fn preloads(&self) -> &BTreeMap<String, String> {
        &self.preloads
    }

    pub fn add_preload(&mut self, url: &str, body: String) {
        self.preloads.insert(url.to_string(), body);
    }
}
