// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::library::JsLibrary;
use crate::errors::GadgetError;
use crate::gadget::{Gadget, GadgetContext};
use crate::spec::GadgetSpec;

/// `<Param>` values a gadget passed to a feature it requested.
pub type FeatureParams = BTreeMap<String, String>;

/// Per-request behaviour of a feature.
///
/// A fresh instance is created for each request, so state gathered in
/// [`prepare`](GadgetFeature::prepare) is available to
/// [`process`](GadgetFeature::process). `prepare` runs as soon as the spec
/// is known and may run concurrently with other features; `process` runs
/// after `prepare` and after every dependency has been processed.
#[async_trait]
pub trait GadgetFeature: Send {
    async fn prepare(
        &mut self,
        _spec: &GadgetSpec,
        _context: &GadgetContext,
        _params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        Ok(())
    }

    async fn process(
        &mut self,
        gadget: &mut Gadget,
        context: &GadgetContext,
        params: &FeatureParams,
    ) -> Result<(), GadgetError>;
}

/// Creates [`GadgetFeature`] instances; one factory is registered per feature.
pub trait GadgetFeatureFactory: Send + Sync {
    fn create(&self) -> Box<dyn GadgetFeature>;

    /// JS this feature contributes, for bundle serving.
    fn libraries(&self) -> &[JsLibrary] {
        &[]
    }
}

/// A feature whose only job is to add its libraries to the gadget.
pub struct JsLibraryFeature {
    libraries: Vec<JsLibrary>,
}

#[async_trait]
impl GadgetFeature for JsLibraryFeature {
    async fn process(
        &mut self,
        gadget: &mut Gadget,
        context: &GadgetContext,
        _params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        for library in self.libraries.drain(..) {
            if library.context == context.rendering_context {
                gadget.add_js_library(library);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsLibraryFeatureFactory {
    libraries: Vec<JsLibrary>,
}

impl JsLibraryFeatureFactory {
    pub fn new(libraries: Vec<JsLibrary>) -> Self {
        Self { libraries }
    }
}

impl GadgetFeatureFactory for JsLibraryFeatureFactory {
    fn create(&self) -> Box<dyn GadgetFeature> {
        Box::new(JsLibraryFeature {
            libraries: self.libraries.clone(),
        })
    }

    fn libraries(&self) -> &[JsLibrary] {
        &self.libraries
    }
}
