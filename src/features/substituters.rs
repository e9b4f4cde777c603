// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in core features that fill the gadget's hangman substitutions.

use async_trait::async_trait;
use std::sync::Arc;

use super::feature::{FeatureParams, GadgetFeature, GadgetFeatureFactory};
use super::registry::FeatureRegistry;
use crate::errors::{GadgetError, RegistryError};
use crate::gadget::{resolve_messages, Gadget, GadgetContext, ResolvedMessages, SubstitutionType};
use crate::http::HttpFetcher;
use crate::markup::escape_html;
use crate::spec::GadgetSpec;

pub const MESSAGE_BUNDLE_FEATURE: &str = "core.msgbundlesubst";
pub const BIDI_FEATURE: &str = "core.bidisubst";
pub const USER_PREF_FEATURE: &str = "core.prefsubst";
pub const MODULE_FEATURE: &str = "core.modulesubst";

/// Registers the four substituter features.
pub fn register_core_features(
    registry: &mut FeatureRegistry,
    fetcher: Arc<dyn HttpFetcher>,
) -> Result<(), RegistryError> {
    registry.register(
        MESSAGE_BUNDLE_FEATURE,
        Vec::new(),
        Arc::new(MessageBundleSubstituterFactory { fetcher }),
    )?;
    registry.register(
        BIDI_FEATURE,
        vec![MESSAGE_BUNDLE_FEATURE.to_string()],
        Arc::new(BidiSubstituterFactory),
    )?;
    registry.register(USER_PREF_FEATURE, Vec::new(), Arc::new(UserPrefSubstituterFactory))?;
    registry.register(MODULE_FEATURE, Vec::new(), Arc::new(ModuleSubstituterFactory))?;
    Ok(())
}

/// Fetches message bundles in `prepare`, publishes them in `process`.
struct MessageBundleSubstituter {
    fetcher: Arc<dyn HttpFetcher>,
    resolved: Option<ResolvedMessages>,
}

#[async_trait]
impl GadgetFeature for MessageBundleSubstituter {
    async fn prepare(
        &mut self,
        spec: &GadgetSpec,
        context: &GadgetContext,
        _params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        let resolved = resolve_messages(spec, &context.locale, self.fetcher.as_ref(), context.ignore_cache).await?;
        self.resolved = Some(resolved);
        Ok(())
    }

    async fn process(
        &mut self,
        gadget: &mut Gadget,
        context: &GadgetContext,
        params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        if self.resolved.is_none() {
            let spec = gadget.shared_spec();
            self.prepare(&spec, context, params).await?;
        }
        let Some(resolved) = self.resolved.take() else {
            return Ok(());
        };
        gadget
            .substitutions_mut()
            .add_substitutions(SubstitutionType::Message, resolved.bundle.messages());
        gadget.set_direction(&resolved.direction);
        gadget.set_message_bundle(resolved.bundle);
        Ok(())
    }
}

struct MessageBundleSubstituterFactory {
    fetcher: Arc<dyn HttpFetcher>,
}

impl GadgetFeatureFactory for MessageBundleSubstituterFactory {
    fn create(&self) -> Box<dyn GadgetFeature> {
        Box::new(MessageBundleSubstituter {
            fetcher: Arc::clone(&self.fetcher),
            resolved: None,
        })
    }
}

/// `START_EDGE`, `END_EDGE`, `DIR` and `REVERSE_DIR` for the gadget's
/// text direction.
struct BidiSubstituter;

#[async_trait]
impl GadgetFeature for BidiSubstituter {
    async fn process(
        &mut self,
        gadget: &mut Gadget,
        _context: &GadgetContext,
        _params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        let rtl = gadget.direction() == "rtl";
        let (start, end, dir, reverse) = if rtl {
            ("right", "left", "rtl", "ltr")
        } else {
            ("left", "right", "ltr", "rtl")
        };
        let subst = gadget.substitutions_mut();
        subst.add_substitution(SubstitutionType::Bidi, "START_EDGE", start);
        subst.add_substitution(SubstitutionType::Bidi, "END_EDGE", end);
        subst.add_substitution(SubstitutionType::Bidi, "DIR", dir);
        subst.add_substitution(SubstitutionType::Bidi, "REVERSE_DIR", reverse);
        Ok(())
    }
}

struct BidiSubstituterFactory;

impl GadgetFeatureFactory for BidiSubstituterFactory {
    fn create(&self) -> Box<dyn GadgetFeature> {
        Box::new(BidiSubstituter)
    }
}

/// `UP` values from the request, falling back to declared defaults.
/// Values are HTML-escaped since they land in markup.
struct UserPrefSubstituter;

#[async_trait]
impl GadgetFeature for UserPrefSubstituter {
    async fn process(
        &mut self,
        gadget: &mut Gadget,
        context: &GadgetContext,
        _params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        let values: Vec<(String, String)> = gadget
            .spec()
            .user_prefs()
            .iter()
            .map(|pref| {
                let value = context.user_prefs.get(&pref.name).unwrap_or(&pref.default_value);
                (pref.name.clone(), escape_html(value))
            })
            .collect();
        let subst = gadget.substitutions_mut();
        for (name, value) in values {
            subst.add_substitution(SubstitutionType::UserPref, &name, &value);
        }
        Ok(())
    }
}

struct UserPrefSubstituterFactory;

impl GadgetFeatureFactory for UserPrefSubstituterFactory {
    fn create(&self) -> Box<dyn GadgetFeature> {
        Box::new(UserPrefSubstituter)
    }
}

/// `__MODULE_ID__`.
struct ModuleSubstituter;

#[async_trait]
impl GadgetFeature for ModuleSubstituter {
    async fn process(
        &mut self,
        gadget: &mut Gadget,
        context: &GadgetContext,
        _params: &FeatureParams,
    ) -> Result<(), GadgetError> {
        gadget.substitutions_mut().add_substitution(
            SubstitutionType::Module,
            "ID",
            &context.module_id.to_string(),
        );
        Ok(())
    }
}

struct ModuleSubstituterFactory;

impl GadgetFeatureFactory for ModuleSubstituterFactory {
    fn create(&self) -> Box<dyn GadgetFeature> {
        Box::new(ModuleSubstituter)
    }
}
