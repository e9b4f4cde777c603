// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The table of known features and the resolver that turns a gadget's
//! requested features into an ordered, transitively closed set.
//!
//! # Invariants
//!
//! - A feature can only be registered after all of its dependencies, so the
//!   explicit dependency graph can never contain a forward reference.
//! - Core features (named `core` or `core.*`) are included in every
//!   resolution, and every non-core feature implicitly depends on all of them.
//!
//! The registry is built once at startup and shared read-only afterwards.

use std::collections::HashSet;
use std::sync::Arc;

use super::feature::GadgetFeatureFactory;
use super::validation::detect_cycle;
use crate::errors::RegistryError;
use crate::gadget::RenderingContext;
use crate::observability::messages::features::FeatureRegistered;
use crate::observability::messages::StructuredLog;

/// Whether a feature name denotes a core feature.
pub fn is_core_feature(name: &str) -> bool {
    name == "core" || name.starts_with("core.")
}

pub struct RegisteredFeature {
    name: String,
    dependencies: Vec<String>,
    core: bool,
    factory: Arc<dyn GadgetFeatureFactory>,
}

impl RegisteredFeature {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicitly declared dependencies.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn is_core(&self) -> bool {
        self.core
    }

    pub fn factory(&self) -> &Arc<dyn GadgetFeatureFactory> {
        &self.factory
    }
}

/// Result of [`FeatureRegistry::get_included_features`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludedFeatures {
    /// Every included feature, dependencies before dependents.
    pub features: Vec<String>,
    /// Requested names with no registered feature.
    pub missing: Vec<String>,
}

#[derive(Default)]
pub struct FeatureRegistry {
    features: Vec<RegisteredFeature>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature.
    ///
    /// # Errors
    /// `DuplicateFeature` when the name is taken; `UnresolvedDependency` when
    /// a dependency is not registered yet. Nothing is added on error.
    pub fn register(
        &mut self,
        name: &str,
        dependencies: Vec<String>,
        factory: Arc<dyn GadgetFeatureFactory>,
    ) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::DuplicateFeature {
                feature: name.to_string(),
            });
        }
        if let Some(missing) = dependencies.iter().find(|dep| !self.contains(dep)) {
            return Err(RegistryError::UnresolvedDependency {
                feature: name.to_string(),
                missing_dependency: missing.clone(),
            });
        }

        let core = is_core_feature(name);
        FeatureRegistered {
            feature: name,
            dependencies: &dependencies,
            core,
        }
        .log();
        self.features.push(RegisteredFeature {
            name: name.to_string(),
            dependencies,
            core,
            factory,
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredFeature> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Feature names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Declared dependencies plus, for non-core features, every core feature.
    pub fn effective_dependencies(&self, name: &str) -> Vec<&str> {
        let Some(feature) = self.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<&str> = feature.dependencies.iter().map(String::as_str).collect();
        if !feature.core {
            for core in self.features.iter().filter(|f| f.core) {
                if !deps.contains(&core.name.as_str()) {
                    deps.push(&core.name);
                }
            }
        }
        deps
    }

    /// Resolves the transitive closure of `needed` plus every core feature.
    ///
    /// Unknown names are reported in `missing` rather than failing, so the
    /// caller can decide whether a gap is fatal.
    pub fn get_included_features<S: AsRef<str>>(&self, needed: &[S]) -> IncludedFeatures {
        let mut result = IncludedFeatures::default();
        let mut visited = HashSet::new();

        for core in self.features.iter().filter(|f| f.core) {
            self.visit(&core.name, &mut visited, &mut result.features);
        }
        for name in needed {
            let name = name.as_ref();
            if self.contains(name) {
                self.visit(name, &mut visited, &mut result.features);
            } else if !result.missing.iter().any(|m| m == name) {
                result.missing.push(name.to_string());
            }
        }
        result
    }

    fn visit<'a>(&'a self, name: &'a str, visited: &mut HashSet<&'a str>, out: &mut Vec<String>) {
        if !visited.insert(name) {
            return;
        }
        for dep in self.effective_dependencies(name) {
            self.visit(dep, visited, out);
        }
        out.push(name.to_string());
    }

    /// Checks the effective dependency graph for cycles.
    ///
    /// Explicit dependencies cannot form one, but a core feature that depends
    /// on a non-core feature closes a loop through the implicit core edges.
    pub fn validate_feature_graph(&self) -> Result<(), RegistryError> {
        let graph: Vec<(&str, Vec<&str>)> = self
            .features
            .iter()
            .map(|f| (f.name.as_str(), self.effective_dependencies(&f.name)))
            .collect();
        match detect_cycle(&graph) {
            Some(cycle) => Err(RegistryError::CyclicDependency { cycle }),
            None => Ok(()),
        }
    }

    /// Concatenated JS of the resolved features for one rendering context,
    /// one library after another in dependency order.
    pub fn assemble_js<S: AsRef<str>>(&self, needed: &[S], context: RenderingContext) -> String {
        let included = self.get_included_features(needed);
        included
            .features
            .iter()
            .filter_map(|name| self.get(name))
            .flat_map(|feature| feature.factory.libraries().iter())
            .filter(|library| library.context == context)
            .map(|library| library.to_bundle_code())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
